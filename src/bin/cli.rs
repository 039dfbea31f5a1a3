//! noteroots CLI - command-line client for the notes knowledge base
//!
//! Usage: noteroots-cli [OPTIONS] <COMMAND>
//!
//! Browses the category tree and notes, and exposes the admin CRUD surface
//! (categories, notes, drafts, stats). Supports JSON output for scripting.

use clap::{Parser, Subcommand};
use noteroots_lib::api::{ApiClient, ApiError, CategoryUpdate, NoteFilter, DEFAULT_SERVER};
use noteroots_lib::app_state::AppState;
use noteroots_lib::category_tree::CategoryTree;
use noteroots_lib::models::{CategoryNode, NotePayload};
use noteroots_lib::session::SessionStore;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;

// ============================================================================
// Logging Infrastructure
// ============================================================================

use chrono::{Datelike, Local, Timelike};
use std::fs::{self, File, OpenOptions};
use std::sync::Mutex;

static LOG_FILE: Mutex<Option<File>> = Mutex::new(None);

/// Initialize logging - creates log file and cleans old logs
fn init_logging() -> Option<PathBuf> {
    let log_dir = dirs::data_dir()
        .map(|p| p.join("noteroots").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));

    if fs::create_dir_all(&log_dir).is_err() {
        return None;
    }

    // Clean logs older than 7 days
    if let Ok(entries) = fs::read_dir(&log_dir) {
        let cutoff = Local::now() - chrono::Duration::days(7);
        for entry in entries.flatten() {
            let path = entry.path();
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if let Some(date_str) = name
                    .strip_prefix("noteroots-")
                    .and_then(|s| s.strip_suffix(".log"))
                {
                    if let Ok(date) = chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
                        if date < cutoff.date_naive() {
                            let _ = fs::remove_file(&path);
                        }
                    }
                }
            }
        }
    }

    // Create today's log file
    let today = Local::now();
    let log_filename = format!(
        "noteroots-{:04}-{:02}-{:02}.log",
        today.year(),
        today.month(),
        today.day()
    );
    let log_path = log_dir.join(&log_filename);

    if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
        if let Ok(mut guard) = LOG_FILE.lock() {
            *guard = Some(file);
        }
        Some(log_path)
    } else {
        None
    }
}

/// Log to both terminal and file
fn log_both(msg: &str) {
    println!("{}", msg);
    log_file_only(msg, false);
}

/// Log error to both terminal and file
fn elog_both(msg: &str) {
    eprintln!("{}", msg);
    log_file_only(msg, true);
}

fn log_file_only(msg: &str, is_error: bool) {
    let now = Local::now();
    let timestamp = format!("[{:02}:{:02}:{:02}]", now.hour(), now.minute(), now.second());
    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(ref mut file) = *guard {
            let tag = if is_error { " [ERROR]" } else { "" };
            let _ = writeln!(file, "{}{} {}", timestamp, tag, msg);
        }
    }
}

// ============================================================================
// CLI definition
// ============================================================================

#[derive(Parser)]
#[command(name = "noteroots-cli")]
#[command(version, about = "Notes knowledge base CLI", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Backend server URL (default: NOTEROOTS_SERVER env or http://localhost:5000)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Output as JSON for scripting
    #[arg(long, global = true)]
    json: bool,

    /// Suppress informational output
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session credential
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Clear the stored session credential
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Category operations
    Category {
        #[command(subcommand)]
        cmd: CategoryCommands,
    },
    /// Note operations
    Note {
        #[command(subcommand)]
        cmd: NoteCommands,
    },
    /// Admin dashboard counters
    Stats,
}

#[derive(Subcommand)]
enum CategoryCommands {
    /// Print the category hierarchy
    Tree,
    /// List every category with its full path
    List,
    /// Show one category (by id, name, or path)
    Show { category: String },
    /// Server-computed path for a category id
    Path { id: i64 },
    /// Direct children of a category
    Children { id: i64 },
    /// Whole subtree under a category
    Descendants { id: i64 },
    /// Create a category (admin)
    Add {
        name: String,
        /// Parent category id; omit for a new root
        #[arg(long)]
        parent: Option<i64>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Rename a category (admin)
    Rename { id: i64, name: String },
    /// Re-parent a category (admin)
    Move {
        id: i64,
        #[arg(long)]
        parent: i64,
    },
    /// Delete a category and its descendants (admin)
    Delete {
        id: i64,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum NoteCommands {
    /// List notes, optionally filtered
    List {
        /// Category id, name, or `::` path
        #[arg(long)]
        category: Option<String>,
        /// Substring match over title and content
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one note
    Show { id: i64 },
    /// Create a note (admin); content read from stdin when --content omitted
    Add {
        #[arg(long)]
        title: String,
        /// Category id, name, or `::` path
        #[arg(long)]
        category: String,
        #[arg(long)]
        content: Option<String>,
        /// Save as draft instead of publishing
        #[arg(long)]
        draft: bool,
    },
    /// Update a note (admin); unspecified fields keep their current value
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        draft: bool,
    },
    /// Delete a note (admin)
    Delete {
        id: i64,
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Most-viewed notes (admin)
    Top,
}

// ============================================================================
// Helpers
// ============================================================================

fn confirm(prompt: &str, assume_yes: bool) -> bool {
    if assume_yes {
        return true;
    }
    eprint!("{} [y/N] ", prompt);
    let _ = io::stderr().flush();
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim(), "y" | "Y" | "yes")
}

fn read_password() -> Result<String, ApiError> {
    eprint!("Password: ");
    let _ = io::stderr().flush();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| ApiError::RequestFailed(format!("Failed to read password: {}", e)))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn read_stdin_content() -> Result<String, ApiError> {
    let mut content = String::new();
    io::stdin()
        .read_to_string(&mut content)
        .map_err(|e| ApiError::RequestFailed(format!("Failed to read content from stdin: {}", e)))?;
    Ok(content.trim_end().to_string())
}

/// Resolve a user-supplied category reference (id digits, exact path, or
/// name) against the cached tree.
async fn resolve_category(state: &AppState, reference: &str) -> Result<i64, ApiError> {
    if let Ok(id) = reference.parse::<i64>() {
        return Ok(id);
    }
    let tree = state.categories().await?;
    if let Some(found) = tree.iter().find(|c| c.path.eq_ignore_ascii_case(reference)) {
        return Ok(found.id);
    }
    if let Some(found) = tree.find_by_name(reference) {
        return Ok(found.id);
    }
    Err(ApiError::RequestFailed(format!(
        "Category \"{}\" not found",
        reference
    )))
}

fn print_tree_nodes(nodes: &[CategoryNode], depth: usize) {
    for node in nodes {
        println!("{}{} ({})", "  ".repeat(depth), node.name, node.id);
        print_tree_nodes(&node.children, depth + 1);
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), ApiError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::RequestFailed(format!("Failed to encode JSON output: {}", e)))?;
    println!("{}", text);
    Ok(())
}

fn require_lookup(tree: &CategoryTree, id: i64) -> Result<(), ApiError> {
    if tree.lookup(id).is_none() {
        return Err(ApiError::RequestFailed(format!("Category {} not found", id)));
    }
    Ok(())
}

// ============================================================================
// Command handlers
// ============================================================================

async fn run_command(cli: &Cli, state: &AppState) -> Result<(), ApiError> {
    match &cli.command {
        Commands::Login { email, password } => {
            let password = match password {
                Some(p) => p.clone(),
                None => read_password()?,
            };
            let user = state.client().login(email, &password).await?;
            if cli.json {
                print_json(&user)?;
            } else {
                log_both(&format!("Logged in as {} ({})", user.email, user.role));
            }
            Ok(())
        }
        Commands::Logout => {
            state.client().logout();
            if !cli.quiet {
                log_both("Logged out.");
            }
            Ok(())
        }
        Commands::Whoami => {
            match state.client().session().user() {
                Some(user) if cli.json => print_json(&user)?,
                Some(user) => println!("{} ({})", user.email, user.role),
                None => println!("Not logged in."),
            }
            Ok(())
        }
        Commands::Category { cmd } => run_category_command(cli, state, cmd).await,
        Commands::Note { cmd } => run_note_command(cli, state, cmd).await,
        Commands::Stats => {
            let stats = state.client().admin_stats().await?;
            if cli.json {
                print_json(&stats)?;
            } else {
                println!("Published notes: {}", stats.total_notes);
                println!("Drafts:          {}", stats.draft_notes);
                println!("Deleted notes:   {}", stats.deleted_notes);
                println!("Total views:     {}", stats.total_views);
            }
            Ok(())
        }
    }
}

async fn run_category_command(
    cli: &Cli,
    state: &AppState,
    cmd: &CategoryCommands,
) -> Result<(), ApiError> {
    match cmd {
        CategoryCommands::Tree => {
            let tree = state.categories().await?;
            if cli.json {
                print_json(&tree.raw_roots())?;
            } else {
                print_tree_nodes(tree.raw_roots(), 0);
            }
            Ok(())
        }
        CategoryCommands::List => {
            let tree = state.categories().await?;
            if cli.json {
                let all: Vec<_> = tree.iter().collect();
                print_json(&all)?;
            } else {
                for category in tree.iter() {
                    println!("{:>5}  {}", category.id, category.path);
                }
            }
            Ok(())
        }
        CategoryCommands::Show { category } => {
            let id = resolve_category(state, category).await?;
            let tree = state.categories().await?;
            let found = tree
                .lookup(id)
                .ok_or_else(|| ApiError::RequestFailed(format!("Category {} not found", id)))?;
            if cli.json {
                print_json(found)?;
            } else {
                println!("id:     {}", found.id);
                println!("name:   {}", found.name);
                println!("path:   {}", found.path);
                match found.parent_id {
                    Some(parent_id) => println!("parent: {}", parent_id),
                    None => println!("parent: (root)"),
                }
                let root = tree.root_of(found.id)?;
                println!("root:   {} ({})", root.name, root.id);
            }
            Ok(())
        }
        CategoryCommands::Path { id } => {
            let path = state.client().category_path(*id).await?;
            if cli.json {
                print_json(&serde_json::json!({ "path": path }))?;
            } else {
                println!("{}", path);
            }
            Ok(())
        }
        CategoryCommands::Children { id } => {
            let tree = state.categories().await?;
            require_lookup(&tree, *id)?;
            let children = tree.children_of(*id);
            if cli.json {
                print_json(&children)?;
            } else if children.is_empty() {
                println!("No subcategories.");
            } else {
                for child in children {
                    println!("{:>5}  {}", child.id, child.name);
                }
            }
            Ok(())
        }
        CategoryCommands::Descendants { id } => {
            let tree = state.categories().await?;
            require_lookup(&tree, *id)?;
            let descendants = tree.descendants_of(*id);
            if cli.json {
                print_json(&descendants)?;
            } else if descendants.is_empty() {
                println!("No descendants.");
            } else {
                for descendant in descendants {
                    println!("{:>5}  {}", descendant.id, descendant.path);
                }
            }
            Ok(())
        }
        CategoryCommands::Add {
            name,
            parent,
            description,
        } => {
            let id = state
                .add_category(name, *parent, description.as_deref())
                .await?;
            if cli.json {
                print_json(&serde_json::json!({ "id": id }))?;
            } else {
                log_both(&format!("Created category \"{}\" (id {})", name, id));
            }
            Ok(())
        }
        CategoryCommands::Rename { id, name } => {
            let update = CategoryUpdate {
                name: Some(name.clone()),
                ..Default::default()
            };
            state.update_category(*id, &update).await?;
            if !cli.quiet {
                log_both(&format!("Renamed category {} to \"{}\"", id, name));
            }
            Ok(())
        }
        CategoryCommands::Move { id, parent } => {
            if id == parent {
                return Err(ApiError::RequestFailed(
                    "Cannot set a category's parent to itself".to_string(),
                ));
            }
            let update = CategoryUpdate {
                parent_id: Some(*parent),
                ..Default::default()
            };
            state.update_category(*id, &update).await?;
            if !cli.quiet {
                log_both(&format!("Moved category {} under {}", id, parent));
            }
            Ok(())
        }
        CategoryCommands::Delete { id, yes } => {
            let tree = state.categories().await?;
            let descendant_count = tree.descendants_of(*id).len();
            let prompt = if descendant_count > 0 {
                format!(
                    "Delete category {} and its {} descendant(s)?",
                    id, descendant_count
                )
            } else {
                format!("Delete category {}?", id)
            };
            if !confirm(&prompt, *yes) {
                println!("Aborted.");
                return Ok(());
            }
            let message = state.delete_category(*id).await?;
            if !cli.quiet {
                log_both(&message);
            }
            Ok(())
        }
    }
}

async fn run_note_command(cli: &Cli, state: &AppState, cmd: &NoteCommands) -> Result<(), ApiError> {
    match cmd {
        NoteCommands::List { category, search } => {
            let mut filter = NoteFilter {
                search: search.clone(),
                ..Default::default()
            };
            if let Some(category) = category {
                let id = resolve_category(state, category).await?;
                filter.category = Some(id.to_string());
            }
            let notes = state.client().notes(&filter).await?;
            if cli.json {
                print_json(&notes)?;
            } else if notes.is_empty() {
                println!("No notes found.");
            } else {
                for note in notes {
                    println!("{:>5}  {:>6} views  {}", note.id, note.views, note.title);
                }
            }
            Ok(())
        }
        NoteCommands::Show { id } => {
            let note = state.client().note(*id).await?;
            if cli.json {
                print_json(&note)?;
            } else {
                println!("{}", note.title);
                if let Some(path) = &note.category_path {
                    println!("[{}] - {} views", path, note.views);
                } else {
                    println!("{} views", note.views);
                }
                println!();
                println!("{}", note.content);
            }
            Ok(())
        }
        NoteCommands::Add {
            title,
            category,
            content,
            draft,
        } => {
            let category_id = resolve_category(state, category).await?;
            let content = match content {
                Some(c) => c.clone(),
                None => read_stdin_content()?,
            };
            if content.is_empty() {
                return Err(ApiError::RequestFailed(
                    "Note content must not be empty".to_string(),
                ));
            }
            let payload = NotePayload {
                title: title.clone(),
                content,
                category: category_id,
                is_draft: *draft,
            };
            state.client().create_note(&payload).await?;
            if !cli.quiet {
                log_both(if *draft { "Draft saved." } else { "Note published." });
            }
            Ok(())
        }
        NoteCommands::Edit {
            id,
            title,
            category,
            content,
            draft,
        } => {
            // Fetch first so unspecified fields keep their current value
            let existing = state.client().note(*id).await?;
            let category_id = match category {
                Some(reference) => resolve_category(state, reference).await?,
                None => existing.category_id.ok_or_else(|| {
                    ApiError::RequestFailed("Note has no category; pass --category".to_string())
                })?,
            };
            let payload = NotePayload {
                title: title.clone().unwrap_or(existing.title),
                content: content.clone().unwrap_or(existing.content),
                category: category_id,
                is_draft: *draft,
            };
            state.client().update_note(*id, &payload).await?;
            if !cli.quiet {
                log_both(&format!("Updated note {}", id));
            }
            Ok(())
        }
        NoteCommands::Delete { id, yes } => {
            if !confirm(&format!("Delete note {}?", id), *yes) {
                println!("Aborted.");
                return Ok(());
            }
            state.client().delete_note(*id).await?;
            if !cli.quiet {
                log_both(&format!("Deleted note {}", id));
            }
            Ok(())
        }
        NoteCommands::Top => {
            let top = state.client().top_notes().await?;
            if cli.json {
                print_json(&top)?;
            } else {
                for note in top {
                    println!("{:>6} views  {}", note.views, note.title);
                }
            }
            Ok(())
        }
    }
}

// ============================================================================
// Entry point
// ============================================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    let server = cli
        .server
        .clone()
        .or_else(|| std::env::var("NOTEROOTS_SERVER").ok())
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());

    match url::Url::parse(&server) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        _ => {
            elog_both(&format!("Invalid server URL: {}", server));
            std::process::exit(1);
        }
    }

    let session = match SessionStore::default_path() {
        Some(path) => SessionStore::open(path),
        None => SessionStore::ephemeral(),
    };
    let state = AppState::new(ApiClient::new(&server, session));

    if let Err(e) = run_command(&cli, &state).await {
        elog_both(&format!("Error: {}", e));
        if matches!(e, ApiError::Unauthorized) {
            eprintln!("Run `noteroots-cli login --email <email>` to start a new session.");
        }
        std::process::exit(1);
    }
}
