//! Wire types for the notes backend API
//!
//! Shapes match the JSON the backend sends; optional fields cover columns
//! that older deployments omit.

use serde::{Deserialize, Serialize};

/// Category as received from `GET /api/categories/tree` (recursively nested)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryNode {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub children: Vec<CategoryNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Flattened category derived from the tree: `path` joins ancestor names
/// root-to-node with the path separator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatCategory {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub path: String,
}

/// Note summary from `GET /api/notes`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteSummary {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub category_id: Option<i64>,
}

/// Full note from `GET /api/note/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub views: i64,
    /// Human-readable category path, attached by the backend on single reads
    #[serde(default)]
    pub category_path: Option<String>,
}

/// Body for note create/update
#[derive(Debug, Clone, Serialize)]
pub struct NotePayload {
    pub title: String,
    pub content: String,
    /// Target category id
    pub category: i64,
    pub is_draft: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<i64>,
    pub email: String,
    pub role: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Reply from `POST /api/login`
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// Dashboard counters from `GET /api/admin_stats`
///
/// Everything defaults to zero; backend variants differ in which counters
/// they send.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminStats {
    #[serde(default)]
    pub total_notes: i64,
    #[serde(default)]
    pub draft_notes: i64,
    #[serde(default)]
    pub deleted_notes: i64,
    #[serde(default)]
    pub total_views: i64,
}

/// Entry from `GET /api/note_views` (most-viewed notes)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopNote {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub views: i64,
}
