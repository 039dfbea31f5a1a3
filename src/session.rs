//! Session credential storage
//!
//! Holds the bearer token and the logged-in user profile. The browser
//! original kept these in sessionStorage; here the same state lives in an
//! owned store, optionally persisted to a JSON file so the CLI stays logged
//! in between invocations. The store is cleared on explicit logout and
//! whenever the backend answers 401.

use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::models::User;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionData {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<User>,
}

pub struct SessionStore {
    path: Option<PathBuf>,
    state: RwLock<SessionData>,
}

impl SessionStore {
    /// In-memory store with no persistence (tests, one-shot scripting)
    pub fn ephemeral() -> Self {
        Self {
            path: None,
            state: RwLock::new(SessionData::default()),
        }
    }

    /// Open a file-backed store, loading any existing session
    pub fn open(path: PathBuf) -> Self {
        let state = if path.exists() {
            match fs::read_to_string(&path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
                Err(_) => SessionData::default(),
            }
        } else {
            SessionData::default()
        };
        Self {
            path: Some(path),
            state: RwLock::new(state),
        }
    }

    /// Default session file under the platform config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("noteroots").join("session.json"))
    }

    /// Store a fresh credential after a successful login
    pub fn set(&self, token: String, user: User) {
        if let Ok(mut state) = self.state.write() {
            state.token = Some(token);
            state.user = Some(user);
        }
        self.persist();
    }

    /// Drop the credential and the cached user, removing the session file
    pub fn clear(&self) {
        if let Ok(mut state) = self.state.write() {
            *state = SessionData::default();
        }
        if let Some(path) = &self.path {
            if path.exists() {
                let _ = fs::remove_file(path);
            }
        }
    }

    pub fn token(&self) -> Option<String> {
        self.state.read().ok().and_then(|s| s.token.clone())
    }

    pub fn user(&self) -> Option<User> {
        self.state.read().ok().and_then(|s| s.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let Ok(state) = self.state.read() else {
            return;
        };
        let content = match serde_json::to_string_pretty(&*state) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("[Session] failed to serialize session: {}", e);
                return;
            }
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("[Session] failed to create config directory: {}", e);
                return;
            }
        }
        if let Err(e) = fs::write(path, content) {
            eprintln!("[Session] failed to write session file: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> User {
        User {
            id: Some(1),
            email: "admin@example.com".to_string(),
            role: "admin".to_string(),
        }
    }

    #[test]
    fn test_ephemeral_starts_anonymous() {
        let store = SessionStore::ephemeral();
        assert!(!store.is_authenticated());
        assert!(store.token().is_none());
        assert!(store.user().is_none());
    }

    #[test]
    fn test_set_and_clear() {
        let store = SessionStore::ephemeral();
        store.set("tok-123".to_string(), test_user());
        assert!(store.is_authenticated());
        assert_eq!(store.token().as_deref(), Some("tok-123"));
        assert_eq!(store.user().unwrap().email, "admin@example.com");

        store.clear();
        assert!(!store.is_authenticated());
        assert!(store.user().is_none());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = SessionStore::open(path.clone());
        store.set("tok-abc".to_string(), test_user());
        assert!(path.exists());

        let reopened = SessionStore::open(path.clone());
        assert_eq!(reopened.token().as_deref(), Some("tok-abc"));
        assert_eq!(reopened.user().unwrap().role, "admin");

        reopened.clear();
        assert!(!path.exists());
        let after_clear = SessionStore::open(path);
        assert!(!after_clear.is_authenticated());
    }

    #[test]
    fn test_corrupt_file_treated_as_anonymous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();

        let store = SessionStore::open(path);
        assert!(!store.is_authenticated());
    }
}
