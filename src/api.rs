//! Authenticated REST client for the notes backend
//!
//! One generic request path carries every call: it attaches the bearer
//! credential when a session exists, decodes JSON bodies, and maps failures
//! to [`ApiError`]. A 401 is a hard transition back to anonymous: the stored
//! credential is cleared and the call fails with
//! [`ApiError::Unauthorized`] without retrying.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::category_tree::TreeError;
use crate::models::{AdminStats, CategoryNode, LoginResponse, Note, NotePayload, NoteSummary, TopNote, User};
use crate::session::SessionStore;

/// Flask dev-server default; override with `--server` or `NOTEROOTS_SERVER`
pub const DEFAULT_SERVER: &str = "http://localhost:5000";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 401 from the backend: the session was cleared, log in again
    #[error("session expired, please log in again")]
    Unauthorized,
    /// Any other non-2xx, carrying the server message or the status code
    #[error("{0}")]
    RequestFailed(String),
    /// Transport-level failure (connect, timeout, TLS)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Malformed category tree (duplicate id, parent cycle)
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Optional filters for `GET /api/notes`
#[derive(Debug, Clone, Default)]
pub struct NoteFilter {
    /// Category id (as digits) or a `::`-joined path
    pub category: Option<String>,
    /// Substring match over title and content
    pub search: Option<String>,
}

/// Fields to change on `PUT /api/category/{id}`; `None` leaves a field alone
#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub parent_id: Option<i64>,
    pub description: Option<String>,
}

pub struct ApiClient {
    client: Client,
    base_url: String,
    session: SessionStore,
}

impl ApiClient {
    pub fn new(base_url: &str, session: SessionStore) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}{}", self.base_url, path)
    }

    /// Send an authenticated call and decode the JSON reply.
    ///
    /// 204 or an empty body decodes to `{}` so mutations without reply
    /// bodies still succeed.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let mut req = self
            .client
            .request(method, self.url(path))
            .header("Accept", "application/json");
        if let Some(token) = self.session.token() {
            req = req.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        let response = req.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            // Forced logout; the caller must re-authenticate, we never retry
            self.session.clear();
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::RequestFailed(
                extract_message(&body).unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            ));
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(json!({}));
        }

        let text = response.text().await.unwrap_or_default();
        if text.trim().is_empty() {
            return Ok(json!({}));
        }
        serde_json::from_str(&text)
            .map_err(|e| ApiError::RequestFailed(format!("Invalid JSON in response: {}", e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let value = self.request(Method::GET, path, None).await?;
        decode(value)
    }

    // ---- auth ----

    /// POST /api/login. Stores the token and user profile on success.
    ///
    /// Sent without the bearer header: a 401 here means bad credentials,
    /// not an expired session, so any existing session is left alone.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let response = self
            .client
            .post(self.url("/api/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ApiError::RequestFailed(
                extract_message(&body).unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            ));
        }
        let login: LoginResponse = serde_json::from_str(&body)
            .map_err(|e| ApiError::RequestFailed(format!("Unexpected login response: {}", e)))?;
        self.session.set(login.token, login.user.clone());
        Ok(login.user)
    }

    /// Drop the stored credential and user profile. The backend keeps no
    /// session state, so nothing is sent.
    pub fn logout(&self) {
        self.session.clear();
    }

    // ---- categories ----

    /// GET /api/categories/tree
    pub async fn categories_tree(&self) -> Result<Vec<CategoryNode>, ApiError> {
        self.get_json("/api/categories/tree").await
    }

    /// GET /api/category/{id}/path — server-computed `::` path
    pub async fn category_path(&self, id: i64) -> Result<String, ApiError> {
        let value = self
            .request(Method::GET, &format!("/api/category/{}/path", id), None)
            .await?;
        Ok(value
            .get("path")
            .and_then(|p| p.as_str())
            .unwrap_or_default()
            .to_string())
    }

    /// POST /api/category — returns the new category's id
    pub async fn create_category(
        &self,
        name: &str,
        parent_id: Option<i64>,
        description: Option<&str>,
    ) -> Result<i64, ApiError> {
        let value = self
            .request(
                Method::POST,
                "/api/category",
                Some(json!({
                    "name": name,
                    "parent_id": parent_id,
                    "description": description.unwrap_or(""),
                })),
            )
            .await?;
        value
            .get("id")
            .and_then(|id| id.as_i64())
            .ok_or_else(|| ApiError::RequestFailed("Category created but reply had no id".to_string()))
    }

    /// PUT /api/category/{id} — rename, move, or describe
    pub async fn update_category(&self, id: i64, update: &CategoryUpdate) -> Result<(), ApiError> {
        let mut body = serde_json::Map::new();
        if let Some(name) = &update.name {
            body.insert("name".to_string(), json!(name));
        }
        if let Some(parent_id) = update.parent_id {
            body.insert("parent_id".to_string(), json!(parent_id));
        }
        if let Some(description) = &update.description {
            body.insert("description".to_string(), json!(description));
        }
        self.request(
            Method::PUT,
            &format!("/api/category/{}", id),
            Some(Value::Object(body)),
        )
        .await?;
        Ok(())
    }

    /// DELETE /api/category/{id} — returns the server's confirmation message
    pub async fn delete_category(&self, id: i64) -> Result<String, ApiError> {
        let value = self
            .request(Method::DELETE, &format!("/api/category/{}", id), None)
            .await?;
        Ok(value
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Category deleted")
            .to_string())
    }

    // ---- notes ----

    /// GET /api/notes with optional category/search filters
    pub async fn notes(&self, filter: &NoteFilter) -> Result<Vec<NoteSummary>, ApiError> {
        let mut path = String::from("/api/notes");
        let mut params = Vec::new();
        if let Some(category) = &filter.category {
            params.push(format!("category={}", urlencoding::encode(category)));
        }
        if let Some(search) = &filter.search {
            params.push(format!("search={}", urlencoding::encode(search)));
        }
        if !params.is_empty() {
            path.push('?');
            path.push_str(&params.join("&"));
        }
        self.get_json(&path).await
    }

    /// GET /api/note/{id} (bumps the view counter server-side)
    pub async fn note(&self, id: i64) -> Result<Note, ApiError> {
        self.get_json(&format!("/api/note/{}", id)).await
    }

    /// POST /api/note
    pub async fn create_note(&self, payload: &NotePayload) -> Result<(), ApiError> {
        self.request(
            Method::POST,
            "/api/note",
            Some(json!({
                "title": payload.title,
                "content": payload.content,
                "category": payload.category,
                "is_draft": payload.is_draft,
            })),
        )
        .await?;
        Ok(())
    }

    /// PUT /api/note/{id}
    pub async fn update_note(&self, id: i64, payload: &NotePayload) -> Result<(), ApiError> {
        self.request(
            Method::PUT,
            &format!("/api/note/{}", id),
            Some(json!({
                "title": payload.title,
                "content": payload.content,
                "category": payload.category,
                "is_draft": payload.is_draft,
            })),
        )
        .await?;
        Ok(())
    }

    /// DELETE /api/note/{id}
    pub async fn delete_note(&self, id: i64) -> Result<(), ApiError> {
        self.request(Method::DELETE, &format!("/api/note/{}", id), None)
            .await?;
        Ok(())
    }

    // ---- admin ----

    /// GET /api/admin_stats
    pub async fn admin_stats(&self) -> Result<AdminStats, ApiError> {
        self.get_json("/api/admin_stats").await
    }

    /// GET /api/note_views — most-viewed notes
    pub async fn top_notes(&self) -> Result<Vec<TopNote>, ApiError> {
        self.get_json("/api/note_views").await
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value)
        .map_err(|e| ApiError::RequestFailed(format!("Unexpected response shape: {}", e)))
}

/// Pull the `message` field out of an error body, falling back to the raw
/// body text; `None` when there is nothing readable.
fn extract_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            return Some(message.to_string());
        }
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    struct Received {
        method: String,
        url: String,
        authorization: Option<String>,
        body: String,
    }

    /// One-shot stub server: answers each request from `replies` in order,
    /// then shuts down. Records what it saw on a channel.
    fn spawn_stub(replies: Vec<(u16, &'static str)>) -> (String, mpsc::Receiver<Received>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let base = format!("http://{}", addr);
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for (status, body) in replies {
                let mut request = match server.recv() {
                    Ok(r) => r,
                    Err(_) => break,
                };
                let mut req_body = String::new();
                use std::io::Read as _;
                let _ = request.as_reader().read_to_string(&mut req_body);
                let _ = tx.send(Received {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    authorization: request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv("Authorization"))
                        .map(|h| h.value.to_string()),
                    body: req_body,
                });
                let response = tiny_http::Response::from_string(body).with_status_code(status);
                let _ = request.respond(response);
            }
        });
        (base, rx)
    }

    fn client_with_token(base: &str, token: &str) -> ApiClient {
        let session = SessionStore::ephemeral();
        session.set(
            token.to_string(),
            User {
                id: Some(1),
                email: "admin@example.com".to_string(),
                role: "admin".to_string(),
            },
        );
        ApiClient::new(base, session)
    }

    #[tokio::test]
    async fn test_bearer_header_attached_when_logged_in() {
        let (base, rx) = spawn_stub(vec![(200, "[]")]);
        let client = client_with_token(&base, "tok-123");

        let notes = client.notes(&NoteFilter::default()).await.unwrap();
        assert!(notes.is_empty());

        let seen = rx.recv().unwrap();
        assert_eq!(seen.method, "GET");
        assert_eq!(seen.url, "/api/notes");
        assert_eq!(seen.authorization.as_deref(), Some("Bearer tok-123"));
    }

    #[tokio::test]
    async fn test_anonymous_request_has_no_auth_header() {
        let (base, rx) = spawn_stub(vec![(200, "[]")]);
        let client = ApiClient::new(&base, SessionStore::ephemeral());

        client.categories_tree().await.unwrap();
        let seen = rx.recv().unwrap();
        assert!(seen.authorization.is_none());
    }

    #[tokio::test]
    async fn test_401_clears_session_without_retry() {
        let (base, rx) = spawn_stub(vec![(401, r#"{"message":"Token expired"}"#)]);
        let client = client_with_token(&base, "stale-token");

        let err = client.admin_stats().await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
        assert!(!client.session().is_authenticated());
        assert!(client.session().user().is_none());

        // exactly one request reached the server
        assert!(rx.recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_204_returns_empty_result() {
        let (base, _rx) = spawn_stub(vec![(204, "")]);
        let client = client_with_token(&base, "tok");

        // delete replies with no content; must not be a parse error
        client.delete_note(7).await.unwrap();
    }

    #[tokio::test]
    async fn test_error_body_message_is_surfaced() {
        let (base, _rx) = spawn_stub(vec![(403, r#"{"message":"Admin required"}"#)]);
        let client = client_with_token(&base, "tok");

        let err = client.delete_category(3).await.unwrap_err();
        match err {
            ApiError::RequestFailed(msg) => assert_eq!(msg, "Admin required"),
            other => panic!("expected RequestFailed, got {:?}", other),
        }
        // non-401 failures keep the session
        assert!(client.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_unreadable_error_body_falls_back_to_status() {
        let (base, _rx) = spawn_stub(vec![(500, "")]);
        let client = client_with_token(&base, "tok");

        let err = client.note(1).await.unwrap_err();
        match err {
            ApiError::RequestFailed(msg) => assert_eq!(msg, "HTTP 500"),
            other => panic!("expected RequestFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_login_stores_credential() {
        let (base, rx) = spawn_stub(vec![(
            200,
            r#"{"message":"Login successful","token":"fresh-token","user":{"id":1,"email":"admin@example.com","role":"admin"}}"#,
        )]);
        let client = ApiClient::new(&base, SessionStore::ephemeral());

        let user = client.login("admin@example.com", "hunter2").await.unwrap();
        assert!(user.is_admin());
        assert_eq!(client.session().token().as_deref(), Some("fresh-token"));

        let seen = rx.recv().unwrap();
        assert_eq!(seen.url, "/api/login");
        assert!(seen.authorization.is_none());
        assert!(seen.body.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_login_failure_does_not_clear_existing_session() {
        let (base, _rx) = spawn_stub(vec![(401, r#"{"message":"Invalid credentials"}"#)]);
        let client = client_with_token(&base, "still-good");

        let err = client.login("admin@example.com", "wrong").await.unwrap_err();
        match err {
            ApiError::RequestFailed(msg) => assert_eq!(msg, "Invalid credentials"),
            other => panic!("expected RequestFailed, got {:?}", other),
        }
        assert_eq!(client.session().token().as_deref(), Some("still-good"));
    }

    #[tokio::test]
    async fn test_note_filter_query_encoding() {
        let (base, rx) = spawn_stub(vec![(200, "[]")]);
        let client = ApiClient::new(&base, SessionStore::ephemeral());

        let filter = NoteFilter {
            category: Some("Medical::Cardiology".to_string()),
            search: Some("beta blockers".to_string()),
        };
        client.notes(&filter).await.unwrap();

        let seen = rx.recv().unwrap();
        assert_eq!(
            seen.url,
            "/api/notes?category=Medical%3A%3ACardiology&search=beta%20blockers"
        );
    }

    #[tokio::test]
    async fn test_create_category_returns_new_id() {
        let (base, rx) = spawn_stub(vec![(200, r#"{"message":"Category created","id":42}"#)]);
        let client = client_with_token(&base, "tok");

        let id = client
            .create_category("Cardiology", Some(1), None)
            .await
            .unwrap();
        assert_eq!(id, 42);

        let seen = rx.recv().unwrap();
        assert_eq!(seen.method, "POST");
        assert!(seen.body.contains("\"parent_id\":1"));
    }

    #[test]
    fn test_extract_message() {
        assert_eq!(
            extract_message(r#"{"message":"nope"}"#).as_deref(),
            Some("nope")
        );
        assert_eq!(extract_message("plain text").as_deref(), Some("plain text"));
        assert_eq!(extract_message("   "), None);
    }

    #[test]
    fn test_url_passthrough_for_absolute() {
        let client = ApiClient::new("http://example.com", SessionStore::ephemeral());
        assert_eq!(client.url("/api/notes"), "http://example.com/api/notes");
        assert_eq!(
            client.url("https://other.example/x"),
            "https://other.example/x"
        );
    }
}
