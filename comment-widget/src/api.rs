//! HTTP client for the thread API.
//!
//! The API itself (persistence, access control, OAuth) is an external
//! collaborator; this module only speaks its wire format.

use comment_types::{ContextType, Message, PagePoint, Priority, Thread, ThreadStatus};
use gloo_net::http::Request;
use serde::Serialize;
use thiserror::Error;

/// API base for the current environment:
/// - in development (localhost): the thread API dev server on port 8787
/// - in production: same origin (the API serves the preview)
pub fn default_api_base() -> String {
    let hostname = web_sys::window()
        .and_then(|w| w.location().hostname().ok())
        .unwrap_or_default();

    if hostname == "localhost" || hostname == "127.0.0.1" {
        "http://localhost:8787".to_string()
    } else {
        "".to_string()
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("HTTP error: {0}")]
    Status(u16),
    #[error("failed to parse JSON: {0}")]
    Decode(String),
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base: String,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NewThread {
    pub repo: String,
    pub branch: String,
    pub context_type: ContextType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<PagePoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_start: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_end: Option<u32>,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<String>,
}

/// Partial thread update for status/priority changes.
#[derive(Debug, Default, Serialize)]
pub struct ThreadPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ThreadStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

/// Reposition payload. Both fields travel together so the anchor is
/// superseded wholesale: a later resolve prefers the new selector and still
/// has the new coordinates as fallback. `selector` is serialized even when
/// null, wiping any stale one server-side.
#[derive(Debug, Serialize)]
pub struct RepositionBody {
    pub coordinates: PagePoint,
    pub selector: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NewMessage {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<String>,
}

impl ApiClient {
    pub fn new(base: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base: base.into(),
            token,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn auth_header(&self) -> Option<String> {
        self.token.as_ref().map(|token| format!("Bearer {token}"))
    }

    pub async fn fetch_open_threads(
        &self,
        repo: &str,
        branch: &str,
    ) -> Result<Vec<Thread>, ApiError> {
        let url = format!(
            "{}/threads?repo={}&branch={}&status=open",
            self.base,
            encode(repo),
            encode(branch)
        );

        let mut request = Request::get(&url);
        if let Some(auth) = self.auth_header() {
            request = request.header("Authorization", &auth);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        if !response.ok() {
            return Err(ApiError::Status(response.status()));
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn fetch_thread(&self, thread_id: &str) -> Result<Thread, ApiError> {
        let url = format!("{}/threads/{}", self.base, encode(thread_id));

        let mut request = Request::get(&url);
        if let Some(auth) = self.auth_header() {
            request = request.header("Authorization", &auth);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        if !response.ok() {
            return Err(ApiError::Status(response.status()));
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn create_thread(&self, body: &NewThread) -> Result<Thread, ApiError> {
        let url = format!("{}/threads", self.base);

        let mut request = Request::post(&url);
        if let Some(auth) = self.auth_header() {
            request = request.header("Authorization", &auth);
        }

        let response = request
            .json(body)
            .map_err(|e| ApiError::Request(e.to_string()))?
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        if !response.ok() {
            return Err(ApiError::Status(response.status()));
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn update_thread(&self, thread_id: &str, patch: &ThreadPatch) -> Result<(), ApiError> {
        self.patch_thread_json(thread_id, patch).await
    }

    pub async fn reposition_thread(
        &self,
        thread_id: &str,
        body: &RepositionBody,
    ) -> Result<(), ApiError> {
        self.patch_thread_json(thread_id, body).await
    }

    async fn patch_thread_json<B: Serialize>(
        &self,
        thread_id: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        let url = format!("{}/threads/{}", self.base, encode(thread_id));

        let mut request = Request::patch(&url);
        if let Some(auth) = self.auth_header() {
            request = request.header("Authorization", &auth);
        }

        let response = request
            .json(body)
            .map_err(|e| ApiError::Request(e.to_string()))?
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        if !response.ok() {
            return Err(ApiError::Status(response.status()));
        }

        Ok(())
    }

    pub async fn post_message(
        &self,
        thread_id: &str,
        body: &NewMessage,
    ) -> Result<Message, ApiError> {
        let url = format!("{}/threads/{}/messages", self.base, encode(thread_id));

        let mut request = Request::post(&url);
        if let Some(auth) = self.auth_header() {
            request = request.header("Authorization", &auth);
        }

        let response = request
            .json(body)
            .map_err(|e| ApiError::Request(e.to_string()))?
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        if !response.ok() {
            return Err(ApiError::Status(response.status()));
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn edit_message(
        &self,
        thread_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<(), ApiError> {
        let url = format!(
            "{}/threads/{}/messages/{}",
            self.base,
            encode(thread_id),
            encode(message_id)
        );
        let body = serde_json::json!({ "content": content });

        let mut request = Request::patch(&url);
        if let Some(auth) = self.auth_header() {
            request = request.header("Authorization", &auth);
        }

        let response = request
            .json(&body)
            .map_err(|e| ApiError::Request(e.to_string()))?
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        if !response.ok() {
            return Err(ApiError::Status(response.status()));
        }

        Ok(())
    }

    pub async fn delete_message(&self, thread_id: &str, message_id: &str) -> Result<(), ApiError> {
        let url = format!(
            "{}/threads/{}/messages/{}",
            self.base,
            encode(thread_id),
            encode(message_id)
        );

        let mut request = Request::delete(&url);
        if let Some(auth) = self.auth_header() {
            request = request.header("Authorization", &auth);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        if !response.ok() {
            return Err(ApiError::Status(response.status()));
        }

        Ok(())
    }

    pub async fn add_reaction(
        &self,
        thread_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), ApiError> {
        let url = format!(
            "{}/threads/{}/messages/{}/reactions",
            self.base,
            encode(thread_id),
            encode(message_id)
        );
        let body = serde_json::json!({ "emoji": emoji });

        let mut request = Request::post(&url);
        if let Some(auth) = self.auth_header() {
            request = request.header("Authorization", &auth);
        }

        let response = request
            .json(&body)
            .map_err(|e| ApiError::Request(e.to_string()))?
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        if !response.ok() {
            return Err(ApiError::Status(response.status()));
        }

        Ok(())
    }

    pub async fn remove_reaction(
        &self,
        thread_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), ApiError> {
        let url = format!(
            "{}/threads/{}/messages/{}/reactions/{}",
            self.base,
            encode(thread_id),
            encode(message_id),
            encode(emoji)
        );

        let mut request = Request::delete(&url);
        if let Some(auth) = self.auth_header() {
            request = request.header("Authorization", &auth);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        if !response.ok() {
            return Err(ApiError::Status(response.status()));
        }

        Ok(())
    }
}

fn encode(value: &str) -> String {
    String::from(js_sys::encode_uri_component(value))
}
