//! RAGFlow session-service client.
//!
//! Implements [`SessionProvisioner`] over the `/api/v1/chats/{chat_id}/sessions`
//! endpoints and [`ConversationMirror`] over the non-streaming
//! `/api/v1/chats/{chat_id}/completions` endpoint. RAGFlow wraps every
//! response as `{"code": 0, "data": ...}`; a non-zero code is an error even
//! when the HTTP status is 200.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use liftlog_types::{ChatMessage, Role};

use crate::backend::{ConversationMirror, SessionInfo, SessionProvisioner};
use crate::error::{LlmError, Result, status_error};

/// Configuration for [`RagflowClient`].
#[derive(Debug, Clone)]
pub struct RagflowConfig {
    pub base_url: String,
    pub chat_id: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl RagflowConfig {
    pub fn new(base_url: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            chat_id: chat_id.into(),
            api_key: None,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Client for one RAGFlow assistant.
pub struct RagflowClient {
    client: Client,
    config: RagflowConfig,
}

impl RagflowClient {
    pub fn new(config: RagflowConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn chat_url(&self, suffix: &str) -> String {
        format!(
            "{}/api/v1/chats/{}{}",
            self.config.base_url, self.config.chat_id, suffix
        )
    }

    /// Send a request and unwrap the `{code, message, data}` envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        url: String,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<Option<T>> {
        let mut builder = self
            .client
            .request(method, &url)
            .header(header::CONTENT_TYPE, "application/json")
            .query(query);
        if let Some(ref api_key) = self.config.api_key {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", api_key));
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(status_error(status, &text));
        }

        let envelope: Envelope<T> = serde_json::from_str(&text)?;
        if envelope.code != 0 {
            let message = envelope
                .message
                .unwrap_or_else(|| format!("code {}", envelope.code));
            return Err(LlmError::Backend(message));
        }
        Ok(envelope.data)
    }
}

#[async_trait]
impl SessionProvisioner for RagflowClient {
    async fn list_sessions(&self, limit: usize) -> Result<Vec<SessionInfo>> {
        let query = [
            ("page", "1".to_string()),
            ("page_size", limit.max(1).to_string()),
        ];
        let sessions: Option<Vec<WireSession>> = self
            .call(Method::GET, self.chat_url("/sessions"), &query, None)
            .await?;
        Ok(sessions
            .unwrap_or_default()
            .into_iter()
            .map(SessionInfo::from)
            .collect())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionInfo>> {
        let query = [("id", session_id.to_string())];
        let result: Result<Option<Vec<WireSession>>> = self
            .call(Method::GET, self.chat_url("/sessions"), &query, None)
            .await;
        match result {
            Ok(sessions) => Ok(sessions
                .unwrap_or_default()
                .into_iter()
                .next()
                .map(SessionInfo::from)),
            Err(LlmError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_session(&self, name: &str) -> Result<SessionInfo> {
        let session: Option<WireSession> = self
            .call(
                Method::POST,
                self.chat_url("/sessions"),
                &[],
                Some(serde_json::json!({ "name": name })),
            )
            .await?;
        let session = session
            .ok_or_else(|| LlmError::Serialization("create session returned no data".into()))?;
        tracing::info!(session_id = %session.id, name = %name, "Created session");
        Ok(session.into())
    }

    async fn rename_session(&self, session_id: &str, name: &str) -> Result<()> {
        let _: Option<serde_json::Value> = self
            .call(
                Method::PUT,
                self.chat_url(&format!("/sessions/{session_id}")),
                &[],
                Some(serde_json::json!({ "name": name })),
            )
            .await?;
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let _: Option<serde_json::Value> = self
            .call(
                Method::DELETE,
                self.chat_url("/sessions"),
                &[],
                Some(serde_json::json!({ "ids": [session_id] })),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ConversationMirror for RagflowClient {
    /// RAGFlow records the exchange by answering the question itself, so only
    /// the question is sent.
    async fn mirror(&self, session_id: &str, question: &str, answer: &str) -> Result<()> {
        let _: Option<serde_json::Value> = self
            .call(
                Method::POST,
                self.chat_url("/completions"),
                &[],
                Some(serde_json::json!({
                    "question": question,
                    "session_id": session_id,
                    "stream": false,
                })),
            )
            .await?;
        tracing::debug!(
            session_id = %session_id,
            answer_len = answer.len(),
            "Mirrored conversation"
        );
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    code: i64,
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct WireSession {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    messages: Option<Vec<WireMessage>>,
    #[serde(default)]
    create_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    role: Option<String>,
    content: Option<String>,
}

impl From<WireSession> for SessionInfo {
    fn from(wire: WireSession) -> Self {
        let messages: Vec<ChatMessage> = wire
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| {
                let content = m.content.filter(|c| !c.is_empty())?;
                let role = Role::parse_lenient(m.role.as_deref()?);
                Some(ChatMessage { role, content })
            })
            .collect();
        SessionInfo {
            id: wire.id,
            name: wire.name,
            message_count: messages.len(),
            created_at: wire.create_date,
            messages,
        }
    }
}
