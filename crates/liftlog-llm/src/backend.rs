//! Collaborator traits.
//!
//! Four external services sit behind these traits:
//! - [`ChatBackend`]: the primary streaming chat-completion service
//! - [`StructuredBackend`]: the inference service used for structured extraction
//! - [`SessionProvisioner`]: creates, lists, renames and deletes chat sessions
//! - [`ConversationMirror`]: receives a copy of each completed exchange
//!
//! HTTP implementations live in [`crate::openai`], [`crate::ollama`] and
//! [`crate::ragflow`]; in-memory mocks live in `crate::mock`.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use liftlog_types::ChatMessage;

use crate::error::Result;

// ─────────────────────────────────────────────────────────────────────────────
// Streaming chat
// ─────────────────────────────────────────────────────────────────────────────

/// A streaming response from a chat backend.
pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send + 'static>>;

/// Events emitted during streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A fragment of answer text.
    TextDelta(String),
    /// The service signalled the end of the answer.
    MessageStop,
}

/// One chat turn sent to the primary service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// Personalized system instruction.
    pub system: String,
    pub question: String,
    pub session_id: String,
}

impl ChatRequest {
    pub fn new(
        system: impl Into<String>,
        question: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            system: system.into(),
            question: question.into(),
            session_id: session_id.into(),
        }
    }
}

/// Primary chat-completion service.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Open a token stream for one question.
    ///
    /// Errors returned here happen before any text is produced; errors inside
    /// the stream happen after some text may already have been yielded.
    async fn stream_chat(&self, request: ChatRequest) -> Result<ResponseStream>;

    /// Get the name of this backend.
    fn name(&self) -> &str;
}

// ─────────────────────────────────────────────────────────────────────────────
// Structured inference
// ─────────────────────────────────────────────────────────────────────────────

/// Sampling and transport options for a structured inference call.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceOptions {
    pub temperature: f32,
    /// Maximum number of tokens to generate.
    pub num_predict: u32,
    /// Ask the service to constrain output to JSON.
    pub json_format: bool,
    pub timeout: Duration,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            num_predict: 1000,
            json_format: true,
            timeout: Duration::from_secs(60),
        }
    }
}

impl InferenceOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_num_predict(mut self, num_predict: u32) -> Self {
        self.num_predict = num_predict;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Inference service used to turn free text into structured output.
///
/// Both methods return the raw text the model produced; interpreting it is
/// the caller's job.
#[async_trait]
pub trait StructuredBackend: Send + Sync {
    /// Chat-style call with separate system and user messages.
    async fn chat_json(&self, system: &str, user: &str, options: &InferenceOptions)
    -> Result<String>;

    /// Single-prompt completion, used as a fallback phrasing.
    async fn generate(&self, prompt: &str, options: &InferenceOptions) -> Result<String>;

    fn name(&self) -> &str;
}

// ─────────────────────────────────────────────────────────────────────────────
// Sessions
// ─────────────────────────────────────────────────────────────────────────────

/// A chat session as reported by the provisioning service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub name: String,
    pub message_count: usize,
    pub created_at: Option<String>,
    /// Messages the service holds for this session, when it returned them.
    #[serde(default, skip_serializing)]
    pub messages: Vec<ChatMessage>,
}

impl SessionInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            message_count: 0,
            created_at: None,
            messages: Vec::new(),
        }
    }
}

/// Name given to sessions created implicitly on first contact.
pub const DEFAULT_SESSION_NAME: &str = "Chat Session";

/// Session-provisioning service.
#[async_trait]
pub trait SessionProvisioner: Send + Sync {
    /// Most recent sessions first.
    async fn list_sessions(&self, limit: usize) -> Result<Vec<SessionInfo>>;

    /// Look up one session. `Ok(None)` when it does not exist.
    async fn get_session(&self, session_id: &str) -> Result<Option<SessionInfo>>;

    async fn create_session(&self, name: &str) -> Result<SessionInfo>;

    async fn rename_session(&self, session_id: &str, name: &str) -> Result<()>;

    async fn delete_session(&self, session_id: &str) -> Result<()>;

    /// Return the most recent session id, creating a session when none exist.
    async fn latest_or_create(&self) -> Result<String> {
        if let Some(latest) = self.list_sessions(1).await?.into_iter().next() {
            return Ok(latest.id);
        }
        let created = self.create_session(DEFAULT_SESSION_NAME).await?;
        tracing::info!(session_id = %created.id, "Created default session");
        Ok(created.id)
    }
}

/// Receives a copy of each completed exchange.
#[async_trait]
pub trait ConversationMirror: Send + Sync {
    async fn mirror(&self, session_id: &str, question: &str, answer: &str) -> Result<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared types
// ─────────────────────────────────────────────────────────────────────────────

pub type SharedChatBackend = Arc<dyn ChatBackend>;
pub type SharedStructuredBackend = Arc<dyn StructuredBackend>;
pub type SharedProvisioner = Arc<dyn SessionProvisioner>;
pub type SharedMirror = Arc<dyn ConversationMirror>;
