//! Clients for the external services LiftLog talks to.
//!
//! This crate provides:
//! - Collaborator traits ([`ChatBackend`], [`StructuredBackend`],
//!   [`SessionProvisioner`], [`ConversationMirror`])
//! - An OpenAI-compatible streaming chat backend with SSE parsing
//! - An Ollama structured inference backend
//! - A RAGFlow session and mirroring client
//! - Mock collaborators behind the `testing` feature
//!
//! # Example
//!
//! ```rust,ignore
//! use liftlog_llm::{ChatBackend, ChatRequest, OpenAiBackend, OpenAiConfig};
//!
//! let backend = OpenAiBackend::new(
//!     OpenAiConfig::ragflow("http://localhost:9380", "chat-id").with_api_key("key"),
//! )?;
//! let stream = backend
//!     .stream_chat(ChatRequest::new("You are a coach.", "I ran 5km", "session-id"))
//!     .await?;
//! ```

pub mod backend;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod ragflow;

pub use backend::{
    ChatBackend, ChatRequest, ConversationMirror, DEFAULT_SESSION_NAME, InferenceOptions,
    ResponseStream, SessionInfo, SessionProvisioner, SharedChatBackend, SharedMirror,
    SharedProvisioner, SharedStructuredBackend, StreamEvent, StructuredBackend,
};
pub use error::{LlmError, Result};
#[cfg(any(test, feature = "testing"))]
pub use mock::{
    MirrorCall, MockChatBackend, MockMirror, MockOutcome, MockProvisioner, MockReply,
    MockStructuredBackend, StructuredCall,
};
pub use ollama::{DEFAULT_OLLAMA_URL, OllamaBackend, OllamaConfig};
pub use openai::{OpenAiBackend, OpenAiConfig, parse_sse_stream};
pub use ragflow::{RagflowClient, RagflowConfig};
