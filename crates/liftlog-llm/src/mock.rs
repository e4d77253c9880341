//! In-memory collaborators for tests.
//!
//! Each mock returns scripted outcomes in order and records the calls it
//! received so tests can assert on them.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use liftlog_types::ChatMessage;

use crate::backend::{
    ChatBackend, ChatRequest, ConversationMirror, InferenceOptions, ResponseStream, SessionInfo,
    SessionProvisioner, StreamEvent, StructuredBackend,
};
use crate::error::{LlmError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Chat
// ─────────────────────────────────────────────────────────────────────────────

/// Scripted behaviour for one `stream_chat` call.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Yield each fragment, then `MessageStop`.
    Chunks(Vec<String>),
    /// Fail before the stream opens.
    FailOpen(String),
    /// Yield the fragments, then fail mid-stream.
    FailAfter(Vec<String>, String),
    /// Yield the fragments, then never produce another item.
    Stall(Vec<String>),
}

impl MockReply {
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Chunks(chunks.into_iter().map(Into::into).collect())
    }
}

/// A mock streaming chat backend.
#[derive(Debug, Default)]
pub struct MockChatBackend {
    replies: Mutex<VecDeque<MockReply>>,
    request_log: Mutex<Vec<ChatRequest>>,
}

impl MockChatBackend {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            request_log: Mutex::new(Vec::new()),
        }
    }

    /// A backend that answers once with the given fragments.
    pub fn with_chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(vec![MockReply::chunks(chunks)])
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.request_log.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.request_log.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatBackend for MockChatBackend {
    async fn stream_chat(&self, request: ChatRequest) -> Result<ResponseStream> {
        self.request_log.lock().unwrap().push(request);

        let reply = self.replies.lock().unwrap().pop_front().ok_or_else(|| {
            LlmError::Backend("MockChatBackend: no more replies available".to_string())
        })?;

        let text = |chunks: Vec<String>| {
            chunks
                .into_iter()
                .map(|c| Ok(StreamEvent::TextDelta(c)))
                .collect::<Vec<_>>()
        };

        use futures::StreamExt;
        let stream: ResponseStream = match reply {
            MockReply::Chunks(chunks) => {
                let mut events = text(chunks);
                events.push(Ok(StreamEvent::MessageStop));
                Box::pin(futures::stream::iter(events))
            }
            MockReply::FailOpen(message) => return Err(LlmError::Network(message)),
            MockReply::FailAfter(chunks, message) => {
                let mut events = text(chunks);
                events.push(Err(LlmError::Network(message)));
                Box::pin(futures::stream::iter(events))
            }
            MockReply::Stall(chunks) => {
                Box::pin(futures::stream::iter(text(chunks)).chain(futures::stream::pending()))
            }
        };
        Ok(stream)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Structured inference
// ─────────────────────────────────────────────────────────────────────────────

/// Scripted outcome for one structured call.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Text(String),
    Fail(String),
    /// Sleep before answering, to exercise caller-side timeouts.
    Delayed(Duration, String),
}

/// A recorded structured call.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredCall {
    Chat {
        system: String,
        user: String,
        options: InferenceOptions,
    },
    Generate {
        prompt: String,
        options: InferenceOptions,
    },
}

/// A mock structured inference backend with separate scripts per endpoint.
#[derive(Debug, Default)]
pub struct MockStructuredBackend {
    chat: Mutex<VecDeque<MockOutcome>>,
    generate: Mutex<VecDeque<MockOutcome>>,
    calls: Mutex<Vec<StructuredCall>>,
}

impl MockStructuredBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose chat endpoint answers once with `text`.
    pub fn with_chat(text: impl Into<String>) -> Self {
        Self::new().then_chat(MockOutcome::Text(text.into()))
    }

    pub fn then_chat(self, outcome: MockOutcome) -> Self {
        self.chat.lock().unwrap().push_back(outcome);
        self
    }

    pub fn then_generate(self, outcome: MockOutcome) -> Self {
        self.generate.lock().unwrap().push_back(outcome);
        self
    }

    pub fn calls(&self) -> Vec<StructuredCall> {
        self.calls.lock().unwrap().clone()
    }

    async fn play(queue: &Mutex<VecDeque<MockOutcome>>, endpoint: &str) -> Result<String> {
        let next = queue.lock().unwrap().pop_front();
        match next {
            Some(MockOutcome::Text(text)) => Ok(text),
            Some(MockOutcome::Fail(message)) => Err(LlmError::Backend(message)),
            Some(MockOutcome::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            None => Err(LlmError::Backend(format!(
                "MockStructuredBackend: no {endpoint} outcome scripted"
            ))),
        }
    }
}

#[async_trait]
impl StructuredBackend for MockStructuredBackend {
    async fn chat_json(
        &self,
        system: &str,
        user: &str,
        options: &InferenceOptions,
    ) -> Result<String> {
        self.calls.lock().unwrap().push(StructuredCall::Chat {
            system: system.to_string(),
            user: user.to_string(),
            options: options.clone(),
        });
        Self::play(&self.chat, "chat").await
    }

    async fn generate(&self, prompt: &str, options: &InferenceOptions) -> Result<String> {
        self.calls.lock().unwrap().push(StructuredCall::Generate {
            prompt: prompt.to_string(),
            options: options.clone(),
        });
        Self::play(&self.generate, "generate").await
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sessions
// ─────────────────────────────────────────────────────────────────────────────

/// An in-memory session service. Newest sessions are listed first.
#[derive(Debug, Default)]
pub struct MockProvisioner {
    sessions: Mutex<Vec<SessionInfo>>,
    next_id: AtomicUsize,
    failing: bool,
}

impl MockProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provisioner on which every call fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Seed an existing session.
    pub fn with_session(self, id: &str, name: &str, messages: Vec<ChatMessage>) -> Self {
        let mut info = SessionInfo::new(id, name);
        info.message_count = messages.len();
        info.messages = messages;
        self.sessions.lock().unwrap().insert(0, info);
        self
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.id.clone())
            .collect()
    }

    fn check(&self) -> Result<()> {
        if self.failing {
            Err(LlmError::Network("MockProvisioner: unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionProvisioner for MockProvisioner {
    async fn list_sessions(&self, limit: usize) -> Result<Vec<SessionInfo>> {
        self.check()?;
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionInfo>> {
        self.check()?;
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == session_id)
            .cloned())
    }

    async fn create_session(&self, name: &str) -> Result<SessionInfo> {
        self.check()?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let info = SessionInfo::new(format!("mock-session-{n}"), name);
        self.sessions.lock().unwrap().insert(0, info.clone());
        Ok(info)
    }

    async fn rename_session(&self, session_id: &str, name: &str) -> Result<()> {
        self.check()?;
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| LlmError::NotFound(session_id.to_string()))?;
        session.name = name.to_string();
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.check()?;
        self.sessions.lock().unwrap().retain(|s| s.id != session_id);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mirror
// ─────────────────────────────────────────────────────────────────────────────

/// A recorded mirror call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorCall {
    pub session_id: String,
    pub question: String,
    pub answer: String,
}

/// A mirror that records calls, optionally failing each one.
#[derive(Debug, Default)]
pub struct MockMirror {
    calls: Mutex<Vec<MirrorCall>>,
    failing: bool,
}

impl MockMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<MirrorCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversationMirror for MockMirror {
    async fn mirror(&self, session_id: &str, question: &str, answer: &str) -> Result<()> {
        self.calls.lock().unwrap().push(MirrorCall {
            session_id: session_id.to_string(),
            question: question.to_string(),
            answer: answer.to_string(),
        });
        if self.failing {
            return Err(LlmError::Network("MockMirror: unavailable".to_string()));
        }
        Ok(())
    }
}
