//! Streaming response coordinator.
//!
//! Drives one chat turn: opens the upstream token stream, forwards each
//! fragment to the client as soon as it arrives, and once the stream ends
//! naturally hands the accumulated answer to background work.
//!
//! The event sequence for a turn is always zero or more
//! [`TurnEvent::Content`] followed by exactly one terminal event,
//! [`TurnEvent::Done`] or [`TurnEvent::Error`].

use axum::response::sse::Event;
use futures::{Stream, StreamExt};
use serde_json::json;
use tracing::{debug, warn};

use liftlog_llm::{ChatRequest, StreamEvent};

use crate::pipeline::CompletedTurn;
use crate::state::AppState;

/// One event sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// A fragment of the answer.
    Content(String),
    /// The answer is complete.
    Done,
    /// The turn failed; no more events follow.
    Error(String),
}

impl TurnEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TurnEvent::Content(_))
    }

    /// Wire payload: `{"content": …}`, `{"done": true}` or `{"error": …}`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            TurnEvent::Content(text) => json!({ "content": text }),
            TurnEvent::Done => json!({ "done": true }),
            TurnEvent::Error(message) => json!({ "error": message }),
        }
    }

    pub fn into_sse(self) -> Event {
        Event::default().data(self.to_json().to_string())
    }
}

/// Stream the answer to `request`.
///
/// When the upstream ends naturally with a non-empty answer, the turn is
/// dispatched through [`AppState::dispatch_completed`] before `Done` is
/// emitted. Failures emit `Error` and dispatch nothing.
pub fn stream_turn(
    state: AppState,
    request: ChatRequest,
) -> impl Stream<Item = TurnEvent> + Send + 'static {
    async_stream::stream! {
        let session_id = request.session_id.clone();
        let question = request.question.clone();

        let mut upstream = match state.chat.stream_chat(request).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Chat stream failed to open");
                yield TurnEvent::Error(e.to_string());
                return;
            }
        };

        let idle_timeout = state.config().stream_idle_timeout;
        let mut answer = String::new();

        loop {
            let next = match idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, upstream.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(
                            session_id = %session_id,
                            idle_secs = limit.as_secs_f64(),
                            "Chat stream idle, giving up"
                        );
                        yield TurnEvent::Error(format!(
                            "No response from assistant for {:.1}s",
                            limit.as_secs_f64()
                        ));
                        return;
                    }
                },
                None => upstream.next().await,
            };

            match next {
                Some(Ok(StreamEvent::TextDelta(text))) => {
                    if text.is_empty() {
                        continue;
                    }
                    answer.push_str(&text);
                    yield TurnEvent::Content(text);
                }
                Some(Ok(StreamEvent::MessageStop)) | None => break,
                Some(Err(e)) => {
                    warn!(session_id = %session_id, error = %e, "Chat stream failed");
                    yield TurnEvent::Error(e.to_string());
                    return;
                }
            }
        }

        if answer.is_empty() {
            debug!(session_id = %session_id, "Empty answer, nothing to persist");
        } else {
            debug!(session_id = %session_id, chars = answer.len(), "Turn complete");
            state.dispatch_completed(CompletedTurn {
                session_id,
                question,
                answer,
            });
        }
        yield TurnEvent::Done;
    }
}
