//! OpenAI-compatible streaming chat backend.
//!
//! Talks to any `/chat/completions` endpoint that streams Server-Sent Events,
//! including RAGFlow's per-assistant `chats_openai` endpoint, which also
//! accepts `session_id` and `reference` fields in the request body.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};

use crate::backend::{ChatBackend, ChatRequest, ResponseStream, StreamEvent};
use crate::error::{LlmError, Result, status_error};

/// Default timeout for establishing a connection.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    /// Base URL; `/chat/completions` is appended.
    pub base_url: String,
    /// Model name sent with each request.
    pub model: String,
    pub connect_timeout: Duration,
    /// Name for this backend instance.
    pub name: String,
}

impl OpenAiConfig {
    /// Create a config for a generic OpenAI-compatible endpoint.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            api_key: None,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: "model".to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            name: "openai".to_string(),
        }
    }

    /// Create a config for a RAGFlow assistant's OpenAI-compatible endpoint.
    pub fn ragflow(base_url: &str, chat_id: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self::new(format!("{base}/api/v1/chats_openai/{chat_id}")).with_name("ragflow-chat")
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend
// ─────────────────────────────────────────────────────────────────────────────

/// OpenAI-compatible streaming chat backend.
pub struct OpenAiBackend {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiBackend {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn to_wire_request<'a>(&'a self, request: &'a ChatRequest) -> WireChatRequest<'a> {
        WireChatRequest {
            model: &self.config.model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: &request.system,
                },
                WireMessage {
                    role: "user",
                    content: &request.question,
                },
            ],
            stream: true,
            reference: true,
            session_id: &request.session_id,
        }
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn stream_chat(&self, request: ChatRequest) -> Result<ResponseStream> {
        let body = self.to_wire_request(&request);

        tracing::debug!(
            backend = %self.config.name,
            model = %self.config.model,
            session_id = %request.session_id,
            question_len = request.question.len(),
            "Opening chat stream"
        );

        let mut builder = self
            .client
            .post(self.completions_url())
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "text/event-stream")
            .json(&body);
        if let Some(ref api_key) = self.config.api_key {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", api_key));
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        Ok(parse_sse_stream(response.bytes_stream()))
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}

#[derive(Debug, Serialize)]
struct WireChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    reference: bool,
    session_id: &'a str,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

// ─────────────────────────────────────────────────────────────────────────────
// SSE Streaming
// ─────────────────────────────────────────────────────────────────────────────

/// Turn an SSE byte stream of completion chunks into [`StreamEvent`]s.
///
/// Only non-empty `delta.content` fragments are surfaced. `[DONE]` yields
/// [`StreamEvent::MessageStop`] and ends the stream; a transport error yields
/// one `Err` and ends the stream.
pub fn parse_sse_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
) -> ResponseStream {
    Box::pin(futures::stream::unfold(
        SseState {
            byte_stream: Box::pin(byte_stream),
            buffer: Vec::new(),
            done: false,
        },
        |mut state| async move {
            if state.done {
                return None;
            }

            loop {
                // Lines are decoded only once complete, so a character split
                // across network chunks is reassembled first.
                while let Some(line_end) = state.buffer.iter().position(|&b| b == b'\n') {
                    let raw: Vec<u8> = state.buffer.drain(..=line_end).collect();
                    let line = String::from_utf8_lossy(&raw).trim().to_string();

                    let Some(data) = line.strip_prefix("data:").map(str::trim_start) else {
                        continue;
                    };

                    if data == "[DONE]" {
                        state.done = true;
                        return Some((Ok(StreamEvent::MessageStop), state));
                    }

                    match serde_json::from_str::<StreamChunk>(data) {
                        Ok(chunk) => {
                            let content = chunk
                                .choices
                                .into_iter()
                                .next()
                                .and_then(|c| c.delta)
                                .and_then(|d| d.content)
                                .filter(|c| !c.is_empty());
                            if let Some(content) = content {
                                return Some((Ok(StreamEvent::TextDelta(content)), state));
                            }
                        }
                        Err(e) => {
                            tracing::debug!(error = %e, "Skipping undecodable stream chunk");
                        }
                    }
                }

                match state.byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        state.buffer.extend_from_slice(&bytes);
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((Err(LlmError::Network(e.to_string())), state));
                    }
                    None => return None,
                }
            }
        },
    ))
}

struct SseState {
    byte_stream: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buffer: Vec<u8>,
    done: bool,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chunk(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"id": "c1", "choices": [{"delta": {"content": text}}]})
        )
    }

    #[test]
    fn test_ragflow_config_url() {
        let config = OpenAiConfig::ragflow("http://rag:9380/", "chat42").with_api_key("k");
        let backend = OpenAiBackend::new(config).unwrap();
        assert_eq!(
            backend.completions_url(),
            "http://rag:9380/api/v1/chats_openai/chat42/chat/completions"
        );
        assert_eq!(backend.name(), "ragflow-chat");
    }

    #[tokio::test]
    async fn test_parse_sse_stream_splits_across_chunks() {
        let body = format!("{}{}data: [DONE]\n\n", chunk("Hello"), chunk(" world"));
        let (a, b) = body.split_at(17);
        let parts: Vec<reqwest::Result<Bytes>> = vec![
            Ok(Bytes::from(a.to_string())),
            Ok(Bytes::from(b.to_string())),
        ];

        let events: Vec<_> = parse_sse_stream(futures::stream::iter(parts))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .map(|e| e.unwrap())
            .collect();

        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta("Hello".to_string()),
                StreamEvent::TextDelta(" world".to_string()),
                StreamEvent::MessageStop,
            ]
        );
    }

    #[tokio::test]
    async fn test_parse_sse_stream_multibyte_split_across_chunks() {
        let body = format!("{}data: [DONE]\n\n", chunk("Strong 💪 café"));
        let bytes = body.into_bytes();
        // Split inside the four bytes of the emoji.
        let emoji_at = bytes.iter().position(|&b| b == 0xF0).unwrap();
        let (a, b) = bytes.split_at(emoji_at + 2);
        let parts: Vec<reqwest::Result<Bytes>> = vec![
            Ok(Bytes::copy_from_slice(a)),
            Ok(Bytes::copy_from_slice(b)),
        ];

        let events: Vec<_> = parse_sse_stream(futures::stream::iter(parts))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .map(|e| e.unwrap())
            .collect();

        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta("Strong 💪 café".to_string()),
                StreamEvent::MessageStop,
            ]
        );
    }

    #[tokio::test]
    async fn test_parse_sse_stream_skips_empty_and_garbage() {
        let body = format!(
            ": keep-alive\n\ndata: not json\n\n{}{}",
            chunk(""),
            chunk("ok")
        );
        let parts: Vec<reqwest::Result<Bytes>> = vec![Ok(Bytes::from(body))];
        let events: Vec<_> = parse_sse_stream(futures::stream::iter(parts))
            .collect::<Vec<_>>()
            .await;
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::TextDelta("ok".to_string())
        );
    }

    #[tokio::test]
    async fn test_stream_chat_against_server() {
        let server = MockServer::start().await;
        let body = format!("{}{}data: [DONE]\n\n", chunk("Nice"), chunk(" lift!"));
        Mock::given(method("POST"))
            .and(path("/api/v1/chats_openai/c1/chat/completions"))
            .and(header_eq("authorization", "Bearer secret"))
            .and(body_partial_json(serde_json::json!({
                "stream": true,
                "session_id": "s1",
                "messages": [
                    {"role": "system", "content": "be nice"},
                    {"role": "user", "content": "I benched"}
                ]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let backend =
            OpenAiBackend::new(OpenAiConfig::ragflow(&server.uri(), "c1").with_api_key("secret"))
                .unwrap();
        let stream = backend
            .stream_chat(ChatRequest::new("be nice", "I benched", "s1"))
            .await
            .unwrap();
        let text: String = stream
            .filter_map(|e| async move {
                match e {
                    Ok(StreamEvent::TextDelta(t)) => Some(t),
                    _ => None,
                }
            })
            .collect()
            .await;
        assert_eq!(text, "Nice lift!");
    }

    #[tokio::test]
    async fn test_stream_chat_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new(OpenAiConfig::new(server.uri())).unwrap();
        let err = backend
            .stream_chat(ChatRequest::new("s", "q", "id"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, LlmError::Backend(_)));
    }
}
