//! Ollama-style structured inference backend.
//!
//! Uses the non-streaming `/api/chat` endpoint for the primary call and
//! `/api/generate` for the single-prompt fallback.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::backend::{InferenceOptions, StructuredBackend};
use crate::error::{LlmError, Result, status_error};

/// Default local Ollama address.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Configuration for [`OllamaBackend`].
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

impl OllamaConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: model.into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Structured inference against an Ollama server.
pub struct OllamaBackend {
    client: Client,
    config: OllamaConfig,
}

impl OllamaBackend {
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn wire_options(options: &InferenceOptions) -> WireOptions {
        WireOptions {
            temperature: options.temperature,
            num_predict: options.num_predict,
        }
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
        options: &InferenceOptions,
    ) -> Result<R> {
        let url = format!("{}{}", self.config.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .timeout(options.timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl StructuredBackend for OllamaBackend {
    async fn chat_json(
        &self,
        system: &str,
        user: &str,
        options: &InferenceOptions,
    ) -> Result<String> {
        let body = WireChatRequest {
            model: &self.config.model,
            messages: [
                WireMessage {
                    role: "system",
                    content: system,
                },
                WireMessage {
                    role: "user",
                    content: user,
                },
            ],
            stream: false,
            format: options.json_format.then_some("json"),
            options: Self::wire_options(options),
        };

        tracing::debug!(model = %self.config.model, "Structured chat request");
        let response: WireChatResponse = self.post("/api/chat", &body, options).await?;
        Ok(response
            .message
            .map(|m| m.content)
            .unwrap_or_else(|| "[]".to_string()))
    }

    async fn generate(&self, prompt: &str, options: &InferenceOptions) -> Result<String> {
        let body = WireGenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            format: options.json_format.then_some("json"),
            options: Self::wire_options(options),
        };

        tracing::debug!(model = %self.config.model, "Structured generate request");
        let response: WireGenerateResponse = self.post("/api/generate", &body, options).await?;
        Ok(response.response.unwrap_or_else(|| "[]".to_string()))
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[derive(Debug, Serialize)]
struct WireOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct WireChatRequest<'a> {
    model: &'a str,
    messages: [WireMessage<'a>; 2],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: WireOptions,
}

#[derive(Debug, Serialize)]
struct WireGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: WireOptions,
}

#[derive(Debug, Deserialize)]
struct WireChatResponse {
    message: Option<WireResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct WireGenerateResponse {
    response: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn backend(server: &MockServer) -> OllamaBackend {
        OllamaBackend::new(OllamaConfig::new("llama3").with_base_url(server.uri())).unwrap()
    }

    #[tokio::test]
    async fn test_chat_json_sends_options() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama3",
                "stream": false,
                "format": "json",
                "options": {"num_predict": 1000}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": {"role": "assistant", "content": "[{\"exercise_name\":\"squat\"}]"}
            })))
            .mount(&server)
            .await;

        let out = backend(&server)
            .await
            .chat_json("sys", "user", &InferenceOptions::default())
            .await
            .unwrap();
        assert_eq!(out, r#"[{"exercise_name":"squat"}]"#);
    }

    #[tokio::test]
    async fn test_generate_reads_response_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"response": "[]"})),
            )
            .mount(&server)
            .await;

        let out = backend(&server)
            .await
            .generate("prompt", &InferenceOptions::default())
            .await
            .unwrap();
        assert_eq!(out, "[]");
    }

    #[tokio::test]
    async fn test_chat_json_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&server)
            .await;

        let err = backend(&server)
            .await
            .chat_json("s", "u", &InferenceOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_chat_json_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(serde_json::json!({"message": {"content": "[]"}})),
            )
            .mount(&server)
            .await;

        let options = InferenceOptions::default().with_timeout(Duration::from_millis(50));
        let err = backend(&server)
            .await
            .chat_json("s", "u", &options)
            .await
            .unwrap_err();
        assert!(err.is_network());
    }
}
