//! Error types for the collaborator clients.

use thiserror::Error;

/// Result type alias using the LLM error type.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Error type for collaborator operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The service answered with an error status or error payload.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Network/connectivity error, including timeouts.
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error (missing URL, assistant id, etc.).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Response body could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Authentication failed.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LlmError {
    /// True for failures caused by the transport rather than the service.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            LlmError::Network(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            LlmError::Serialization(err.to_string())
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Serialization(err.to_string())
    }
}

/// Map a non-success HTTP status and body to an error.
pub(crate) fn status_error(status: reqwest::StatusCode, body: &str) -> LlmError {
    let snippet: String = body.chars().take(300).collect();
    match status.as_u16() {
        401 | 403 => LlmError::Auth(format!("HTTP {}: {}", status, snippet)),
        404 => LlmError::NotFound(format!("HTTP {}: {}", status, snippet)),
        _ => LlmError::Backend(format!("HTTP {}: {}", status, snippet)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_mapping() {
        let err = status_error(reqwest::StatusCode::UNAUTHORIZED, "nope");
        assert!(matches!(err, LlmError::Auth(_)));

        let err = status_error(reqwest::StatusCode::NOT_FOUND, "");
        assert!(matches!(err, LlmError::NotFound(_)));

        let err = status_error(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("boom"));
        assert!(!err.is_network());
    }

    #[test]
    fn test_is_network() {
        assert!(LlmError::Network("timeout".to_string()).is_network());
        assert!(!LlmError::Config("bad".to_string()).is_network());
    }
}
