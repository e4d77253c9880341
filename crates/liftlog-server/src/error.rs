//! Error types for the server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use liftlog_llm::LlmError;
use liftlog_store::StoreError;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Authentication failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A dependency the request needs is not available.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Database or export failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// A collaborator service failed.
    #[error("Upstream error: {0}")]
    Upstream(#[from] LlmError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Upstream(LlmError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServerError::Internal(_)
            | ServerError::Storage(_)
            | ServerError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the response body.
    pub fn message(&self) -> String {
        match self {
            ServerError::Unauthorized(msg)
            | ServerError::NotFound(msg)
            | ServerError::BadRequest(msg)
            | ServerError::ServiceUnavailable(msg)
            | ServerError::Internal(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Server error");
        } else {
            tracing::warn!(status = %status, error = %self, "Client error");
        }

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
