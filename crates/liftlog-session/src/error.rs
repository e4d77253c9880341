//! Error types for client context operations.

/// Error type for client context operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A client token was empty, too long, or contained disallowed characters.
    #[error("Invalid client token: {0}")]
    InvalidToken(String),
}

/// Result type for client context operations.
pub type Result<T> = std::result::Result<T, SessionError>;
