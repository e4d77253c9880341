//! Authentication middleware.
//!
//! When an auth token is configured every API request must carry it as
//! `Authorization: Bearer <token>`. Token comparison is constant-time.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::state::AppState;

/// Authentication error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Missing authorization header.
    MissingToken,
    /// Invalid token format.
    InvalidFormat,
    /// Token validation failed.
    InvalidToken,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Missing authorization token"),
            AuthError::InvalidFormat => write!(f, "Invalid authorization format"),
            AuthError::InvalidToken => write!(f, "Invalid token"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::InvalidFormat => StatusCode::BAD_REQUEST,
            AuthError::MissingToken | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
        };
        tracing::warn!(status = %status, error = %self, "Rejected request");

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

/// Compare two strings in constant time.
///
/// Unequal lengths still perform a comparison so timing does not reveal
/// how long the expected token is.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    if a_bytes.len() == b_bytes.len() {
        a_bytes.ct_eq(b_bytes).into()
    } else {
        let _ = a_bytes.ct_eq(a_bytes);
        false
    }
}

/// Reject requests that do not present the configured token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    validate_request(&request, state.config().auth_token.as_deref())?;
    Ok(next.run(request).await)
}

fn validate_request(request: &Request<Body>, expected: Option<&str>) -> Result<(), AuthError> {
    // No token configured: localhost mode.
    let Some(expected) = expected else {
        return Ok(());
    };

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?;
    let value = header.to_str().map_err(|_| AuthError::InvalidFormat)?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidFormat)?;

    if constant_time_eq(token, expected) {
        Ok(())
    } else {
        Err(AuthError::InvalidToken)
    }
}
