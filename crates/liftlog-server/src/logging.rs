//! Per-request access logging.

use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::state::AppState;

/// Log method, path, status and latency of each request.
///
/// Server errors log at `error`, client errors at `warn`, everything else at
/// `info`. Streaming responses are logged when headers are sent, not when
/// the stream ends.
pub async fn request_logging_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config().request_logging {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis() as u64;

    if response.status().is_server_error() {
        tracing::error!(%method, %path, status, duration_ms, "Request completed with server error");
    } else if response.status().is_client_error() {
        tracing::warn!(%method, %path, status, duration_ms, "Request completed with client error");
    } else {
        tracing::info!(%method, %path, status, duration_ms, "Request completed");
    }

    response
}
