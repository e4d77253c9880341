//! Health check endpoint.
//!
//! Always answers 200 so it can serve as a liveness check. `status` turns
//! `degraded` when the workout database is missing or not answering; chat
//! still works in that state.

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::pipeline::run_blocking;
use crate::state::AppState;

/// State of the workout database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreHealth {
    Ok,
    /// Started without a database.
    Disabled,
    Failing,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok` or `degraded`.
    pub status: String,
    pub version: String,
    pub chat_backend: String,
    pub store: StoreHealth,
    pub extraction: bool,
    /// Background jobs queued or running.
    pub pending_jobs: usize,
    pub clients: usize,
}

async fn store_health(state: &AppState) -> StoreHealth {
    let Some(store) = &state.store else {
        return StoreHealth::Disabled;
    };
    match run_blocking(store, |s| s.ping()).await {
        Ok(()) => StoreHealth::Ok,
        Err(e) => {
            warn!(error = %e, "Health check: store not answering");
            StoreHealth::Failing
        }
    }
}

/// GET /health (no auth required).
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = store_health(&state).await;
    let status = if store == StoreHealth::Ok { "ok" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        chat_backend: state.chat.name().to_string(),
        store,
        extraction: state.extractor.is_some(),
        pending_jobs: state.workers.pending(),
        clients: state.contexts.len(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
