//! Chat session endpoints.
//!
//! Sessions live in the provisioning service. Transcripts are read from the
//! local store first, with the provisioning service as fallback when the
//! store is unavailable.

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Local;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use tracing::{debug, info, warn};

use liftlog_llm::SessionInfo;
use liftlog_session::ClientToken;
use liftlog_store::Transcript;
use liftlog_types::ChatMessage;

use crate::error::{Result, ServerError};
use crate::pipeline::run_blocking;
use crate::state::AppState;

/// Name shown for sessions whose name is unknown.
pub const UNNAMED_SESSION: &str = "Unnamed Session";

// ─────────────────────────────────────────────────────────────────────────────
// Request/Response types
// ─────────────────────────────────────────────────────────────────────────────

/// Session summary for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    pub message_count: usize,
    pub created_at: Option<String>,
}

impl From<SessionInfo> for SessionSummary {
    fn from(info: SessionInfo) -> Self {
        Self {
            message_count: info.message_count.max(info.messages.len()),
            id: info.id,
            name: info.name,
            created_at: info.created_at,
        }
    }
}

impl From<Transcript> for SessionSummary {
    fn from(t: Transcript) -> Self {
        Self {
            id: t.session_id,
            name: t.name,
            message_count: t.messages.len(),
            created_at: Some(t.created_at),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionNameRequest {
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionMessagesResponse {
    pub messages: Vec<ChatMessage>,
    pub session_id: String,
    pub session_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CurrentSessionResponse {
    pub active_session: Option<String>,
    pub session_name: String,
    pub messages: Vec<ChatMessage>,
}

/// Decode an optional JSON body; an empty body is the default value.
fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ServerError::BadRequest(format!("Invalid JSON body: {e}")))
}

fn default_session_name() -> String {
    format!("Workout Session {}", Local::now().format("%Y-%m-%d"))
}

fn visible(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    messages
        .into_iter()
        .filter(|m| !m.content.is_empty())
        .collect()
}

/// Transcript from the local store. `Err` means the store could not be used.
async fn stored_transcript(state: &AppState, session_id: &str) -> Result<Option<Transcript>> {
    let store = state.require_store()?;
    let id = session_id.to_string();
    run_blocking(store, move |s| s.read_transcript(&id)).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /sessions - list sessions, newest first.
pub async fn list_sessions_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<SessionSummary>>> {
    let limit = state.config().session_page_size;
    match state.provisioner.list_sessions(limit).await {
        Ok(sessions) => Ok(Json(sessions.into_iter().map(SessionSummary::from).collect())),
        Err(e) => {
            let Some(store) = &state.store else {
                return Err(e.into());
            };
            warn!(error = %e, "Session listing failed, using local transcripts");
            let transcripts = run_blocking(store, move |s| s.list_transcripts(limit)).await?;
            Ok(Json(transcripts.into_iter().map(SessionSummary::from).collect()))
        }
    }
}

/// POST /sessions - create a session and make it active.
pub async fn create_session_handler(
    State(state): State<AppState>,
    Extension(client): Extension<ClientToken>,
    body: Bytes,
) -> Result<Json<SessionSummary>> {
    let request: SessionNameRequest = optional_json(&body)?;
    let name = request
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(default_session_name);

    let created = state.provisioner.create_session(&name).await?;
    state.contexts.set_active_session(&client, &created.id);
    info!(session_id = %created.id, name = %created.name, "Session created");

    Ok(Json(SessionSummary {
        id: created.id,
        name: created.name,
        message_count: 0,
        created_at: created.created_at,
    }))
}

/// POST /sessions/{id}/activate - make a session the client's active one.
pub async fn activate_session_handler(
    State(state): State<AppState>,
    Extension(client): Extension<ClientToken>,
    Path(session_id): Path<String>,
) -> Json<serde_json::Value> {
    state.contexts.set_active_session(&client, &session_id);
    Json(json!({ "active_session": session_id }))
}

/// POST /sessions/{id}/rename
pub async fn rename_session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    let request: SessionNameRequest = optional_json(&body)?;
    let name = request
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ServerError::BadRequest("Missing name".into()))?;

    state.provisioner.rename_session(&session_id, &name).await?;
    info!(session_id = %session_id, name = %name, "Session renamed");
    Ok(Json(json!({ "id": session_id, "name": name })))
}

/// DELETE /sessions/{id}
///
/// When the deleted session was the client's active one, another session is
/// resolved (or created) to take its place.
pub async fn delete_session_handler(
    State(state): State<AppState>,
    Extension(client): Extension<ClientToken>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.provisioner.delete_session(&session_id).await?;

    if let Some(store) = &state.store {
        let id = session_id.clone();
        if let Err(e) = run_blocking(store, move |s| s.delete_transcript(&id)).await {
            warn!(session_id = %session_id, error = %e, "Could not delete local transcript");
        }
    }

    if state.contexts.clear_active_session_if(&client, &session_id) {
        match state.provisioner.latest_or_create().await {
            Ok(id) => state.contexts.set_active_session(&client, id),
            Err(e) => warn!(error = %e, "No session to replace the deleted one"),
        }
    }
    info!(session_id = %session_id, "Session deleted");

    Ok(Json(json!({
        "success": true,
        "new_active_session": state.contexts.active_session(&client),
    })))
}

/// GET /sessions/{id}/messages - the session's transcript.
pub async fn session_messages_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match stored_transcript(&state, &session_id).await {
        Ok(transcript) => {
            let (messages, session_name) = match transcript {
                Some(t) => (t.messages, t.name),
                None => (Vec::new(), UNNAMED_SESSION.to_string()),
            };
            debug!(session_id = %session_id, count = messages.len(), "Read transcript");
            Json(SessionMessagesResponse {
                messages,
                session_id,
                session_name,
            })
            .into_response()
        }
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "Store unavailable, asking session service");
            messages_from_provisioner(&state, session_id).await
        }
    }
}

async fn messages_from_provisioner(state: &AppState, session_id: String) -> Response {
    match state.provisioner.get_session(&session_id).await {
        Ok(Some(info)) => Json(SessionMessagesResponse {
            messages: visible(info.messages),
            session_id,
            session_name: info.name,
        })
        .into_response(),
        Ok(None) => {
            warn!(session_id = %session_id, "Session not found");
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Session not found", "messages": [] })),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "Could not read session messages");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": e.to_string(),
                    "messages": [],
                    "session_id": session_id,
                    "session_name": "Error",
                })),
            )
                .into_response()
        }
    }
}

/// GET /current-session - the client's active session with its messages.
pub async fn current_session_handler(
    State(state): State<AppState>,
    Extension(client): Extension<ClientToken>,
) -> Response {
    let session_id = match state.resolve_session(&client, None).await {
        Ok(id) => id,
        Err(_) => {
            return Json(json!({
                "active_session": null,
                "error": "Could not create session",
            }))
            .into_response();
        }
    };

    let mut messages = Vec::new();
    let mut session_name = UNNAMED_SESSION.to_string();
    match stored_transcript(&state, &session_id).await {
        Ok(Some(t)) => {
            messages = t.messages;
            session_name = t.name;
        }
        Ok(None) => {}
        Err(e) => warn!(session_id = %session_id, error = %e, "Could not read transcript"),
    }

    if messages.is_empty()
        && let Ok(Some(info)) = state.provisioner.get_session(&session_id).await
    {
        session_name = info.name;
    }

    Json(CurrentSessionResponse {
        active_session: Some(session_id),
        session_name,
        messages,
    })
    .into_response()
}
