//! Chat endpoint.

use std::convert::Infallible;

use axum::{
    Extension,
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::debug;

use liftlog_llm::ChatRequest;
use liftlog_session::ClientToken;

use crate::coordinator::stream_turn;
use crate::error::{Result, ServerError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AskQuery {
    pub question: Option<String>,
    pub session_id: Option<String>,
}

/// GET /ask - stream the assistant's answer as server-sent events.
pub async fn ask_handler(
    State(state): State<AppState>,
    Extension(client): Extension<ClientToken>,
    Query(query): Query<AskQuery>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let question = query
        .question
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ServerError::BadRequest("No question provided".into()))?;

    let session_id = state
        .resolve_session(&client, query.session_id.as_deref())
        .await?;
    let system = state.system_prompt(&client);
    debug!(client = %client, session_id = %session_id, "Starting chat turn");

    let events = stream_turn(state, ChatRequest::new(system, question, session_id))
        .map(|event| Ok::<_, Infallible>(event.into_sse()));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
