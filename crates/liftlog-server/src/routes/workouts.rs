//! Workout record endpoints.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use liftlog_extract::read_candidate;
use liftlog_session::ClientToken;
use liftlog_store::{ExportDocument, WorkoutQuery, WorkoutSummary};
use liftlog_types::{ExerciseType, WorkoutEntry};

use crate::error::{Result, ServerError};
use crate::pipeline::{run_blocking, save_and_export};
use crate::state::AppState;

/// Session id recorded for manual entries made without an active session.
pub const MANUAL_SESSION_ID: &str = "manual_entry";

/// Default lookback window in days.
const DEFAULT_DAYS: i64 = 30;

// ─────────────────────────────────────────────────────────────────────────────
// Request/Response types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListWorkoutsQuery {
    pub user_id: Option<String>,
    pub days: Option<i64>,
    #[serde(rename = "type")]
    pub exercise_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListWorkoutsResponse {
    pub total: usize,
    pub workouts: Vec<WorkoutEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub user_id: Option<String>,
    pub days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExerciseHistoryResponse {
    pub exercise: String,
    pub total_sessions: usize,
    pub history: Vec<WorkoutEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddWorkoutResponse {
    pub success: bool,
    pub message: String,
    pub id: String,
}

fn parse_type(raw: Option<&str>) -> Result<Option<ExerciseType>> {
    let Some(raw) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    match raw.to_ascii_lowercase().as_str() {
        "strength" => Ok(Some(ExerciseType::Strength)),
        "cardio" => Ok(Some(ExerciseType::Cardio)),
        "other" => Ok(Some(ExerciseType::Other)),
        _ => Err(ServerError::BadRequest(format!("Unknown exercise type: {raw}"))),
    }
}

fn parse_days(days: Option<i64>) -> Result<i64> {
    match days {
        None => Ok(DEFAULT_DAYS),
        Some(d) if d >= 0 => Ok(d),
        Some(d) => Err(ServerError::BadRequest(format!("days must not be negative, got {d}"))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /workout-stats - list recent workouts.
pub async fn list_workouts_handler(
    State(state): State<AppState>,
    Query(query): Query<ListWorkoutsQuery>,
) -> Result<Json<ListWorkoutsResponse>> {
    let store = state.require_store()?;
    let mut filter = WorkoutQuery::new(state.config().user_or_default(query.user_id.as_deref()))
        .with_since_days(parse_days(query.days)?);
    if let Some(exercise_type) = parse_type(query.exercise_type.as_deref())? {
        filter = filter.with_type(exercise_type);
    }

    let workouts = run_blocking(store, move |s| s.query(&filter)).await?;
    Ok(Json(ListWorkoutsResponse {
        total: workouts.len(),
        workouts,
    }))
}

/// POST /workout-stats - record a workout typed in by hand.
pub async fn add_workout_handler(
    State(state): State<AppState>,
    Extension(client): Extension<ClientToken>,
    Json(body): Json<Value>,
) -> Result<Json<AddWorkoutResponse>> {
    let draft = read_candidate(&body)
        .ok_or_else(|| ServerError::BadRequest("exercise_name is required".into()))?;

    let workout_date = match body.get("workout_date").and_then(Value::as_str) {
        Some(raw) if !raw.trim().is_empty() => Some(
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
                ServerError::BadRequest(format!("workout_date must be YYYY-MM-DD, got {raw:?}"))
            })?,
        ),
        _ => None,
    };

    let user_id = state
        .config()
        .user_or_default(body.get("user_id").and_then(Value::as_str));
    let session_id = state
        .contexts
        .active_session(&client)
        .unwrap_or_else(|| MANUAL_SESSION_ID.to_string());

    let store = state.require_store()?;
    let (saved, _) = save_and_export(
        store,
        &session_id,
        &user_id,
        vec![draft],
        workout_date,
        state.config().stats_dir.clone(),
    )
    .await?;
    let id = saved
        .first()
        .map(|entry| entry.id.clone())
        .ok_or_else(|| ServerError::Internal("workout was not saved".into()))?;

    info!(user_id = %user_id, session_id = %session_id, id = %id, "Manual workout added");
    Ok(Json(AddWorkoutResponse {
        success: true,
        message: "Workout added successfully".to_string(),
        id,
    }))
}

/// GET /workout-stats/summary - per-type aggregates and personal records.
pub async fn summary_handler(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<WorkoutSummary>> {
    let store = state.require_store()?;
    let user_id = state.config().user_or_default(query.user_id.as_deref());
    let days = parse_days(query.days)?;

    let summary = run_blocking(store, move |s| s.summarize(&user_id, days)).await?;
    Ok(Json(summary))
}

/// GET /workout-stats/exercise/{name} - full history of one exercise.
pub async fn exercise_history_handler(
    State(state): State<AppState>,
    Path(exercise): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ExerciseHistoryResponse>> {
    let store = state.require_store()?;
    let user_id = state.config().user_or_default(query.user_id.as_deref());

    let name = exercise.clone();
    let history = run_blocking(store, move |s| s.history(&user_id, &name)).await?;
    Ok(Json(ExerciseHistoryResponse {
        exercise,
        total_sessions: history.len(),
        history,
    }))
}

/// GET /workout-stats/export - rewrite the export file and return its contents.
pub async fn export_handler(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ExportDocument>> {
    let store = state.require_store()?;
    let user_id = state.config().user_or_default(query.user_id.as_deref());
    let dir = state.config().stats_dir.clone();

    let report = run_blocking(store, move |s| s.export(&user_id, dir)).await?;
    Ok(Json(report.document))
}
