//! Query, result, and draft types for store operations.

use chrono::{Local, NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use liftlog_types::{ChatMessage, DEFAULT_USER_ID, ExerciseType, Fixed2, Role, WeightUnit};

// ─────────────────────────────────────────────────────────────────────────────
// Transcripts
// ─────────────────────────────────────────────────────────────────────────────

/// Characters of the first user text kept as the transcript name.
pub const TRANSCRIPT_NAME_LIMIT: usize = 255;

/// A transcript loaded for modification.
///
/// Produced by [`LiftlogStore::load_draft`](super::LiftlogStore::load_draft)
/// and written back by
/// [`LiftlogStore::commit_draft`](super::LiftlogStore::commit_draft). Nothing
/// holds the row between the two calls: a second writer that loaded the same
/// session in between is overwritten by whichever commits last.
///
/// `entries` holds the stored list as parsed. Existing entries are written
/// back untouched, whatever their shape; only appended turns are built here.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptDraft {
    pub session_id: String,
    /// Row id; generated for sessions that have no row yet.
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub entries: Vec<Value>,
    pub(crate) existing: bool,
}

impl TranscriptDraft {
    pub(crate) fn empty(session_id: &str, user_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            id: uuid::Uuid::new_v4().simple().to_string(),
            name: String::new(),
            user_id: user_id.to_string(),
            entries: Vec::new(),
            existing: false,
        }
    }

    /// Whether the session had no stored row when loaded.
    pub fn is_new(&self) -> bool {
        !self.existing
    }

    /// The entries read as chat messages, skipping those without text content.
    pub fn messages(&self) -> Vec<ChatMessage> {
        normalize_entries(&self.entries)
    }

    /// Append one user/assistant exchange.
    pub fn push_turn(&mut self, user_text: &str, assistant_text: &str) {
        if self.name.is_empty() {
            self.name = user_text.chars().take(TRANSCRIPT_NAME_LIMIT).collect();
        }
        self.entries.push(json!({ "role": "user", "content": user_text }));
        self.entries.push(json!({ "role": "assistant", "content": assistant_text }));
    }
}

/// Read stored entries as chat messages.
///
/// Entries without string content are skipped; a missing or unknown role
/// reads as assistant.
pub(crate) fn normalize_entries(entries: &[Value]) -> Vec<ChatMessage> {
    entries
        .iter()
        .filter_map(|item| {
            let content = item.get("content")?.as_str()?;
            let role = item
                .get("role")
                .and_then(Value::as_str)
                .map(Role::parse_lenient)
                .unwrap_or(Role::Assistant);
            Some(ChatMessage {
                role,
                content: content.to_string(),
            })
        })
        .collect()
}

/// A stored transcript as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transcript {
    pub session_id: String,
    pub name: String,
    pub messages: Vec<ChatMessage>,
    /// Wall-clock creation time, `YYYY-MM-DD HH:MM:SS`.
    pub created_at: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Workout queries
// ─────────────────────────────────────────────────────────────────────────────

/// Default lookback window in days.
pub const DEFAULT_SINCE_DAYS: i64 = 30;

/// Filter for listing workouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkoutQuery {
    pub user_id: String,
    /// Only workouts dated on or after `today - since_days`.
    pub since_days: i64,
    pub exercise_type: Option<ExerciseType>,
    /// Reference date; today when unset.
    pub as_of: Option<NaiveDate>,
}

impl Default for WorkoutQuery {
    fn default() -> Self {
        Self::new(DEFAULT_USER_ID)
    }
}

impl WorkoutQuery {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            since_days: DEFAULT_SINCE_DAYS,
            exercise_type: None,
            as_of: None,
        }
    }

    pub fn with_since_days(mut self, days: i64) -> Self {
        self.since_days = days;
        self
    }

    pub fn with_type(mut self, exercise_type: ExerciseType) -> Self {
        self.exercise_type = Some(exercise_type);
        self
    }

    pub fn with_as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }

    /// Earliest included `workout_date`.
    pub fn cutoff(&self) -> NaiveDate {
        cutoff_date(self.as_of, self.since_days)
    }
}

pub(crate) fn cutoff_date(as_of: Option<NaiveDate>, since_days: i64) -> NaiveDate {
    let today = as_of.unwrap_or_else(|| Local::now().date_naive());
    TimeDelta::try_days(since_days)
        .and_then(|delta| today.checked_sub_signed(delta))
        .unwrap_or(NaiveDate::MIN)
}

// ─────────────────────────────────────────────────────────────────────────────
// Summary
// ─────────────────────────────────────────────────────────────────────────────

/// Aggregates for one exercise type over the summary window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSummary {
    pub exercise_type: ExerciseType,
    pub workout_count: i64,
    /// Distinct workout dates.
    pub days_worked_out: i64,
    /// Rows without a set count contribute one set.
    pub total_sets: i64,
    pub total_reps: Option<i64>,
    /// Mean of the non-null weights, rounded to two decimal places.
    pub avg_weight: Option<Fixed2>,
    pub max_weight: Option<Fixed2>,
    pub total_duration: Option<i64>,
    pub total_distance: Option<Fixed2>,
}

/// Heaviest recorded weight for one exercise and unit, across all time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalRecord {
    pub exercise_name: String,
    pub max_weight: Fixed2,
    pub weight_unit: Option<WeightUnit>,
}

/// Result of [`LiftlogStore::summarize`](super::LiftlogStore::summarize).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutSummary {
    pub summary_by_type: Vec<TypeSummary>,
    pub personal_records: Vec<PersonalRecord>,
    pub period_days: i64,
}
