//! Persistent storage for LiftLog.
//!
//! One SQLite database holds two tables:
//! - `conversation`: one append-only transcript row per chat session
//! - `workout_stats`: one row per detected or manually entered workout
//!
//! [`LiftlogStore`] wraps a single connection behind a mutex; every
//! operation is one short critical section. [`export`] writes a user's
//! workouts to a pretty-printed JSON file.

pub mod error;
pub mod export;
pub mod store;

pub use error::{Result, StoreError};
pub use export::{ExportDocument, ExportReport, export_file_name};
pub use store::{
    LiftlogStore, PersonalRecord, Transcript, TranscriptDraft, TypeSummary, WorkoutQuery,
    WorkoutSummary,
};
