//! SQLite store implementation.
//!
//! Operations are split by table:
//! - `transcript_ops`: read-modify-write of per-session transcripts
//! - `workout_ops`: inserting and listing workout rows
//! - `summary_ops`: per-type aggregates and personal records

pub mod query;
mod summary_ops;
mod transcript_ops;
mod workout_ops;

use std::path::Path;

use chrono::{Local, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use liftlog_types::DEFAULT_USER_ID;

use crate::error::{Result, StoreError};

pub use query::{
    PersonalRecord, Transcript, TranscriptDraft, TypeSummary, WorkoutQuery, WorkoutSummary,
};

// ─────────────────────────────────────────────────────────────────────────────
// Schema Version
// ─────────────────────────────────────────────────────────────────────────────

/// Current schema version for migrations.
const SCHEMA_VERSION: i32 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Transcript and workout store backed by SQLite.
///
/// Uses WAL mode so readers are not blocked by the background writer.
pub struct LiftlogStore {
    pub(crate) conn: Mutex<Connection>,
    /// Owner recorded on transcripts.
    pub(crate) default_user: String,
}

impl std::fmt::Debug for LiftlogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiftlogStore")
            .field("default_user", &self.default_user)
            .finish_non_exhaustive()
    }
}

impl LiftlogStore {
    /// Open or create a store at the given path.
    ///
    /// Creates the parent directory and the schema if they don't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;

        let store = Self::from_connection(conn)?;
        info!(path = %path.display(), "Store opened");
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        let store = Self::from_connection(Connection::open_in_memory()?)?;
        debug!("In-memory store created");
        Ok(store)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
            default_user: DEFAULT_USER_ID.to_string(),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Set the user id recorded on new transcripts.
    pub fn with_default_user(mut self, user_id: impl Into<String>) -> Self {
        self.default_user = user_id.into();
        self
    }

    pub fn default_user(&self) -> &str {
        &self.default_user
    }

    /// Run a trivial query to confirm the database answers.
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    /// Apply pragmas and bring the schema up to date.
    fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        Self::create_schema(&conn)
    }

    fn create_schema(conn: &Connection) -> Result<()> {
        let current_version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if current_version >= SCHEMA_VERSION {
            debug!(version = current_version, "Schema up to date");
            return Ok(());
        }

        info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrating schema"
        );

        conn.execute_batch(
            r#"
            -- One transcript per chat session
            CREATE TABLE IF NOT EXISTS conversation (
                id TEXT PRIMARY KEY,
                dialog_id TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL DEFAULT '',
                message TEXT NOT NULL DEFAULT '[]',
                reference TEXT NOT NULL DEFAULT '[]',
                user_id TEXT NOT NULL,
                create_time INTEGER NOT NULL,
                create_date TEXT NOT NULL,
                update_time INTEGER NOT NULL,
                update_date TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_conversation_create_time
                ON conversation(create_time);

            -- One row per workout; magnitudes are stored in hundredths
            CREATE TABLE IF NOT EXISTS workout_stats (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                exercise_name TEXT NOT NULL,
                exercise_type TEXT NOT NULL,
                weight INTEGER,
                weight_unit TEXT,
                reps INTEGER,
                sets INTEGER,
                duration INTEGER,
                duration_unit TEXT,
                distance INTEGER,
                distance_unit TEXT,
                calories INTEGER,
                notes TEXT,
                workout_date TEXT NOT NULL,
                create_time INTEGER NOT NULL,
                create_date TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_workout_user_date
                ON workout_stats(user_id, workout_date);
            CREATE INDEX IF NOT EXISTS idx_workout_session
                ON workout_stats(session_id);
            CREATE INDEX IF NOT EXISTS idx_workout_exercise
                ON workout_stats(exercise_name);
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        info!(version = SCHEMA_VERSION, "Schema created");
        Ok(())
    }
}

/// Current instant as epoch milliseconds plus local wall-clock text.
pub(crate) fn now_stamp() -> (i64, String) {
    let millis = Utc::now().timestamp_millis();
    let wall = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    (millis, wall)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let store = LiftlogStore::open_in_memory().unwrap();
        assert_eq!(store.default_user(), "default_user");

        let conn = store.conn.lock();
        let version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_open_file_creates_parent_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("liftlog.db");

        {
            let store = LiftlogStore::open(&path).unwrap();
            store.append_turn("s1", "hello", "hi").unwrap();
        }

        let store = LiftlogStore::open(&path).unwrap();
        let transcript = store.read_transcript("s1").unwrap().unwrap();
        assert_eq!(transcript.messages.len(), 2);
    }

    #[test]
    fn test_ping() {
        LiftlogStore::open_in_memory().unwrap().ping().unwrap();
    }

    #[test]
    fn test_with_default_user() {
        let store = LiftlogStore::open_in_memory()
            .unwrap()
            .with_default_user("alice");
        store.append_turn("s1", "q", "a").unwrap();
        let draft = store.load_draft("s1").unwrap();
        assert_eq!(draft.user_id, "alice");
    }
}
