//! Post-turn persistence.
//!
//! After a chat turn completes, its question and answer are merged into the
//! stored transcript, workouts are extracted from the question, saved, and
//! the user's export file is refreshed. Each step logs and carries on when
//! it fails; nothing here reports back to the request that produced the turn.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use liftlog_extract::WorkoutExtractor;
use liftlog_store::LiftlogStore;
use liftlog_types::{ChatMessage, WorkoutDraft, WorkoutEntry};

use crate::error::{Result, ServerError};

/// A question and the full answer streamed back for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedTurn {
    pub session_id: String,
    pub question: String,
    pub answer: String,
}

/// What a persist run managed to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistReport {
    pub transcript_saved: bool,
    pub records_saved: usize,
    pub exported: Option<PathBuf>,
}

/// Run a synchronous store call on the blocking pool.
pub async fn run_blocking<T, F>(store: &Arc<LiftlogStore>, f: F) -> Result<T>
where
    F: FnOnce(&LiftlogStore) -> liftlog_store::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| ServerError::Internal(format!("store task failed: {e}")))?
        .map_err(ServerError::from)
}

/// Save `drafts` and, when any were saved, rewrite the user's export file.
///
/// A failed export is logged; the saved rows are still returned.
pub async fn save_and_export(
    store: &Arc<LiftlogStore>,
    session_id: &str,
    user_id: &str,
    drafts: Vec<WorkoutDraft>,
    workout_date: Option<NaiveDate>,
    stats_dir: PathBuf,
) -> Result<(Vec<WorkoutEntry>, Option<PathBuf>)> {
    let (session, user) = (session_id.to_string(), user_id.to_string());
    let saved = run_blocking(store, move |s| {
        s.save_records(&session, &user, &drafts, workout_date)
    })
    .await?;
    if saved.is_empty() {
        return Ok((saved, None));
    }

    let user = user_id.to_string();
    let exported = match run_blocking(store, move |s| s.export(&user, stats_dir)).await {
        Ok(report) => Some(report.path),
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Export refresh failed");
            None
        }
    };
    Ok((saved, exported))
}

/// Persists completed turns.
#[derive(Clone)]
pub struct TurnPersister {
    store: Option<Arc<LiftlogStore>>,
    extractor: Option<WorkoutExtractor>,
    user_id: String,
    stats_dir: PathBuf,
}

impl TurnPersister {
    pub fn new(
        store: Option<Arc<LiftlogStore>>,
        extractor: Option<WorkoutExtractor>,
        user_id: impl Into<String>,
        stats_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            extractor,
            user_id: user_id.into(),
            stats_dir: stats_dir.into(),
        }
    }

    pub async fn persist(&self, turn: &CompletedTurn) -> PersistReport {
        let mut report = PersistReport::default();
        let Some(store) = &self.store else {
            warn!(session_id = %turn.session_id, "No database, skipping turn persistence");
            return report;
        };

        let history = match self.merge_transcript(store, turn).await {
            Ok(history) => {
                report.transcript_saved = true;
                history
            }
            Err(e) => {
                warn!(session_id = %turn.session_id, error = %e, "Transcript merge failed");
                Vec::new()
            }
        };

        let Some(extractor) = &self.extractor else {
            return report;
        };
        let drafts = extractor.extract(&turn.question, &history).await;
        if drafts.is_empty() {
            debug!(session_id = %turn.session_id, "No workouts in turn");
            return report;
        }

        match save_and_export(
            store,
            &turn.session_id,
            &self.user_id,
            drafts,
            None,
            self.stats_dir.clone(),
        )
        .await
        {
            Ok((saved, exported)) => {
                info!(
                    session_id = %turn.session_id,
                    count = saved.len(),
                    "Saved workouts from turn"
                );
                report.records_saved = saved.len();
                report.exported = exported;
            }
            Err(e) => {
                warn!(session_id = %turn.session_id, error = %e, "Saving workouts failed");
            }
        }
        report
    }

    /// Append the turn to the transcript. Returns the messages that preceded it.
    async fn merge_transcript(
        &self,
        store: &Arc<LiftlogStore>,
        turn: &CompletedTurn,
    ) -> Result<Vec<ChatMessage>> {
        let turn = turn.clone();
        run_blocking(store, move |s| {
            let mut draft = s.load_draft(&turn.session_id)?;
            let history = draft.messages();
            draft.push_turn(&turn.question, &turn.answer);
            s.commit_draft(&draft)?;
            Ok(history)
        })
        .await
    }
}

impl std::fmt::Debug for TurnPersister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnPersister")
            .field("has_store", &self.store.is_some())
            .field("has_extractor", &self.extractor.is_some())
            .field("user_id", &self.user_id)
            .field("stats_dir", &self.stats_dir)
            .finish()
    }
}
