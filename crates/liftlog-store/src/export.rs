//! JSON export of a user's workouts.

use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use liftlog_types::WorkoutEntry;

use crate::error::{Result, StoreError};
use crate::store::LiftlogStore;

/// Contents of an export file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub user_id: String,
    pub total_workouts: usize,
    /// Wall-clock time of the export, `YYYY-MM-DD HH:MM:SS`.
    pub last_updated: String,
    pub workouts: Vec<WorkoutEntry>,
}

/// Where an export was written and what it held.
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub path: PathBuf,
    pub document: ExportDocument,
}

/// File name for a user's export.
///
/// Characters outside `[A-Za-z0-9_.-]` become `_`. When that changes the id,
/// a short hash of the raw id is appended so that distinct ids such as
/// `a b` and `a_b` never share a file.
pub fn export_file_name(user_id: &str) -> String {
    let mut safe: String = user_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    // Never let a user id resolve to a dot-only path component.
    if safe.chars().all(|c| c == '.') {
        safe = safe.replace('.', "_");
    }
    if safe != user_id {
        safe = format!("{safe}_{}", short_hash(user_id));
    }
    format!("{safe}_workout_stats.json")
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..4])
}

impl LiftlogStore {
    /// Write every workout of `user_id` to `{dir}/{user}_workout_stats.json`.
    ///
    /// Ordered like [`query`](Self::query). Repeated exports with no writes in
    /// between differ only in `last_updated`.
    pub fn export(&self, user_id: &str, dir: impl AsRef<Path>) -> Result<ExportReport> {
        let dir = dir.as_ref();
        let workouts = self.all_workouts(user_id)?;
        let document = ExportDocument {
            user_id: user_id.to_string(),
            total_workouts: workouts.len(),
            last_updated: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            workouts,
        };

        std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = dir.join(export_file_name(user_id));
        let body = serde_json::to_string_pretty(&document)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        info!(
            user_id = %user_id,
            total = document.total_workouts,
            path = %path.display(),
            "Exported workouts"
        );
        Ok(ExportReport { path, document })
    }
}
