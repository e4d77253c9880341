//! CLI command handlers.

pub mod export;
pub mod start;
pub mod summary;

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use liftlog_config::LiftlogConfig;
use liftlog_store::LiftlogStore;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration (files + environment).
    pub config: LiftlogConfig,
    /// Default location of the database, exports and logs.
    pub data_dir: PathBuf,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    pub fn database_path(&self) -> PathBuf {
        self.config.storage().database_path(&self.data_dir)
    }

    pub fn stats_dir(&self) -> PathBuf {
        self.config.storage().stats_dir(&self.data_dir)
    }

    /// The configured user, unless one was given on the command line.
    pub fn user(&self, requested: Option<String>) -> String {
        requested
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.config.storage().default_user)
    }

    /// Open the workout database for offline commands.
    pub fn open_store(&self) -> Result<LiftlogStore> {
        let path = self.database_path();
        let store = LiftlogStore::open(&path)
            .with_context(|| format!("opening database {}", path.display()))?;
        Ok(store.with_default_user(self.config.storage().default_user))
    }
}
