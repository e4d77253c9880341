//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [server]       # bind address, optional bearer token
//! [llm]          # chat-completion / session service
//! [extraction]   # structured extraction inference service
//! [storage]      # database and export locations
//! [workers]      # background persistence pool
//! [sessions]     # per-client context cache
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Environment variable holding the chat service API key.
pub const ENV_API_KEY: &str = "LIFTLOG_API_KEY";
/// Environment variable holding the chat model name.
pub const ENV_MODEL: &str = "LIFTLOG_MODEL";
/// Environment variable holding the chat service base URL.
pub const ENV_BASE_URL: &str = "LIFTLOG_BASE_URL";
/// Environment variable holding the chat assistant id.
pub const ENV_CHAT_ID: &str = "LIFTLOG_CHAT_ID";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LiftlogConfig {
    pub server: Option<ServerConfig>,
    pub llm: Option<LlmConfig>,
    pub extraction: Option<ExtractionConfig>,
    pub storage: Option<StorageConfig>,
    pub workers: Option<WorkersConfig>,
    pub sessions: Option<SessionsConfig>,
}

impl LiftlogConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced wholesale, not field by field.
    pub fn merge(&mut self, other: LiftlogConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }
        if other.llm.is_some() {
            self.llm = other.llm;
        }
        if other.extraction.is_some() {
            self.extraction = other.extraction;
        }
        if other.storage.is_some() {
            self.storage = other.storage;
        }
        if other.workers.is_some() {
            self.workers = other.workers;
        }
        if other.sessions.is_some() {
            self.sessions = other.sessions;
        }
    }

    /// Apply `LIFTLOG_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply `LIFTLOG_*` overrides using an arbitrary lookup.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let llm = self.llm.get_or_insert_with(LlmConfig::default);
        if let Some(v) = get(ENV_API_KEY) {
            llm.api_key = Some(v);
        }
        if let Some(v) = get(ENV_MODEL) {
            llm.model = Some(v);
        }
        if let Some(v) = get(ENV_BASE_URL) {
            llm.base_url = Some(v);
        }
        if let Some(v) = get(ENV_CHAT_ID) {
            llm.chat_id = Some(v);
        }
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        let workers = self.workers();
        if workers.workers == 0 {
            return Err(ConfigError::Invalid {
                field: "workers.workers".to_string(),
                reason: "at least one worker is required".to_string(),
            });
        }
        if workers.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "workers.queue_capacity".to_string(),
                reason: "queue capacity must be positive".to_string(),
            });
        }
        if self.sessions().max_clients == 0 {
            return Err(ConfigError::Invalid {
                field: "sessions.max_clients".to_string(),
                reason: "client cache capacity must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    pub fn llm(&self) -> LlmConfig {
        self.llm.clone().unwrap_or_default()
    }

    pub fn extraction(&self) -> ExtractionConfig {
        self.extraction.clone().unwrap_or_default()
    }

    pub fn storage(&self) -> StorageConfig {
        self.storage.clone().unwrap_or_default()
    }

    pub fn workers(&self) -> WorkersConfig {
        self.workers.clone().unwrap_or_default()
    }

    pub fn sessions(&self) -> SessionsConfig {
        self.sessions.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Address to bind to.
    pub bind: String,
    /// Static bearer token. When set, every route except `/health` requires it.
    pub auth_token: Option<String>,
    /// Enable request logging middleware.
    pub request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            bind: "127.0.0.1".to_string(),
            auth_token: None,
            request_logging: true,
        }
    }
}

impl ServerConfig {
    /// `bind:port` string suitable for a socket address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat service
// ─────────────────────────────────────────────────────────────────────────────

/// Chat-completion and session-provisioning service (RAGFlow-style).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: Option<String>,
    /// Assistant id the sessions and completions belong to.
    pub chat_id: Option<String>,
    /// Prefer `LIFTLOG_API_KEY` over storing this in a file.
    pub api_key: Option<String>,
    pub model: Option<String>,
    /// Abort a stream that produces nothing for this many seconds.
    pub stream_idle_timeout_secs: Option<u64>,
}

impl LlmConfig {
    /// True if an API key is set directly in a config file.
    pub fn has_plaintext_api_key(&self) -> bool {
        self.api_key.as_ref().is_some_and(|k| !k.is_empty())
    }

    pub fn require_base_url(&self) -> Result<&str> {
        self.base_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField {
                field: "base_url".to_string(),
                context: format!("[llm] (or {ENV_BASE_URL})"),
            })
    }

    pub fn require_chat_id(&self) -> Result<&str> {
        self.chat_id
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField {
                field: "chat_id".to_string(),
                context: format!("[llm] (or {ENV_CHAT_ID})"),
            })
    }

    pub fn stream_idle_timeout(&self) -> Option<Duration> {
        self.stream_idle_timeout_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Extraction
// ─────────────────────────────────────────────────────────────────────────────

/// Structured extraction inference service (Ollama-style).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub base_url: String,
    /// Falls back to `[llm].model`, then `llama2`.
    pub model: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub num_predict: u32,
    /// History entries included as context.
    pub max_history: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: None,
            timeout_secs: 60,
            temperature: 0.1,
            num_predict: 1000,
            max_history: 3,
        }
    }
}

impl ExtractionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Model to use, falling back to the chat model.
    pub fn resolve_model(&self, llm: &LlmConfig) -> String {
        self.model
            .clone()
            .or_else(|| llm.model.clone())
            .unwrap_or_else(|| "llama2".to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Storage
// ─────────────────────────────────────────────────────────────────────────────

/// Database and export locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file. Defaults to `<data_dir>/liftlog.db`.
    pub database: Option<PathBuf>,
    /// Export directory. Defaults to `<data_dir>/workout_stats`.
    pub stats_dir: Option<PathBuf>,
    pub default_user: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: None,
            stats_dir: None,
            default_user: liftlog_types::DEFAULT_USER_ID.to_string(),
        }
    }
}

impl StorageConfig {
    pub fn database_path(&self, data_dir: &std::path::Path) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| data_dir.join("liftlog.db"))
    }

    pub fn stats_dir(&self, data_dir: &std::path::Path) -> PathBuf {
        self.stats_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("workout_stats"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Workers
// ─────────────────────────────────────────────────────────────────────────────

/// Background persistence pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub workers: usize,
    /// Pending jobs per worker before new jobs are dropped.
    pub queue_capacity: usize,
    pub shutdown_grace_secs: u64,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 64,
            shutdown_grace_secs: 10,
        }
    }
}

impl WorkersConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sessions
// ─────────────────────────────────────────────────────────────────────────────

/// Per-client context cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Maximum number of client contexts before LRU eviction.
    pub max_clients: usize,
    /// Idle time after which a client context expires. `0` disables expiry.
    pub ttl_secs: u64,
    /// Interval in seconds between cleanup runs.
    pub cleanup_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_clients: 10_000,
            ttl_secs: 7 * 24 * 60 * 60,
            cleanup_interval_secs: 60,
        }
    }
}

impl SessionsConfig {
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}
