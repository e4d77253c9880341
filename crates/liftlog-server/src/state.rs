//! Application state shared across handlers.

use std::sync::Arc;

use tracing::{debug, warn};

use liftlog_extract::WorkoutExtractor;
use liftlog_llm::{SharedChatBackend, SharedMirror, SharedProvisioner};
use liftlog_session::{ClientContextStore, ClientToken, ContextStoreConfig};
use liftlog_store::LiftlogStore;

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::persona::build_system_prompt;
use crate::pipeline::{CompletedTurn, TurnPersister};
use crate::worker::{PoolConfig, WorkerPool};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Primary streaming chat service.
    pub chat: SharedChatBackend,

    /// Creates, lists, renames and deletes chat sessions.
    pub provisioner: SharedProvisioner,

    /// Receives a copy of each completed exchange (optional).
    pub mirror: Option<SharedMirror>,

    /// Transcript and workout storage (None when the database could not be opened).
    pub store: Option<Arc<LiftlogStore>>,

    /// Workout extraction (None disables it).
    pub extractor: Option<WorkoutExtractor>,

    /// Per-client active session, profile and settings.
    pub contexts: ClientContextStore,

    /// Background jobs run after each completed turn.
    pub workers: Arc<WorkerPool>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Starts a worker pool with default settings, so this must run inside a
    /// tokio runtime.
    pub fn new(
        config: ServerConfig,
        chat: SharedChatBackend,
        provisioner: SharedProvisioner,
    ) -> Self {
        Self {
            config: Arc::new(config),
            chat,
            provisioner,
            mirror: None,
            store: None,
            extractor: None,
            contexts: ClientContextStore::new(ContextStoreConfig::default()),
            workers: Arc::new(WorkerPool::new(PoolConfig::default())),
        }
    }

    pub fn with_mirror(mut self, mirror: SharedMirror) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn with_store(mut self, store: Arc<LiftlogStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_extractor(mut self, extractor: WorkoutExtractor) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_contexts(mut self, contexts: ClientContextStore) -> Self {
        self.contexts = contexts;
        self
    }

    pub fn with_workers(mut self, workers: Arc<WorkerPool>) -> Self {
        self.workers = workers;
        self
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The store, or an error for handlers that cannot work without it.
    pub fn require_store(&self) -> Result<&Arc<LiftlogStore>> {
        self.store
            .as_ref()
            .ok_or_else(|| ServerError::ServiceUnavailable("Database connection failed".into()))
    }

    /// Session a client's request should use.
    ///
    /// An explicitly requested id wins, then the client's active session,
    /// then the provisioning service's latest (created when none exist). The
    /// result becomes the client's active session.
    pub async fn resolve_session(
        &self,
        client: &ClientToken,
        requested: Option<&str>,
    ) -> Result<String> {
        if let Some(id) = requested.map(str::trim).filter(|id| !id.is_empty()) {
            self.contexts.set_active_session(client, id);
            return Ok(id.to_string());
        }
        if let Some(id) = self.contexts.active_session(client) {
            return Ok(id);
        }

        let id = self.provisioner.latest_or_create().await.map_err(|e| {
            warn!(client = %client, error = %e, "Could not resolve a session");
            ServerError::Internal("Could not create session".into())
        })?;
        self.contexts.set_active_session(client, &id);
        Ok(id)
    }

    /// Personalized system instruction for a client.
    pub fn system_prompt(&self, client: &ClientToken) -> String {
        let ctx = self.contexts.get(client);
        build_system_prompt(&ctx.settings, &ctx.profile)
    }

    pub fn persister(&self) -> TurnPersister {
        TurnPersister::new(
            self.store.clone(),
            self.extractor.clone(),
            self.config.default_user.clone(),
            self.config.stats_dir.clone(),
        )
    }

    /// Hand a completed turn to background work: the persist job goes on the
    /// worker pool, the mirror call is spawned. Returns without waiting.
    pub fn dispatch_completed(&self, turn: CompletedTurn) {
        let turn = Arc::new(turn);

        if let Some(mirror) = &self.mirror {
            let mirror = Arc::clone(mirror);
            let turn = Arc::clone(&turn);
            tokio::spawn(async move {
                match mirror
                    .mirror(&turn.session_id, &turn.question, &turn.answer)
                    .await
                {
                    Ok(()) => debug!(session_id = %turn.session_id, "Mirrored turn"),
                    Err(e) => {
                        warn!(session_id = %turn.session_id, error = %e, "Mirroring turn failed")
                    }
                }
            });
        }

        let persister = self.persister();
        let key = turn.session_id.clone();
        self.workers.enqueue(&key, async move {
            persister.persist(&turn).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liftlog_llm::{MockChatBackend, MockProvisioner};

    fn state(provisioner: MockProvisioner) -> AppState {
        AppState::new(
            ServerConfig::default(),
            Arc::new(MockChatBackend::default()),
            Arc::new(provisioner),
        )
    }

    fn client(s: &str) -> ClientToken {
        ClientToken::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_prefers_requested() {
        let state = state(MockProvisioner::new());
        let c = client("c1");
        assert_eq!(state.resolve_session(&c, Some("s9")).await.unwrap(), "s9");
        assert_eq!(state.contexts.active_session(&c).as_deref(), Some("s9"));
        // blank request falls through to the active session
        assert_eq!(state.resolve_session(&c, Some("  ")).await.unwrap(), "s9");
    }

    #[tokio::test]
    async fn test_resolve_uses_latest_or_creates() {
        let state = state(MockProvisioner::new().with_session("old", "Old", Vec::new()));
        let c = client("c1");
        assert_eq!(state.resolve_session(&c, None).await.unwrap(), "old");

        let state = self::state(MockProvisioner::new());
        let id = state.resolve_session(&c, None).await.unwrap();
        assert_eq!(id, "mock-session-1");
        assert_eq!(state.contexts.active_session(&c).as_deref(), Some("mock-session-1"));
    }

    #[tokio::test]
    async fn test_resolve_failure() {
        let state = state(MockProvisioner::failing());
        let err = state.resolve_session(&client("c1"), None).await.unwrap_err();
        assert_eq!(err.message(), "Could not create session");
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_require_store() {
        let state = state(MockProvisioner::new());
        assert_eq!(
            state.require_store().unwrap_err().status(),
            axum::http::StatusCode::SERVICE_UNAVAILABLE
        );
        let state = state.with_store(Arc::new(LiftlogStore::open_in_memory().unwrap()));
        assert!(state.require_store().is_ok());
    }
}
