//! Configuration for the client context store.

use std::time::Duration;

/// Default maximum number of clients to remember.
pub const DEFAULT_MAX_CLIENTS: usize = 10_000;

/// Default idle time after which a client is forgotten.
pub const DEFAULT_TTL: Option<Duration> = Some(Duration::from_secs(7 * 24 * 60 * 60));

/// Configuration for [`ClientContextStore`](crate::ClientContextStore).
#[derive(Debug, Clone)]
pub struct ContextStoreConfig {
    /// Maximum number of clients before LRU eviction.
    pub max_clients: usize,

    /// Clients idle for longer than this are dropped.
    pub ttl: Option<Duration>,

    /// Interval for the background cleanup task.
    pub cleanup_interval: Duration,
}

impl Default for ContextStoreConfig {
    fn default() -> Self {
        Self {
            max_clients: DEFAULT_MAX_CLIENTS,
            ttl: DEFAULT_TTL,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl ContextStoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_clients(mut self, max: usize) -> Self {
        self.max_clients = max;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Disable TTL (clients are only dropped by LRU eviction).
    pub fn without_ttl(mut self) -> Self {
        self.ttl = None;
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}
