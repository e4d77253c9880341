//! Client context store with LRU eviction and TTL support.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use liftlog_types::{CoachSettings, UserProfile};

use crate::config::ContextStoreConfig;
use crate::context::{ClientContext, ClientToken};
use crate::ttl::TtlTracker;

struct StoreInner {
    lru: LruCache<String, ClientContext>,
    ttl: TtlTracker,
}

impl StoreInner {
    /// Drop `key` if it has expired. Returns whether it did.
    fn expire(&mut self, key: &str) -> bool {
        if self.lru.contains(key) && self.ttl.is_expired(key) {
            debug!(client = %key, "Client context expired");
            self.lru.pop(key);
            self.ttl.remove(key);
            return true;
        }
        false
    }
}

/// In-memory map from client token to [`ClientContext`].
///
/// Cloning is cheap and clones share state. Clients never see each other's
/// context; an unknown or expired client reads as the default context.
#[derive(Clone)]
pub struct ClientContextStore {
    inner: Arc<Mutex<StoreInner>>,
    config: ContextStoreConfig,
}

impl ClientContextStore {
    pub fn new(config: ContextStoreConfig) -> Self {
        let cap = NonZeroUsize::new(config.max_clients).unwrap_or(NonZeroUsize::MIN);
        let inner = StoreInner {
            lru: LruCache::new(cap),
            ttl: TtlTracker::new(config.ttl),
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
            config,
        }
    }

    pub fn config(&self) -> &ContextStoreConfig {
        &self.config
    }

    /// Snapshot of a client's context. Marks the client as recently used.
    pub fn get(&self, token: &ClientToken) -> ClientContext {
        let mut inner = self.inner.lock();
        let key = token.as_str();
        inner.expire(key);
        let ctx = inner.lru.get(key).cloned();
        if ctx.is_some() {
            inner.ttl.touch(key);
        }
        ctx.unwrap_or_default()
    }

    /// Modify a client's context in place, creating it when absent.
    pub fn update<F, R>(&self, token: &ClientToken, f: F) -> R
    where
        F: FnOnce(&mut ClientContext) -> R,
    {
        let mut inner = self.inner.lock();
        let key = token.as_str();
        inner.expire(key);

        if !inner.lru.contains(key) {
            if let Some((evicted, _)) = inner.lru.push(key.to_string(), ClientContext::default())
                && evicted != key
            {
                debug!(client = %evicted, "Evicting least recently used client");
                inner.ttl.remove(&evicted);
            }
            trace!(client = %key, "Client context created");
        }
        inner.ttl.touch(key);

        // The entry was inserted above if it was missing.
        match inner.lru.get_mut(key) {
            Some(ctx) => f(ctx),
            None => f(&mut ClientContext::default()),
        }
    }

    pub fn active_session(&self, token: &ClientToken) -> Option<String> {
        self.get(token).active_session
    }

    pub fn set_active_session(&self, token: &ClientToken, session_id: impl Into<String>) {
        let session_id = session_id.into();
        debug!(client = %token, session_id = %session_id, "Active session set");
        self.update(token, |ctx| ctx.active_session = Some(session_id));
    }

    /// Clear the active session if it is `session_id`. Returns whether it was.
    pub fn clear_active_session_if(&self, token: &ClientToken, session_id: &str) -> bool {
        self.update(token, |ctx| {
            if ctx.active_session.as_deref() == Some(session_id) {
                ctx.active_session = None;
                true
            } else {
                false
            }
        })
    }

    pub fn profile(&self, token: &ClientToken) -> UserProfile {
        self.get(token).profile
    }

    pub fn set_profile(&self, token: &ClientToken, profile: UserProfile) {
        self.update(token, |ctx| ctx.profile = profile);
    }

    pub fn settings(&self, token: &ClientToken) -> CoachSettings {
        self.get(token).settings
    }

    pub fn set_settings(&self, token: &ClientToken, settings: CoachSettings) {
        self.update(token, |ctx| ctx.settings = settings);
    }

    /// Forget a client entirely.
    pub fn remove(&self, token: &ClientToken) -> Option<ClientContext> {
        let mut inner = self.inner.lock();
        inner.ttl.remove(token.as_str());
        inner.lru.pop(token.as_str())
    }

    /// Drop every expired client. Returns how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let expired = inner.ttl.drain_expired();
        let mut count = 0;
        for key in expired {
            if inner.lru.pop(&key).is_some() {
                count += 1;
            }
        }
        if count > 0 {
            debug!(count, "Cleaned up expired client contexts");
        }
        count
    }

    /// Run [`cleanup_expired`](Self::cleanup_expired) every `cleanup_interval`.
    ///
    /// Does nothing useful without a TTL; the caller aborts the handle on shutdown.
    pub fn spawn_cleanup(&self) -> JoinHandle<()> {
        let store = self.clone();
        let period = self.config.cleanup_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                store.cleanup_expired();
            }
        })
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> ContextStoreStats {
        let inner = self.inner.lock();
        ContextStoreStats {
            size: inner.lru.len(),
            capacity: self.config.max_clients,
            ttl_tracked: inner.ttl.len(),
        }
    }
}

impl std::fmt::Debug for ClientContextStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContextStore")
            .field("config", &self.config)
            .field("size", &self.len())
            .finish()
    }
}

/// Store statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextStoreStats {
    pub size: usize,
    pub capacity: usize,
    pub ttl_tracked: usize,
}
