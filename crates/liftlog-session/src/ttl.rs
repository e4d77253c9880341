//! Idle tracking for client expiration.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Tracks last access times for TTL-based expiration.
#[derive(Debug)]
pub struct TtlTracker {
    access_times: HashMap<String, Instant>,
    /// None means no expiration.
    ttl: Option<Duration>,
}

impl TtlTracker {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            access_times: HashMap::new(),
            ttl,
        }
    }

    /// Record an access (resets the timer).
    pub fn touch(&mut self, key: &str) {
        self.access_times.insert(key.to_string(), Instant::now());
    }

    /// Whether `key` has been idle for longer than the TTL.
    ///
    /// A key with no access record counts as expired when a TTL is set.
    pub fn is_expired(&self, key: &str) -> bool {
        match self.ttl {
            None => false,
            Some(ttl) => match self.access_times.get(key) {
                None => true,
                Some(last_access) => last_access.elapsed() > ttl,
            },
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.access_times.remove(key);
    }

    /// Remove all expired entries and return their keys.
    pub fn drain_expired(&mut self) -> Vec<String> {
        let Some(ttl) = self.ttl else {
            return Vec::new();
        };
        let now = Instant::now();
        let expired: Vec<String> = self
            .access_times
            .iter()
            .filter(|(_, last_access)| now.duration_since(**last_access) > ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.access_times.remove(key);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.access_times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.access_times.is_empty()
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }
}
