//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use liftlog_types::DEFAULT_USER_ID;

/// Sessions requested from the provisioning service for a listing.
pub const DEFAULT_SESSION_PAGE_SIZE: usize = 50;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Authentication token. `None` means auth is disabled (localhost mode).
    pub auth_token: Option<String>,

    /// Enable request logging.
    pub request_logging: bool,

    /// Abort a chat stream that produces nothing for this long.
    pub stream_idle_timeout: Option<Duration>,

    /// Directory export files are written to.
    pub stats_dir: PathBuf,

    /// User id applied when a request does not name one.
    pub default_user: String,

    /// Page size for session listings.
    pub session_page_size: usize,

    /// How long shutdown waits for queued background jobs.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 5000)),
            auth_token: None,
            request_logging: true,
            stream_idle_timeout: None,
            stats_dir: PathBuf::from("workout_stats"),
            default_user: DEFAULT_USER_ID.to_string(),
            session_page_size: DEFAULT_SESSION_PAGE_SIZE,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Create a new server config with an optional auth token.
    /// Pass `None` to disable authentication (localhost mode).
    pub fn new(auth_token: Option<String>) -> Self {
        Self {
            auth_token,
            ..Default::default()
        }
    }

    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }

    pub fn with_stream_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }

    pub fn with_stats_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.stats_dir = dir.into();
        self
    }

    pub fn with_default_user(mut self, user_id: impl Into<String>) -> Self {
        self.default_user = user_id.into();
        self
    }

    pub fn with_session_page_size(mut self, size: usize) -> Self {
        self.session_page_size = size.max(1);
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// The request's user id, or the default one when absent or blank.
    pub fn user_or_default(&self, user_id: Option<&str>) -> String {
        user_id
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(&self.default_user)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address.port(), 5000);
        assert!(config.auth_token.is_none());
        assert!(config.request_logging);
        assert!(config.stream_idle_timeout.is_none());
        assert_eq!(config.default_user, "default_user");
        assert_eq!(config.session_page_size, 50);
        assert_eq!(config.shutdown_grace, Duration::from_secs(10));
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::new(Some("secret".to_string()))
            .with_bind_address("0.0.0.0:9000".parse().unwrap())
            .with_request_logging(false)
            .with_stream_idle_timeout(Some(Duration::from_secs(5)))
            .with_default_user("alice")
            .with_session_page_size(0);
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.bind_address.port(), 9000);
        assert!(!config.request_logging);
        assert_eq!(config.stream_idle_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.session_page_size, 1);
        assert_eq!(config.user_or_default(None), "alice");
        assert_eq!(config.user_or_default(Some("  ")), "alice");
        assert_eq!(config.user_or_default(Some("bob")), "bob");
    }
}
