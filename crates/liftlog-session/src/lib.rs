//! Per-client context store.
//!
//! Each browser (identified by an opaque cookie token) gets its own
//! [`ClientContext`]: the active chat session, the user profile, and the
//! coaching settings. Contexts live in memory only, with:
//! - LRU eviction to bound memory use
//! - Optional TTL so abandoned clients are forgotten
//!
//! # Example
//!
//! ```rust,ignore
//! use liftlog_session::{ClientContextStore, ContextStoreConfig, ClientToken};
//!
//! let store = ClientContextStore::new(ContextStoreConfig::default());
//! let token = ClientToken::generate();
//! store.set_active_session(&token, "session-1");
//! ```

mod config;
mod context;
mod error;
mod store;
mod ttl;

pub use config::ContextStoreConfig;
pub use context::{ClientContext, ClientToken};
pub use error::{Result, SessionError};
pub use store::{ClientContextStore, ContextStoreStats};
pub use ttl::TtlTracker;
