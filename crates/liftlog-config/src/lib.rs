//! Configuration system for LiftLog.
//!
//! Provides TOML-based configuration with:
//! - One section per subsystem (`[server]`, `[llm]`, `[extraction]`, `[storage]`,
//!   `[workers]`, `[sessions]`)
//! - Config file layering (XDG user config + project-local overrides)
//! - `LIFTLOG_*` environment variables for the chat service credentials

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, default_data_dir, load_config, load_config_file, load_config_with_options,
    xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
