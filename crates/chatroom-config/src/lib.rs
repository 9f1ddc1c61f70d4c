//! Configuration system for the chatroom server.
//!
//! Provides TOML-based configuration with:
//! - A `[session]` section for session lifetime, id size and the optional
//!   background sweep
//! - A `[logging]` section for log level and the rolling JSON log file
//! - Config file layering (XDG user config + project-local overrides)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    load_config, load_config_file, load_config_with_options, save_config, xdg_config_dir,
    xdg_config_path, ConfigSource, LoadedConfig,
};
pub use error::{ConfigError, Result};
pub use types::*;
