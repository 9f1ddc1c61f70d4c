//! CLI command handlers.

use std::path::Path;

use anyhow::{Context as _, Result};
use chatroom_config::{ConfigSource, LoadedConfig};

pub mod config;
pub mod simulate;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Configuration resolved at startup.
    pub loaded: LoadedConfig,
}

/// Resolve configuration from an explicit file, or by discovery.
pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig> {
    match explicit {
        Some(path) => {
            let config = chatroom_config::load_config_file(path)
                .with_context(|| format!("loading {}", path.display()))?;
            Ok(LoadedConfig {
                config,
                sources: vec![ConfigSource {
                    path: path.to_path_buf(),
                    loaded: true,
                }],
                warnings: Vec::new(),
            })
        }
        None => Ok(chatroom_config::load_config(None)?),
    }
}
