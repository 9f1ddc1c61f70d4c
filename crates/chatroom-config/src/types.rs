//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [session]                # session lifetime and sweeping
//! [logging]                # log level and file output
//! ```

use std::path::PathBuf;
use std::time::Duration;

use chatroom_session::SessionConfig;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Smallest accepted session id size; shorter ids are guessable.
pub const MIN_ID_BYTES: usize = 16;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatroomConfig {
    /// Session configuration.
    pub session: Option<SessionSection>,

    /// Logging configuration.
    pub logging: Option<LoggingSection>,
}

impl ChatroomConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: ChatroomConfig) {
        if other.session.is_some() {
            self.session = other.session;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Session section, or its defaults when absent.
    pub fn session(&self) -> SessionSection {
        self.session.clone().unwrap_or_default()
    }

    /// Logging section, or its defaults when absent.
    pub fn logging(&self) -> LoggingSection {
        self.logging.clone().unwrap_or_default()
    }

    /// Validated session configuration for the registry.
    pub fn session_config(&self) -> Result<SessionConfig> {
        self.session().to_session_config()
    }

    /// Config populated with every default, for `config init`.
    pub fn with_defaults() -> Self {
        Self {
            session: Some(SessionSection::default()),
            logging: Some(LoggingSection::default()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Session configuration.
///
/// ```toml
/// [session]
/// ttl_secs = 86400
/// id_bytes = 32
/// sweep_enabled = false
/// sweep_interval_secs = 60
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Lifetime in seconds of sessions issued at login.
    pub ttl_secs: u64,
    /// Random bytes per session id.
    pub id_bytes: usize,
    /// Whether to sweep expired sessions in the background.
    pub sweep_enabled: bool,
    /// Interval in seconds between background sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        let defaults = SessionConfig::default();
        Self {
            ttl_secs: defaults.default_ttl.as_secs(),
            id_bytes: defaults.id_bytes,
            sweep_enabled: defaults.sweep_enabled,
            sweep_interval_secs: defaults.sweep_interval.as_secs(),
        }
    }
}

impl SessionSection {
    /// Check ranges and convert into the registry configuration.
    pub fn to_session_config(&self) -> Result<SessionConfig> {
        if self.ttl_secs == 0 {
            return Err(invalid("session.ttl_secs", "must be greater than zero"));
        }
        if self.id_bytes < MIN_ID_BYTES {
            return Err(invalid(
                "session.id_bytes",
                &format!("must be at least {MIN_ID_BYTES}"),
            ));
        }
        if self.sweep_enabled && self.sweep_interval_secs == 0 {
            return Err(invalid(
                "session.sweep_interval_secs",
                "must be greater than zero when sweeping is enabled",
            ));
        }

        Ok(SessionConfig::new()
            .with_default_ttl(Duration::from_secs(self.ttl_secs))
            .with_id_bytes(self.id_bytes)
            .with_sweep(self.sweep_enabled)
            .with_sweep_interval(Duration::from_secs(self.sweep_interval_secs)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration.
///
/// ```toml
/// [logging]
/// level = "info"
/// json_file = true
/// directory = "/var/log/chatroom"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Console filter level (`error`, `warn`, `info`, `debug`, `trace`).
    pub level: String,
    /// Also write a daily-rotated JSON log file.
    pub json_file: bool,
    /// Directory for the JSON log file. Defaults to `<config dir>/logs`.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_file: false,
            directory: None,
        }
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ChatroomConfig::from_toml("").unwrap();
        assert!(config.session.is_none());

        let session = config.session_config().unwrap();
        assert_eq!(session.default_ttl, Duration::from_secs(86_400));
        assert_eq!(config.logging().level, "info");
    }

    #[test]
    fn test_partial_session_section() {
        let config = ChatroomConfig::from_toml(
            r#"
[session]
ttl_secs = 3600
sweep_enabled = true
"#,
        )
        .unwrap();

        let session = config.session_config().unwrap();
        assert_eq!(session.default_ttl, Duration::from_secs(3600));
        assert_eq!(session.id_bytes, 32);
        assert!(session.sweep_enabled);
        assert_eq!(session.sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_rejects_zero_ttl() {
        let config = ChatroomConfig::from_toml("[session]\nttl_secs = 0\n").unwrap();
        let err = config.session_config().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "session.ttl_secs"));
    }

    #[test]
    fn test_rejects_short_ids() {
        let config = ChatroomConfig::from_toml("[session]\nid_bytes = 4\n").unwrap();
        assert!(config.session_config().is_err());
    }

    #[test]
    fn test_rejects_zero_sweep_interval_when_enabled() {
        let config = ChatroomConfig::from_toml(
            "[session]\nsweep_enabled = true\nsweep_interval_secs = 0\n",
        )
        .unwrap();
        assert!(config.session_config().is_err());

        let disabled = ChatroomConfig::from_toml("[session]\nsweep_interval_secs = 0\n").unwrap();
        assert!(disabled.session_config().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = ChatroomConfig::with_defaults();
        config.logging = Some(LoggingSection {
            level: "debug".to_string(),
            json_file: true,
            directory: Some(PathBuf::from("/tmp/chatroom-logs")),
        });

        let text = config.to_toml().unwrap();
        assert!(text.contains("[session]"));
        assert!(text.contains("ttl_secs = 86400"));

        let parsed = ChatroomConfig::from_toml(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut base = ChatroomConfig::with_defaults();
        let overlay = ChatroomConfig::from_toml("[logging]\nlevel = \"trace\"\n").unwrap();
        base.merge(overlay);

        assert_eq!(base.logging().level, "trace");
        assert_eq!(base.session(), SessionSection::default());
    }
}
