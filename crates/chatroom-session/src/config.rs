//! Configuration for session stores and the registry.

use std::time::Duration;

/// Default session lifetime (the `sid` cookie lifetime): 24 hours.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default number of random bytes in a session id.
pub const DEFAULT_ID_BYTES: usize = 32;

/// Default interval between background sweeps, when enabled.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for session issuance and expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Lifetime of sessions issued without an explicit TTL.
    pub default_ttl: Duration,

    /// Random bytes per session id.
    pub id_bytes: usize,

    /// Whether to run a periodic background sweep of expired sessions.
    /// If false, expired sessions are only evicted on access.
    pub sweep_enabled: bool,

    /// Interval for the background sweep (if enabled).
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            id_bytes: DEFAULT_ID_BYTES,
            sweep_enabled: false,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default session lifetime.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the number of random bytes per session id.
    pub fn with_id_bytes(mut self, bytes: usize) -> Self {
        self.id_bytes = bytes;
        self
    }

    /// Enable or disable the background sweep.
    pub fn with_sweep(mut self, enabled: bool) -> Self {
        self.sweep_enabled = enabled;
        self
    }

    /// Set the background sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.default_ttl, Duration::from_secs(86_400));
        assert_eq!(config.id_bytes, 32);
        assert!(!config.sweep_enabled);
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::new()
            .with_default_ttl(Duration::from_secs(5))
            .with_id_bytes(16)
            .with_sweep(true)
            .with_sweep_interval(Duration::from_millis(250));
        assert_eq!(config.default_ttl, Duration::from_secs(5));
        assert_eq!(config.id_bytes, 16);
        assert!(config.sweep_enabled);
        assert_eq!(config.sweep_interval, Duration::from_millis(250));
    }
}
