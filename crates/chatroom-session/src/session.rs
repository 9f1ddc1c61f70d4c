//! Session identifiers and their generation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_ID_BYTES;

/// A server-issued, time-limited credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId {
    /// Opaque random identifier (the `sid` cookie value).
    pub id: String,

    /// Instant after which the session is no longer valid.
    pub expires_at: DateTime<Utc>,
}

impl SessionId {
    /// Create a session identifier.
    pub fn new(id: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            expires_at,
        }
    }

    /// Whether the session is expired at `now`. A session expiring exactly
    /// at `now` counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Expiration truncated to whole seconds since the epoch.
    pub fn order_secs(&self) -> i64 {
        self.expires_at.timestamp()
    }
}

/// Generates unpredictable session identifiers.
///
/// Bytes come from the thread-local CSPRNG (`rand::rng()`, OS-seeded) and
/// are encoded as URL-safe base64 without padding so they are safe as
/// cookie values.
#[derive(Debug, Clone, Copy)]
pub struct IdGenerator {
    bytes: usize,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_ID_BYTES)
    }
}

impl IdGenerator {
    /// Create a generator producing ids from `bytes` random bytes (at least 1).
    pub fn new(bytes: usize) -> Self {
        Self {
            bytes: bytes.max(1),
        }
    }

    /// Number of random bytes per id.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Produce a fresh identifier.
    pub fn generate(&self) -> String {
        let mut raw = vec![0u8; self.bytes];
        rand::rng().fill_bytes(&mut raw);
        URL_SAFE_NO_PAD.encode(raw)
    }
}
