//! Per-user session store: a treap ordered by expiry plus a direct id map.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::session::{IdGenerator, SessionId};
use crate::treap::Treap;

/// Position of a session in the expiry index.
///
/// Sessions sort by expiration second first, then by the sub-second part,
/// so the index order matches the exact expiration order. The issue
/// sequence number breaks ties so two sessions expiring at the same instant
/// are both kept by the set-semantics treap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderKey {
    /// Expiration, truncated to seconds since the epoch.
    pub expires_secs: i64,
    /// Nanoseconds past `expires_secs`.
    pub subsec_nanos: u32,
    /// Per-store issue sequence number.
    pub seq: u64,
}

/// Direct-map record for a live session.
#[derive(Debug, Clone, Copy)]
struct Tracked {
    expires_at: DateTime<Utc>,
    key: OrderKey,
}

/// Live sessions of one user, indexed by id and by expiry.
///
/// The id map and the expiry treap always hold the same set of sessions:
/// every mutation updates both. Expired sessions are removed lazily, on
/// [`validate`](Self::validate) or an explicit
/// [`evict_expired`](Self::evict_expired).
pub struct SessionStore {
    by_time: Treap<OrderKey, SessionId>,
    by_id: HashMap<String, Tracked>,
    next_seq: u64,
    ids: IdGenerator,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    /// Create an empty store with the default id generator.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_id_generator(clock, IdGenerator::default())
    }

    /// Create an empty store with a custom id generator.
    pub fn with_id_generator(clock: Arc<dyn Clock>, ids: IdGenerator) -> Self {
        Self {
            by_time: Treap::new(),
            by_id: HashMap::new(),
            next_seq: 0,
            ids,
            clock,
        }
    }

    /// Number of tracked sessions, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the store tracks no sessions.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Read-only view of the expiry index.
    pub fn index(&self) -> &Treap<OrderKey, SessionId> {
        &self.by_time
    }

    /// Tracked sessions, soonest expiry first.
    pub fn sessions(&self) -> impl Iterator<Item = &SessionId> + '_ {
        self.by_time.iter().map(|(_, session)| session)
    }

    /// Expiration of the session that expires first.
    pub fn next_expiry(&self) -> Option<DateTime<Utc>> {
        self.by_time.begin().map(|c| c.value().expires_at)
    }

    /// Issue a new session valid for `ttl` from now.
    pub fn issue(&mut self, ttl: Duration) -> Result<SessionId> {
        let expires_at = self.expiry_after(ttl)?;

        let mut id = self.ids.generate();
        while self.by_id.contains_key(&id) {
            id = self.ids.generate();
        }

        let session = SessionId::new(id, expires_at);
        self.track(session.clone());

        trace!(
            expires_at = %session.expires_at,
            live = self.by_id.len(),
            "Session issued"
        );
        Ok(session)
    }

    /// Whether `id` names a live session.
    ///
    /// Evicts expired sessions first.
    pub fn validate(&mut self, id: &str) -> bool {
        self.evict_expired();
        let now = self.clock.now();
        matches!(self.by_id.get(id), Some(tracked) if tracked.expires_at > now)
    }

    /// Look up a live session without evicting anything.
    pub fn get(&self, id: &str) -> Option<SessionId> {
        let now = self.clock.now();
        let tracked = self.by_id.get(id)?;
        if tracked.expires_at <= now {
            return None;
        }
        self.by_time.get(&tracked.key).cloned()
    }

    /// Remove a session. Returns `false` if it was not tracked.
    pub fn revoke(&mut self, id: &str) -> bool {
        match self.by_id.remove(id) {
            Some(tracked) => {
                self.by_time.erase(&tracked.key);
                trace!(live = self.by_id.len(), "Session revoked");
                true
            }
            None => false,
        }
    }

    /// Remove every session. Returns how many were tracked.
    pub fn clear(&mut self) -> usize {
        let count = self.by_id.len();
        self.by_id.clear();
        self.by_time.clear();
        count
    }

    /// Extend a live session to expire `ttl` from now.
    ///
    /// The entry is erased and reinserted so its position in the expiry
    /// index matches the new expiration. Returns `None` if the session is
    /// absent or already expired.
    pub fn refresh(&mut self, id: &str, ttl: Duration) -> Result<Option<SessionId>> {
        let expires_at = self.expiry_after(ttl)?;
        let now = self.clock.now();

        let Some(tracked) = self.by_id.get(id).copied() else {
            return Ok(None);
        };
        if tracked.expires_at <= now {
            return Ok(None);
        }

        self.by_id.remove(id);
        self.by_time.erase(&tracked.key);

        let session = SessionId::new(id, expires_at);
        self.track(session.clone());
        Ok(Some(session))
    }

    /// Remove every session whose expiration is at or before now, soonest
    /// first. Returns the number removed.
    pub fn evict_expired(&mut self) -> usize {
        let now = self.clock.now();
        let mut evicted = 0;

        while !self.by_id.is_empty() {
            let Some(first) = self.by_time.begin() else {
                break;
            };
            if !first.value().is_expired_at(now) {
                break;
            }
            let key = *first.key();
            if let Some(session) = self.by_time.erase(&key) {
                self.by_id.remove(&session.id);
            }
            evicted += 1;
        }

        if evicted > 0 {
            debug!(
                count = evicted,
                live = self.by_id.len(),
                "Evicted expired sessions"
            );
        }
        evicted
    }

    /// Verify that the id map and the expiry index agree and that the
    /// index is structurally sound.
    pub fn check_consistency(&self) -> Result<()> {
        self.by_time.check_invariants()?;

        if self.by_time.len() != self.by_id.len() {
            return Err(Error::InvariantViolated(format!(
                "expiry index holds {} sessions but id map holds {}",
                self.by_time.len(),
                self.by_id.len()
            )));
        }

        for (key, session) in &self.by_time {
            match self.by_id.get(&session.id) {
                Some(tracked) if tracked.key == *key && tracked.expires_at == session.expires_at => {}
                _ => {
                    return Err(Error::InvariantViolated(format!(
                        "session at {:?} missing from id map or out of sync",
                        key
                    )));
                }
            }
        }
        Ok(())
    }

    fn expiry_after(&self, ttl: Duration) -> Result<DateTime<Utc>> {
        let delta = chrono::Duration::from_std(ttl).map_err(|_| Error::InvalidTtl(ttl))?;
        self.clock
            .now()
            .checked_add_signed(delta)
            .ok_or(Error::InvalidTtl(ttl))
    }

    fn track(&mut self, session: SessionId) {
        let key = OrderKey {
            expires_secs: session.order_secs(),
            subsec_nanos: session.expires_at.timestamp_subsec_nanos(),
            seq: self.next_seq,
        };
        self.next_seq += 1;

        self.by_id.insert(
            session.id.clone(),
            Tracked {
                expires_at: session.expires_at,
                key,
            },
        );
        self.by_time.insert(key, session);
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.by_id.len())
            .field("next_expiry", &self.next_expiry())
            .finish()
    }
}
