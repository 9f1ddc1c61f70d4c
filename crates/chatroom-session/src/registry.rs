//! Multi-user session registry.
//!
//! The registry is the explicit store object handed to every request
//! handler. It owns one [`SessionStore`] per user:
//! - The user table sits behind a read/write lock and is only written when
//!   a user's first session is issued or when a sweep drops users left
//!   without sessions.
//! - Each store sits behind its own mutex, so requests for one user are
//!   serialized while different users proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::error::Result;
use crate::session::{IdGenerator, SessionId};
use crate::store::SessionStore;

type SharedStore = Arc<Mutex<SessionStore>>;

struct RegistryInner {
    users: RwLock<HashMap<String, SharedStore>>,
    clock: Arc<dyn Clock>,
    ids: IdGenerator,
}

/// Session stores for every user, keyed by user id.
///
/// Cloning is cheap and yields a handle to the same registry.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
    config: SessionConfig,
}

impl SessionRegistry {
    /// Create a registry driven by the wall clock.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a registry driven by a custom clock.
    pub fn with_clock(config: SessionConfig, clock: Arc<dyn Clock>) -> Self {
        let inner = RegistryInner {
            users: RwLock::new(HashMap::new()),
            clock,
            ids: IdGenerator::new(config.id_bytes),
        };

        Self {
            inner: Arc::new(inner),
            config,
        }
    }

    /// Get the registry configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Issue a session for `user_id` valid for `ttl`.
    ///
    /// Called on successful registration or login.
    pub fn issue_session(&self, user_id: &str, ttl: Duration) -> Result<SessionId> {
        let store = self.store_or_create(user_id);
        let session = store.lock().issue(ttl)?;
        debug!(
            user_id = %user_id,
            expires_at = %session.expires_at,
            "Issued session"
        );
        Ok(session)
    }

    /// Issue a session for `user_id` with the configured default TTL.
    pub fn issue_default_session(&self, user_id: &str) -> Result<SessionId> {
        self.issue_session(user_id, self.config.default_ttl)
    }

    /// Whether `session_id` is a live session of `user_id`.
    ///
    /// Called on every authenticated request. Evicts the user's expired
    /// sessions first; unknown users are never valid.
    pub fn validate_session(&self, user_id: &str, session_id: &str) -> bool {
        let Some(store) = self.store(user_id) else {
            trace!(user_id = %user_id, "Validation for unknown user");
            return false;
        };
        let valid = store.lock().validate(session_id);
        trace!(user_id = %user_id, valid, "Validated session");
        valid
    }

    /// Look up a live session of `user_id` without evicting anything.
    pub fn session(&self, user_id: &str, session_id: &str) -> Option<SessionId> {
        self.store(user_id)?.lock().get(session_id)
    }

    /// Extend a live session of `user_id` to expire `ttl` from now.
    pub fn refresh_session(
        &self,
        user_id: &str,
        session_id: &str,
        ttl: Duration,
    ) -> Result<Option<SessionId>> {
        match self.store(user_id) {
            Some(store) => store.lock().refresh(session_id, ttl),
            None => Ok(None),
        }
    }

    /// Revoke one session of `user_id`. Returns `false` if it was not tracked.
    ///
    /// Called on logout.
    pub fn revoke_session(&self, user_id: &str, session_id: &str) -> bool {
        let revoked = self
            .store(user_id)
            .is_some_and(|store| store.lock().revoke(session_id));
        if revoked {
            debug!(user_id = %user_id, "Revoked session");
        }
        revoked
    }

    /// Revoke every session of `user_id`. Returns how many were tracked.
    pub fn revoke_all(&self, user_id: &str) -> usize {
        let count = self
            .store(user_id)
            .map(|store| store.lock().clear())
            .unwrap_or(0);
        if count > 0 {
            debug!(user_id = %user_id, count, "Revoked all sessions");
        }
        count
    }

    /// Number of sessions tracked for `user_id`, including expired ones not
    /// yet evicted.
    pub fn user_session_count(&self, user_id: &str) -> usize {
        self.store(user_id)
            .map(|store| store.lock().len())
            .unwrap_or(0)
    }

    /// Evict expired sessions of every user. Returns the number removed.
    ///
    /// Users left without sessions are then dropped from the table.
    pub fn sweep(&self) -> usize {
        let evicted: usize = self
            .stores()
            .iter()
            .map(|store| store.lock().evict_expired())
            .sum();
        let pruned = self.prune_empty_stores();

        if evicted > 0 || pruned > 0 {
            debug!(count = evicted, pruned, "Swept expired sessions");
        }
        evicted
    }

    /// Get registry statistics.
    pub fn stats(&self) -> RegistryStats {
        let stores = self.stores();
        RegistryStats {
            users: stores.len(),
            sessions: stores.iter().map(|store| store.lock().len()).sum(),
        }
    }

    /// Verify every store's id map and expiry index agree.
    pub fn check_consistency(&self) -> Result<()> {
        for store in self.stores() {
            store.lock().check_consistency()?;
        }
        Ok(())
    }

    fn store(&self, user_id: &str) -> Option<SharedStore> {
        self.inner.users.read().get(user_id).cloned()
    }

    fn store_or_create(&self, user_id: &str) -> SharedStore {
        if let Some(store) = self.store(user_id) {
            return store;
        }

        let mut users = self.inner.users.write();
        users
            .entry(user_id.to_string())
            .or_insert_with(|| {
                trace!(user_id = %user_id, "Creating session store");
                Arc::new(Mutex::new(SessionStore::with_id_generator(
                    Arc::clone(&self.inner.clock),
                    self.inner.ids,
                )))
            })
            .clone()
    }

    /// Remove stores with no sessions. Returns how many were removed.
    ///
    /// A store is only removed while the table holds its sole handle. New
    /// handles are cloned under the table lock, so no request can be holding
    /// one that this drops.
    fn prune_empty_stores(&self) -> usize {
        let mut users = self.inner.users.write();
        let before = users.len();
        users.retain(|_, store| match Arc::get_mut(store) {
            Some(store) => !store.get_mut().is_empty(),
            None => true,
        });
        before - users.len()
    }

    /// Snapshot of every store handle, so per-store work runs without
    /// holding the table lock.
    fn stores(&self) -> Vec<SharedStore> {
        self.inner.users.read().values().cloned().collect()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("config", &self.config)
            .field("users", &self.inner.users.read().len())
            .finish()
    }
}

/// Registry statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Users with a session store.
    pub users: usize,

    /// Sessions tracked across all users, including expired ones not yet evicted.
    pub sessions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    fn registry() -> (SessionRegistry, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 7, 1, 8, 0, 0).unwrap());
        let registry = SessionRegistry::with_clock(SessionConfig::default(), Arc::new(clock.clone()));
        (registry, clock)
    }

    #[test]
    fn test_issue_validate_revoke() {
        let (registry, _clock) = registry();
        let sid = registry
            .issue_session("alice", Duration::from_secs(60))
            .unwrap();

        assert!(registry.validate_session("alice", &sid.id));
        assert!(registry.revoke_session("alice", &sid.id));
        assert!(!registry.validate_session("alice", &sid.id));
        assert!(!registry.revoke_session("alice", &sid.id));
    }

    #[test]
    fn test_sessions_are_scoped_to_user() {
        let (registry, _clock) = registry();
        let sid = registry
            .issue_session("alice", Duration::from_secs(60))
            .unwrap();

        assert!(!registry.validate_session("bob", &sid.id));
        assert!(!registry.revoke_session("bob", &sid.id));
        assert!(registry.validate_session("alice", &sid.id));
    }

    #[test]
    fn test_default_ttl_is_a_day() {
        let (registry, clock) = registry();
        let sid = registry.issue_default_session("alice").unwrap();
        assert_eq!(sid.expires_at, clock.now() + chrono::Duration::hours(24));

        clock.advance(chrono::Duration::hours(23));
        assert!(registry.validate_session("alice", &sid.id));
        clock.advance(chrono::Duration::hours(1));
        assert!(!registry.validate_session("alice", &sid.id));
    }

    #[test]
    fn test_sweep_and_stats() {
        let (registry, clock) = registry();
        registry.issue_session("alice", Duration::from_secs(1)).unwrap();
        registry.issue_session("alice", Duration::from_secs(2)).unwrap();
        registry.issue_session("bob", Duration::from_secs(100)).unwrap();

        assert_eq!(
            registry.stats(),
            RegistryStats {
                users: 2,
                sessions: 3
            }
        );

        clock.advance(chrono::Duration::seconds(3));
        assert_eq!(registry.sweep(), 2);
        assert_eq!(registry.user_session_count("alice"), 0);
        assert_eq!(registry.user_session_count("bob"), 1);
        registry.check_consistency().unwrap();
    }

    #[test]
    fn test_sweep_drops_users_without_sessions() {
        let (registry, clock) = registry();
        let a = registry.issue_session("alice", Duration::from_secs(1)).unwrap();
        registry.issue_session("bob", Duration::from_secs(100)).unwrap();
        let c = registry.issue_session("carol", Duration::from_secs(100)).unwrap();
        assert!(registry.revoke_session("carol", &c.id));

        clock.advance(chrono::Duration::seconds(2));
        assert_eq!(registry.sweep(), 1);
        assert_eq!(
            registry.stats(),
            RegistryStats {
                users: 1,
                sessions: 1
            }
        );
        assert!(!registry.validate_session("alice", &a.id));

        let again = registry.issue_session("alice", Duration::from_secs(10)).unwrap();
        assert!(registry.validate_session("alice", &again.id));
        assert_eq!(registry.stats().users, 2);
        registry.check_consistency().unwrap();
    }

    #[test]
    fn test_sweep_keeps_store_with_outstanding_handle() {
        let (registry, _clock) = registry();
        registry.issue_session("alice", Duration::from_secs(60)).unwrap();
        registry.revoke_all("alice");

        let held = registry.store("alice").unwrap();
        registry.sweep();
        assert_eq!(registry.stats().users, 1);

        drop(held);
        registry.sweep();
        assert_eq!(registry.stats().users, 0);
    }

    #[test]
    fn test_expired_session_lingers_until_accessed() {
        let (registry, clock) = registry();
        registry.issue_session("alice", Duration::from_secs(1)).unwrap();
        clock.advance(chrono::Duration::seconds(5));

        assert_eq!(registry.user_session_count("alice"), 1);
        assert!(!registry.validate_session("alice", "anything"));
        assert_eq!(registry.user_session_count("alice"), 0);
    }

    #[test]
    fn test_revoke_all() {
        let (registry, _clock) = registry();
        let a = registry.issue_default_session("alice").unwrap();
        registry.issue_default_session("alice").unwrap();

        assert_eq!(registry.revoke_all("alice"), 2);
        assert_eq!(registry.revoke_all("nobody"), 0);
        assert!(!registry.validate_session("alice", &a.id));
    }

    #[test]
    fn test_refresh_and_lookup() {
        let (registry, clock) = registry();
        let sid = registry
            .issue_session("alice", Duration::from_secs(10))
            .unwrap();

        let refreshed = registry
            .refresh_session("alice", &sid.id, Duration::from_secs(100))
            .unwrap()
            .unwrap();
        clock.advance(chrono::Duration::seconds(50));

        assert_eq!(registry.session("alice", &sid.id), Some(refreshed));
        assert!(registry
            .refresh_session("bob", &sid.id, Duration::from_secs(1))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_concurrent_issue_across_threads() {
        let (registry, _clock) = registry();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let user = format!("user-{}", t % 2);
                    (0..50)
                        .map(|_| registry.issue_session(&user, Duration::from_secs(60)).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let issued: Vec<SessionId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        assert_eq!(registry.stats().sessions, 400);
        assert_eq!(registry.stats().users, 2);
        registry.check_consistency().unwrap();
        for sid in issued.iter().take(10) {
            let user_ok = registry.validate_session("user-0", &sid.id)
                || registry.validate_session("user-1", &sid.id);
            assert!(user_ok);
        }
    }
}
