//! Expiry-ordered session index for the chatroom server.
//!
//! This crate provides the in-memory session layer behind login:
//! - [`Treap`]: a randomized balanced search tree with cached min/max
//!   cursors, used as an expiry-ordered index
//! - [`SessionStore`]: one user's sessions, indexed by id and by expiry,
//!   with lazy eviction of expired entries
//! - [`SessionRegistry`]: the per-user store table handed to request
//!   handlers, with an optional background sweeper
//!
//! # Example
//!
//! ```rust,ignore
//! use chatroom_session::{SessionConfig, SessionRegistry};
//!
//! let registry = SessionRegistry::new(SessionConfig::default());
//! let sid = registry.issue_default_session("alice")?;
//! assert!(registry.validate_session("alice", &sid.id));
//! ```

mod clock;
mod config;
mod error;
mod registry;
mod session;
mod store;
mod sweeper;
pub mod treap;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DEFAULT_ID_BYTES, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL, SessionConfig};
pub use error::{Error, Result};
pub use registry::{RegistryStats, SessionRegistry};
pub use session::{IdGenerator, SessionId};
pub use store::{OrderKey, SessionStore};
pub use sweeper::{SweeperHandle, spawn_sweeper};
pub use treap::{Cursor, Treap};
