//! Error types for session index operations.

/// Error type for session index operations.
///
/// Missing keys and duplicate inserts are not errors: the treap and the
/// stores report them through `bool`/`Option` return values.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested time-to-live cannot be represented as an expiration instant.
    #[error("Invalid session TTL: {0:?}")]
    InvalidTtl(std::time::Duration),

    /// A structural invariant of the index does not hold.
    #[error("Invariant violated: {0}")]
    InvariantViolated(String),
}

/// Result type for session index operations.
pub type Result<T> = std::result::Result<T, Error>;
