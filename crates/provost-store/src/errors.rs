//! Session store errors.

use thiserror::Error;

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by the session store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool failure.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// The referenced session does not exist.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A message payload failed to (de)serialize.
    #[error("message payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted row is malformed (e.g. unknown role).
    #[error("corrupt row: {0}")]
    CorruptRow(String),

    /// Internal invariant violation.
    #[error("internal store error: {0}")]
    Internal(String),
}
