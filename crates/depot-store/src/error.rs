//! Error types for tree store operations

use std::time::Duration;
use thiserror::Error;

/// Tree store, session and lock errors
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Committed state changed underneath a pending mutation
    #[error("concurrent modification detected at '{path}': {reason}")]
    ConcurrencyConflict { path: String, reason: String },

    /// Every pooled session is in use and the pool is configured to fail fast
    #[error("session pool exhausted ({max} sessions in use)")]
    PoolExhausted { max: usize },

    /// No session came back to the pool in time
    #[error("timed out after {waited:?} waiting for a pooled session")]
    BorrowTimeout { waited: Duration },

    /// A path lock stayed held by another session
    #[error("timed out after {waited:?} waiting for lock on '{path}'")]
    LockTimeout { path: String, waited: Duration },

    #[error("'{path}' is not a folder")]
    NotAFolder { path: String },

    #[error("cannot {operation} the repository root '{path}'")]
    RootNotAllowed { path: String, operation: String },

    /// Session returned or closed while still holding changes or resources
    #[error("session {session} leaked resources: {detail}")]
    ResourceLeak { session: u64, detail: String },

    /// Backing store failure
    #[error("store error: {0}")]
    Backend(String),

    #[error(transparent)]
    Core(#[from] depot_core::CoreError),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl StoreError {
    pub fn conflict(path: impl ToString, reason: impl Into<String>) -> Self {
        StoreError::ConcurrencyConflict {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// True for stale-state conflicts that an idempotent caller may retry
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::ConcurrencyConflict { .. })
    }

    /// True for pool and lock timeouts
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            StoreError::BorrowTimeout { .. } | StoreError::LockTimeout { .. }
        )
    }
}
