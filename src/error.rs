//! Error types for fetch and persistence paths.
//!
//! Errors are classified by recoverability:
//! - Retryable: backend/network failures, timeouts
//! - NonRetryable: malformed payloads, missing local state
//! - Dropped: results discarded on purpose (stale refresh, teardown)
//!
//! Store setters never produce errors; invalid inputs are silent no-ops.

use thiserror::Error;

/// Error type for backend fetches, persistence commits, and local snapshots.
#[derive(Debug, Error)]
pub enum SyncError {
    // Retryable errors
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    // Non-retryable errors
    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Row not found in {table}: {id}")]
    RowNotFound { table: String, id: String },

    #[error("Malformed row: {0}")]
    MalformedRow(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("IO error: {0}")]
    Io(String),

    // Dropped on purpose
    #[error("Refresh superseded by a newer request")]
    Stale,

    #[error("Consumer torn down before completion")]
    Cancelled,
}

impl SyncError {
    /// Returns true if a retry of the same operation could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Backend(_) | SyncError::Timeout(_))
    }

    /// Returns true if the result was discarded deliberately rather than
    /// failed. Consumers should not surface these to the user.
    pub fn is_dropped(&self) -> bool {
        matches!(self, SyncError::Stale | SyncError::Cancelled)
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::MalformedRow(err.to_string())
    }
}
