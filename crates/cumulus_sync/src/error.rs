//! Error types for sync operations.

use crate::transport::TransportError;
use cumulus_record::FieldError;
use cumulus_query::ClauseError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network-level failure before any HTTP status was produced.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with a failure status.
    #[error("cloud error: status {status}: {message}")]
    Cloud {
        /// HTTP status code.
        status: u16,
        /// Response body or server message.
        message: String,
    },

    /// A conditional write was rejected because its precondition failed.
    ///
    /// The caller decides whether to refresh-and-retry or abort; the
    /// engine never retries on its own.
    #[error("conflict: the record version precondition failed (status {status})")]
    Conflict {
        /// HTTP status code (409 or 412).
        status: u16,
    },

    /// The server answered, but not in the expected JSON shape.
    #[error("format error: {0}")]
    Format(String),

    /// The operation is not valid in the record's current lifecycle
    /// state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Caller misuse detected by the record model.
    #[error(transparent)]
    Field(#[from] FieldError),

    /// Caller misuse detected by clause construction.
    #[error(transparent)]
    Clause(#[from] ClauseError),
}

impl SyncError {
    /// Creates a format error.
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    /// Creates an invalid-state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Returns true if this error is a version-precondition conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::Conflict { .. })
    }
}
