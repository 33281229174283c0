//! Error types for the record model.

use thiserror::Error;

/// Result type for field and record operations.
pub type FieldResult<T> = Result<T, FieldError>;

/// Errors raised by the field container and record model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// The key is empty or reserved for protocol use.
    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    /// A stored value did not match the requested type or wire shape.
    #[error("field format error: {0}")]
    Format(String),

    /// A value failed construction-time validation.
    #[error("validation error: {0}")]
    Validation(String),
}

impl FieldError {
    /// Creates a format error for a type mismatch on `key`.
    pub fn type_mismatch(key: &str, expected: &str) -> Self {
        Self::Format(format!("value for {key:?} is not a {expected}"))
    }

    /// Creates a format error for a missing key.
    pub fn missing(key: &str) -> Self {
        Self::Format(format!("no value for key {key:?}"))
    }
}
