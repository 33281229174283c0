//! Error types for clause construction.

use thiserror::Error;

/// Result type for clause construction.
pub type ClauseResult<T> = Result<T, ClauseError>;

/// Construction-time validation failures for clauses and queries.
///
/// These are caller misuse; no request is ever sent for them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClauseError {
    /// A leaf predicate was given an empty field name.
    #[error("empty field name is not acceptable")]
    EmptyField,

    /// A combinator was given no children.
    #[error("and/or requires at least one clause")]
    EmptyClauses,

    /// A membership clause was given no values.
    #[error("membership clause requires at least one value")]
    EmptyValues,

    /// A membership clause exceeded the server-side element cap.
    #[error("membership clause holds {0} values, the maximum is 200")]
    TooManyValues(usize),

    /// A geo-distance radius was outside (0, 20_000_000] meters.
    #[error("radius {0} is out of range (0, 20000000]")]
    InvalidRadius(f64),
}
