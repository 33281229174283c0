//! # Cumulus Query
//!
//! Typed predicate-tree query compiler for the Cumulus client SDK.
//!
//! Callers build a [`Clause`] tree out of typed leaf predicates and
//! combinators, wrap it in a [`Query`] with sort and limit directives,
//! and the sync layer serializes it to the server's JSON query wire
//! format.
//!
//! All validation happens at construction time; compiling a constructed
//! tree to JSON is deterministic, pure and infallible.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clause;
mod error;
mod query;

pub use clause::{Clause, ClauseValue, FieldType};
pub use error::{ClauseError, ClauseResult};
pub use query::{Query, SortOrder};
