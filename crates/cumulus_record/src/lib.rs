//! # Cumulus Record
//!
//! Delta-tracking record model for the Cumulus client SDK.
//!
//! This crate provides:
//! - A typed key/value field container with reserved-key filtering
//! - Geo point values with range validation
//! - The dual-state record (baseline snapshot + pending delta) that the
//!   sync layer reconciles against the server
//!
//! ## Key Invariants
//!
//! - Reserved keys are never mutated through the generic accessors
//! - Every key in the delta is also present in the baseline
//! - The delta is empty immediately after a successful save or refresh
//! - A record's identity is immutable once assigned by the server

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod container;
mod error;
mod geo;
mod record;

pub use container::{FieldContainer, FieldValue, FromField, Uri};
pub use error::{FieldError, FieldResult};
pub use geo::GeoPoint;
pub use record::Record;
