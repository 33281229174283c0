//! # Cumulus Sync
//!
//! Sync protocol engine for the Cumulus client SDK.
//!
//! This crate provides:
//! - An HTTP-shaped transport abstraction (trait + mock)
//! - The save/refresh/delete protocol with optimistic-concurrency
//!   control over delta-tracking records
//! - Query execution with paginated result hydration and counting
//! - Sequential group-membership reconciliation
//! - ACL grant/revoke/list over bucket, object and topic actions
//!
//! ## Architecture
//!
//! Every operation is one logical request/response exchange with two
//! calling conventions: a blocking form that returns the result
//! directly, and a non-blocking form that invokes a completion callback
//! exactly once on the transport's I/O thread. Both drive the same
//! "build request, interpret response" core; the engine itself owns no
//! threads and performs no retries.
//!
//! ## Key Invariants
//!
//! - The server is authoritative; `refresh` discards local changes
//! - A conditional write that fails its precondition surfaces as
//!   [`SyncError::Conflict`], never a silent retry
//! - The delta is cleared only on success; a failed save leaves it
//!   intact for the caller to retry

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod acl;
mod client;
mod endpoint;
mod error;
mod membership;
mod protocol;
mod query_exec;
mod transport;

pub use acl::{AclAction, AclEntry, AclSubject, BucketAction, ObjectAction, TopicAction};
pub use client::SyncClient;
pub use endpoint::BucketEndpoint;
pub use error::{SyncError, SyncResult};
pub use membership::{MemberChanges, MemberSyncError};
pub use protocol::{MergeMode, WritePolicy};
pub use query_exec::QueryPage;
pub use transport::{
    Completion, Method, MockTransport, Transport, TransportError, WireRequest, WireResponse,
};
