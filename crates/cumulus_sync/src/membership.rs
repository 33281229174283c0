//! Sequential group-membership reconciliation.
//!
//! A membership edit is a batch of member URLs to add and to remove.
//! The server offers no batch endpoint, so the engine applies the edits
//! one at a time, additions first in submission order, then removals in
//! submission order. The first failure aborts the run; the error
//! carries every edit that was not yet applied so the caller can retry
//! exactly the remainder.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use crate::client::SyncClient;
use crate::error::SyncError;
use crate::protocol;
use crate::transport::{Method, Transport, WireRequest};

/// A pending batch of membership edits, held as member URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberChanges {
    additions: Vec<String>,
    removals: Vec<String>,
}

impl MemberChanges {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a member URL for addition.
    pub fn add(&mut self, member_url: impl Into<String>) {
        self.additions.push(member_url.into());
    }

    /// Queues a member URL for removal.
    pub fn remove(&mut self, member_url: impl Into<String>) {
        self.removals.push(member_url.into());
    }

    /// Member URLs queued for addition, in application order.
    pub fn additions(&self) -> &[String] {
        &self.additions
    }

    /// Member URLs queued for removal, in application order.
    pub fn removals(&self) -> &[String] {
        &self.removals
    }

    /// Whether the batch holds no edits.
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}

/// A membership run that stopped partway.
///
/// Edits before the failure point were applied and stay applied; the
/// pending lists hold the failing edit and everything after it, in the
/// order a retry should submit them.
#[derive(Debug, thiserror::Error)]
#[error("membership sync aborted: {source}")]
pub struct MemberSyncError {
    /// The error that stopped the run.
    #[source]
    pub source: SyncError,
    /// Additions not yet applied, failing edit first.
    pub pending_additions: Vec<String>,
    /// Removals not yet applied, failing edit first.
    pub pending_removals: Vec<String>,
}

impl MemberSyncError {
    /// Rebuilds a batch from the un-applied remainder, for retrying.
    pub fn into_remaining(self) -> MemberChanges {
        MemberChanges {
            additions: self.pending_additions,
            removals: self.pending_removals,
        }
    }
}

fn add_request(member_url: &str) -> WireRequest {
    WireRequest::new(Method::Put, member_url)
}

fn remove_request(member_url: &str) -> WireRequest {
    WireRequest::new(Method::Delete, member_url)
}

impl SyncClient {
    /// Applies a batch of membership edits, blocking until every edit
    /// is applied or one fails.
    pub fn sync_members(&self, changes: &MemberChanges) -> Result<(), MemberSyncError> {
        for (index, member_url) in changes.additions.iter().enumerate() {
            debug!(%member_url, "membership add");
            if let Err(source) = self.apply(&add_request(member_url)) {
                return Err(MemberSyncError {
                    source,
                    pending_additions: changes.additions[index..].to_vec(),
                    pending_removals: changes.removals.clone(),
                });
            }
        }
        for (index, member_url) in changes.removals.iter().enumerate() {
            debug!(%member_url, "membership remove");
            if let Err(source) = self.apply(&remove_request(member_url)) {
                return Err(MemberSyncError {
                    source,
                    pending_additions: Vec::new(),
                    pending_removals: changes.removals[index..].to_vec(),
                });
            }
        }
        Ok(())
    }

    /// Callback variant of [`sync_members`](Self::sync_members). Edits
    /// are still strictly sequential; each request is issued only after
    /// the previous one completed.
    pub fn sync_members_async(
        &self,
        changes: MemberChanges,
        callback: impl FnOnce(Result<(), MemberSyncError>) + Send + 'static,
    ) {
        drive_next(
            self.transport().clone(),
            changes.additions.into(),
            changes.removals.into(),
            Box::new(callback),
        );
    }

    fn apply(&self, request: &WireRequest) -> Result<(), SyncError> {
        let response = self.transport().send(request)?;
        protocol::check_status(&response)
    }
}

type MemberCompletion = Box<dyn FnOnce(Result<(), MemberSyncError>) + Send + 'static>;

/// One step of the callback chain: issues the next queued edit and
/// re-enters itself from the completion until both queues drain.
fn drive_next(
    transport: Arc<dyn Transport>,
    mut additions: VecDeque<String>,
    mut removals: VecDeque<String>,
    callback: MemberCompletion,
) {
    let (member_url, request, adding) = if let Some(member_url) = additions.pop_front() {
        let request = add_request(&member_url);
        (member_url, request, true)
    } else if let Some(member_url) = removals.pop_front() {
        let request = remove_request(&member_url);
        (member_url, request, false)
    } else {
        return callback(Ok(()));
    };

    debug!(%member_url, adding, "membership edit");
    let chain = transport.clone();
    transport.send_async(
        request,
        Box::new(move |result| {
            let outcome = result
                .map_err(SyncError::from)
                .and_then(|response| protocol::check_status(&response));
            match outcome {
                Ok(()) => drive_next(chain, additions, removals, callback),
                Err(source) => {
                    let mut pending_additions = Vec::with_capacity(additions.len() + 1);
                    let mut pending_removals: Vec<String> = removals.into();
                    if adding {
                        pending_additions.push(member_url);
                        pending_additions.extend(additions);
                    } else {
                        pending_removals.insert(0, member_url);
                    }
                    callback(Err(MemberSyncError {
                        source,
                        pending_additions,
                        pending_removals,
                    }));
                }
            }
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use parking_lot::Mutex;

    fn fixture() -> (SyncClient, Arc<MockTransport>) {
        let mock = Arc::new(MockTransport::new());
        (SyncClient::new(mock.clone()), mock)
    }

    fn batch() -> MemberChanges {
        let mut changes = MemberChanges::new();
        changes.add("https://cloud.test/groups/g/members/u1");
        changes.add("https://cloud.test/groups/g/members/u2");
        changes.remove("https://cloud.test/groups/g/members/u3");
        changes
    }

    #[test]
    fn applies_additions_then_removals_in_order() {
        let (client, mock) = fixture();
        for _ in 0..3 {
            mock.push_response(204, "", None);
        }

        client.sync_members(&batch()).unwrap();

        let sent = mock.requests();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].method, Method::Put);
        assert!(sent[0].url.ends_with("/u1"));
        assert_eq!(sent[1].method, Method::Put);
        assert!(sent[1].url.ends_with("/u2"));
        assert_eq!(sent[2].method, Method::Delete);
        assert!(sent[2].url.ends_with("/u3"));
    }

    #[test]
    fn failed_addition_reports_it_and_everything_after() {
        let (client, mock) = fixture();
        mock.push_response(204, "", None);
        mock.push_error("connection reset");

        let err = client.sync_members(&batch()).unwrap_err();
        assert_eq!(err.pending_additions.len(), 1);
        assert!(err.pending_additions[0].ends_with("/u2"));
        assert_eq!(err.pending_removals.len(), 1);

        // no further requests were attempted
        assert_eq!(mock.requests().len(), 2);
    }

    #[test]
    fn failed_removal_reports_only_remaining_removals() {
        let (client, mock) = fixture();
        mock.push_response(204, "", None);
        mock.push_response(204, "", None);
        mock.push_response(403, "forbidden", None);

        let err = client.sync_members(&batch()).unwrap_err();
        assert!(err.pending_additions.is_empty());
        assert_eq!(err.pending_removals.len(), 1);
        assert!(err.pending_removals[0].ends_with("/u3"));
        assert!(matches!(err.source, SyncError::Cloud { status: 403, .. }));
    }

    #[test]
    fn async_chain_matches_blocking_semantics() {
        let (client, mock) = fixture();
        mock.push_response(204, "", None);
        mock.push_error("connection reset");

        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        client.sync_members_async(batch(), move |result| {
            *sink.lock() = Some(result);
        });

        let err = seen.lock().take().unwrap().unwrap_err();
        assert!(err.pending_additions[0].ends_with("/u2"));
        assert_eq!(err.pending_removals.len(), 1);

        let remaining = err.into_remaining();
        assert_eq!(remaining.additions().len(), 1);
        assert_eq!(remaining.removals().len(), 1);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let (client, mock) = fixture();
        client.sync_members(&MemberChanges::new()).unwrap();
        assert!(mock.requests().is_empty());

        let seen = Arc::new(Mutex::new(false));
        let sink = seen.clone();
        client.sync_members_async(MemberChanges::new(), move |result| {
            assert!(result.is_ok());
            *sink.lock() = true;
        });
        assert!(*seen.lock());
        assert!(mock.requests().is_empty());
    }
}
