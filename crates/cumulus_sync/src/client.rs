//! Record-level entry points over a [`Transport`].

use std::sync::Arc;

use tracing::debug;

use cumulus_record::Record;

use crate::endpoint::BucketEndpoint;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{self, MergeMode, WritePolicy};
use crate::transport::Transport;

/// Drives record operations against a remote store.
///
/// The client holds no per-record state; records carry their own
/// identity, version token and pending delta. Cloning is cheap and
/// clones share the transport.
#[derive(Clone)]
pub struct SyncClient {
    transport: Arc<dyn Transport>,
}

impl SyncClient {
    /// Creates a client over the given transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Saves the record, blocking until the server replies.
    ///
    /// A record without identity is created regardless of `mode`. On
    /// success the record absorbs the server-assigned identity,
    /// timestamps and version token and its pending delta is cleared;
    /// on failure the record is left untouched, delta included.
    pub fn save(
        &self,
        endpoint: &BucketEndpoint,
        record: &mut Record,
        mode: MergeMode,
        policy: WritePolicy,
    ) -> SyncResult<()> {
        let (plan, request) = protocol::plan_save(record, endpoint, mode, policy)?;
        debug!(method = request.method.as_str(), url = %request.url, ?plan, "save");
        let response = self.transport.send(&request)?;
        protocol::interpret_save(record, plan, &response)
    }

    /// Callback variant of [`save`](Self::save). Ownership of the
    /// record passes through the callback so a failed save still hands
    /// back the record with its delta intact.
    pub fn save_async(
        &self,
        endpoint: &BucketEndpoint,
        mut record: Record,
        mode: MergeMode,
        policy: WritePolicy,
        callback: impl FnOnce(Record, Option<SyncError>) + Send + 'static,
    ) {
        let (plan, request) = match protocol::plan_save(&record, endpoint, mode, policy) {
            Ok(planned) => planned,
            Err(err) => return callback(record, Some(err)),
        };
        debug!(method = request.method.as_str(), url = %request.url, ?plan, "save");
        self.transport.send_async(
            request,
            Box::new(move |result| {
                let outcome = result
                    .map_err(SyncError::from)
                    .and_then(|response| protocol::interpret_save(&mut record, plan, &response));
                callback(record, outcome.err());
            }),
        );
    }

    /// Fetches the server copy, replacing the baseline and discarding
    /// any unsynced local changes.
    pub fn refresh(&self, endpoint: &BucketEndpoint, record: &mut Record) -> SyncResult<()> {
        let request = protocol::plan_refresh(record, endpoint)?;
        debug!(url = %request.url, "refresh");
        let response = self.transport.send(&request)?;
        protocol::interpret_refresh(record, &response)
    }

    /// Callback variant of [`refresh`](Self::refresh).
    pub fn refresh_async(
        &self,
        endpoint: &BucketEndpoint,
        mut record: Record,
        callback: impl FnOnce(Record, Option<SyncError>) + Send + 'static,
    ) {
        let request = match protocol::plan_refresh(&record, endpoint) {
            Ok(request) => request,
            Err(err) => return callback(record, Some(err)),
        };
        debug!(url = %request.url, "refresh");
        self.transport.send_async(
            request,
            Box::new(move |result| {
                let outcome = result
                    .map_err(SyncError::from)
                    .and_then(|response| protocol::interpret_refresh(&mut record, &response));
                callback(record, outcome.err());
            }),
        );
    }

    /// Deletes the record on the server. On success the record resets
    /// to its terminal deleted state.
    pub fn delete(&self, endpoint: &BucketEndpoint, record: &mut Record) -> SyncResult<()> {
        let request = protocol::plan_delete(record, endpoint)?;
        debug!(url = %request.url, "delete");
        let response = self.transport.send(&request)?;
        protocol::interpret_delete(record, &response)
    }

    /// Callback variant of [`delete`](Self::delete).
    pub fn delete_async(
        &self,
        endpoint: &BucketEndpoint,
        mut record: Record,
        callback: impl FnOnce(Record, Option<SyncError>) + Send + 'static,
    ) {
        let request = match protocol::plan_delete(&record, endpoint) {
            Ok(request) => request,
            Err(err) => return callback(record, Some(err)),
        };
        debug!(url = %request.url, "delete");
        self.transport.send_async(
            request,
            Box::new(move |result| {
                let outcome = result
                    .map_err(SyncError::from)
                    .and_then(|response| protocol::interpret_delete(&mut record, &response));
                callback(record, outcome.err());
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Method, MockTransport};

    fn fixture() -> (SyncClient, Arc<MockTransport>, BucketEndpoint) {
        let mock = Arc::new(MockTransport::new());
        let client = SyncClient::new(mock.clone());
        let endpoint = BucketEndpoint::new(
            "https://cloud.test/buckets/b/objects",
            "https://cloud.test/buckets/b/query",
        );
        (client, mock, endpoint)
    }

    #[test]
    fn save_roundtrip_creates_record() {
        let (client, mock, endpoint) = fixture();
        mock.push_response(201, r#"{"objectID": "o1", "createdAt": 7}"#, Some("v1"));

        let mut record = Record::new();
        record.set("name", "first").unwrap();
        client
            .save(&endpoint, &mut record, MergeMode::Full, WritePolicy::Force)
            .unwrap();

        assert_eq!(record.id(), Some("o1"));
        assert_eq!(record.version(), Some("v1"));
        let sent = mock.last_request().unwrap();
        assert_eq!(sent.method, Method::Post);
        assert_eq!(sent.url, "https://cloud.test/buckets/b/objects");
    }

    #[test]
    fn failed_save_leaves_delta_pending() {
        let (client, mock, endpoint) = fixture();
        mock.push_error("connection refused");

        let mut record = Record::new();
        record.set("name", "first").unwrap();
        let err = client
            .save(&endpoint, &mut record, MergeMode::Full, WritePolicy::Force)
            .unwrap_err();

        assert!(matches!(err, SyncError::Transport(_)));
        assert!(record.has_pending_changes());
        assert!(!record.is_saved());
    }

    #[test]
    fn save_async_hands_record_back_on_failure() {
        let (client, mock, endpoint) = fixture();
        mock.push_response(409, "", None);

        let mut record = Record::from_payload(
            serde_json::json!({"_id": "o1", "_created": 1, "_version": "v1"})
                .as_object()
                .unwrap()
                .clone(),
        )
        .unwrap();
        record.set("name", "next").unwrap();

        let seen = Arc::new(parking_lot::Mutex::new(None));
        let sink = seen.clone();
        client.save_async(
            &endpoint,
            record,
            MergeMode::Partial,
            WritePolicy::Safe,
            move |record, err| {
                *sink.lock() = Some((record, err));
            },
        );

        let (record, err) = seen.lock().take().unwrap();
        assert!(err.unwrap().is_conflict());
        assert!(record.has_pending_changes());
        assert_eq!(record.version(), Some("v1"));
    }

    #[test]
    fn refresh_replaces_baseline() {
        let (client, mock, endpoint) = fixture();
        mock.push_response(
            200,
            r#"{"_id": "o1", "_created": 3, "_modified": 9, "name": "server"}"#,
            Some("v2"),
        );

        let mut record = Record::with_id("o1").unwrap();
        record.set("name", "local").unwrap();
        client.refresh(&endpoint, &mut record).unwrap();

        assert_eq!(record.get::<String>("name").unwrap(), "server");
        assert_eq!(record.modified_at(), 9);
        assert_eq!(record.version(), Some("v2"));
        assert!(!record.has_pending_changes());
        assert_eq!(mock.last_request().unwrap().method, Method::Get);
    }

    #[test]
    fn delete_sends_delete_and_resets() {
        let (client, mock, endpoint) = fixture();
        mock.push_response(204, "", None);

        let mut record = Record::from_payload(
            serde_json::json!({"_id": "o1", "_created": 3})
                .as_object()
                .unwrap()
                .clone(),
        )
        .unwrap();
        client.delete(&endpoint, &mut record).unwrap();

        assert!(record.is_deleted());
        let sent = mock.last_request().unwrap();
        assert_eq!(sent.method, Method::Delete);
        assert_eq!(sent.url, "https://cloud.test/buckets/b/objects/o1");
    }
}
