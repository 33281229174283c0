//! End-to-end exercises of the sync engine against the mock transport:
//! the full lifecycle of a record, conflict recovery, paginated
//! queries, and membership reconciliation.

use std::sync::Arc;

use cumulus_query::{Clause, Query};
use cumulus_record::Record;
use cumulus_sync::{
    BucketEndpoint, MemberChanges, MergeMode, MockTransport, SyncClient, SyncError, WritePolicy,
};

fn fixture() -> (SyncClient, Arc<MockTransport>, BucketEndpoint) {
    let mock = Arc::new(MockTransport::new());
    let client = SyncClient::new(mock.clone());
    let endpoint = BucketEndpoint::new(
        "https://cloud.test/apps/a1/buckets/scores/objects",
        "https://cloud.test/apps/a1/buckets/scores/query",
    );
    (client, mock, endpoint)
}

#[test]
fn record_lifecycle_create_update_refresh_delete() {
    let (client, mock, endpoint) = fixture();

    // create
    mock.push_response(
        201,
        r#"{"objectID": "o1", "createdAt": 100, "updatedAt": 100}"#,
        Some("v1"),
    );
    let mut record = Record::new();
    record.set("player", "ada").unwrap();
    record.set("score", 1200).unwrap();
    client
        .save(&endpoint, &mut record, MergeMode::Full, WritePolicy::Force)
        .unwrap();
    assert_eq!(record.id(), Some("o1"));
    assert!(record.is_saved());
    assert!(!record.has_pending_changes());

    // partial update of one field under optimistic concurrency
    mock.push_response(200, r#"{"_created": 100, "_modified": 200}"#, Some("v2"));
    record.set("score", 1300).unwrap();
    client
        .save(&endpoint, &mut record, MergeMode::Partial, WritePolicy::Safe)
        .unwrap();
    assert_eq!(record.version(), Some("v2"));
    assert_eq!(record.modified_at(), 200);

    let patch = mock.requests().pop().unwrap();
    assert_eq!(patch.header("If-Match"), Some("v1"));
    assert_eq!(patch.header("X-HTTP-Method-Override"), Some("PATCH"));
    let body = patch.body.as_ref().unwrap().as_object().unwrap();
    assert_eq!(body.len(), 1, "delta body must carry only the change");

    // refresh picks up a server-side edit
    mock.push_response(
        200,
        r#"{"_id": "o1", "_created": 100, "_modified": 300, "player": "ada", "score": 1500}"#,
        Some("v3"),
    );
    client.refresh(&endpoint, &mut record).unwrap();
    assert_eq!(record.get::<i64>("score").unwrap(), 1500);

    // delete ends the record's life
    mock.push_response(204, "", None);
    client.delete(&endpoint, &mut record).unwrap();
    assert!(record.is_deleted());
    let err = client
        .save(&endpoint, &mut record, MergeMode::Full, WritePolicy::Force)
        .unwrap_err();
    assert!(matches!(err, SyncError::InvalidState(_)));
}

#[test]
fn conflict_then_refresh_then_retry() {
    let (client, mock, endpoint) = fixture();

    let mut record = Record::from_payload(
        serde_json::json!({"_id": "o1", "_created": 1, "_version": "stale"})
            .as_object()
            .unwrap()
            .clone(),
    )
    .unwrap();
    record.set("score", 10).unwrap();

    // the server moved on; the conditional write loses
    mock.push_response(409, r#"{"errorCode": "OBJECT_VERSION_IS_STALE"}"#, None);
    let err = client
        .save(&endpoint, &mut record, MergeMode::Partial, WritePolicy::Safe)
        .unwrap_err();
    assert!(err.is_conflict());
    assert!(record.has_pending_changes(), "delta survives the conflict");

    // refresh to the current version, then the retry goes through
    mock.push_response(
        200,
        r#"{"_id": "o1", "_created": 1, "_modified": 5, "score": 7}"#,
        Some("fresh"),
    );
    client.refresh(&endpoint, &mut record).unwrap();
    assert!(!record.has_pending_changes(), "refresh discards the delta");

    record.set("score", 10).unwrap();
    mock.push_response(200, r#"{"_created": 1, "_modified": 6}"#, Some("newer"));
    client
        .save(&endpoint, &mut record, MergeMode::Partial, WritePolicy::Safe)
        .unwrap();
    assert_eq!(
        mock.requests().pop().unwrap().header("If-Match"),
        Some("fresh")
    );
    assert_eq!(record.version(), Some("newer"));
}

#[test]
fn paginated_query_walks_every_page() {
    let (client, mock, endpoint) = fixture();
    mock.push_response(
        200,
        r#"{"results": [{"_id": "a", "_created": 1}], "nextPaginationKey": "p2"}"#,
        None,
    );
    mock.push_response(
        200,
        r#"{"results": [{"_id": "b", "_created": 2}], "nextPaginationKey": "p3"}"#,
        None,
    );
    mock.push_response(200, r#"{"results": [{"_id": "c", "_created": 3}]}"#, None);

    let mut query = Query::from_clause(Clause::greater_than("score", 100).unwrap());
    query.set_limit(1);

    let mut ids = Vec::new();
    let mut page = Some(client.query(&endpoint, &query).unwrap());
    while let Some(current) = page {
        ids.extend(
            current
                .records()
                .iter()
                .filter_map(|record| record.id().map(str::to_owned)),
        );
        page = client.next_page(&endpoint, &current).unwrap();
    }
    assert_eq!(ids, ["a", "b", "c"]);

    // every request repeated the clause; the later ones added tokens
    let sent = mock.requests();
    assert_eq!(sent.len(), 3);
    assert!(sent[0].body.as_ref().unwrap().get("paginationKey").is_none());
    assert_eq!(sent[1].body.as_ref().unwrap()["paginationKey"], "p2");
    assert_eq!(sent[2].body.as_ref().unwrap()["paginationKey"], "p3");
}

#[test]
fn count_shares_the_query_compiler() {
    let (client, mock, endpoint) = fixture();
    mock.push_response(200, r#"{"aggregations": {"count_field": 7}}"#, None);

    let query = Query::from_clause(
        Clause::and(vec![
            Clause::equals("kind", "blue").unwrap(),
            Clause::has_field("score", cumulus_query::FieldType::Integer).unwrap(),
        ])
        .unwrap(),
    );
    assert_eq!(client.count(&endpoint, &query).unwrap(), 7);

    let sent = mock.last_request().unwrap();
    let bucket_query = &sent.body.as_ref().unwrap()["bucketQuery"];
    assert_eq!(bucket_query["clause"]["type"], "and");
    assert_eq!(bucket_query["aggregations"][0]["type"], "COUNT");
}

#[test]
fn membership_round_trip_with_partial_failure_retry() {
    let (client, mock, _) = fixture();

    let mut changes = MemberChanges::new();
    changes.add("https://cloud.test/groups/g/members/u1");
    changes.add("https://cloud.test/groups/g/members/u2");
    changes.remove("https://cloud.test/groups/g/members/u3");

    mock.push_response(204, "", None);
    mock.push_error("timed out");

    let err = client.sync_members(&changes).unwrap_err();
    let remaining = err.into_remaining();
    assert_eq!(remaining.additions(), ["https://cloud.test/groups/g/members/u2"]);
    assert_eq!(remaining.removals(), ["https://cloud.test/groups/g/members/u3"]);

    // retrying exactly the remainder completes the batch
    mock.push_response(204, "", None);
    mock.push_response(204, "", None);
    client.sync_members(&remaining).unwrap();
    assert_eq!(mock.requests().len(), 4);
}
