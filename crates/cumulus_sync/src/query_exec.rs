//! Query execution: sends a compiled query and hydrates the result
//! page into records.

use serde_json::Value;

use cumulus_query::Query;
use cumulus_record::Record;

use tracing::debug;

use crate::client::SyncClient;
use crate::endpoint::BucketEndpoint;
use crate::error::{SyncError, SyncResult};
use crate::protocol;
use crate::transport::{Method, WireRequest, WireResponse};

/// One page of query results.
///
/// When the server truncated the result set, [`next_query`]
/// (QueryPage::next_query) holds a copy of the original query primed
/// with the continuation token; run it through
/// [`SyncClient::next_page`] to fetch the following page.
#[derive(Debug)]
pub struct QueryPage {
    records: Vec<Record>,
    next_query: Option<Query>,
}

impl QueryPage {
    /// The hydrated records of this page.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Consumes the page, yielding its records.
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Whether the server reported more results past this page.
    pub fn has_next(&self) -> bool {
        self.next_query.is_some()
    }

    /// The continuation query, if this page was truncated.
    pub fn next_query(&self) -> Option<&Query> {
        self.next_query.as_ref()
    }
}

impl SyncClient {
    /// Runs a query, blocking until the server replies with a page.
    pub fn query(&self, endpoint: &BucketEndpoint, query: &Query) -> SyncResult<QueryPage> {
        let request = plan_query(endpoint, query.to_json());
        debug!(url = %request.url, "query");
        let response = self.transport().send(&request)?;
        interpret_query(query, &response)
    }

    /// Callback variant of [`query`](Self::query).
    pub fn query_async(
        &self,
        endpoint: &BucketEndpoint,
        query: Query,
        callback: impl FnOnce(SyncResult<QueryPage>) + Send + 'static,
    ) {
        let request = plan_query(endpoint, query.to_json());
        debug!(url = %request.url, "query");
        self.transport().send_async(
            request,
            Box::new(move |result| {
                callback(
                    result
                        .map_err(SyncError::from)
                        .and_then(|response| interpret_query(&query, &response)),
                );
            }),
        );
    }

    /// Fetches the page after `page`, or `None` when the result set is
    /// exhausted.
    pub fn next_page(
        &self,
        endpoint: &BucketEndpoint,
        page: &QueryPage,
    ) -> SyncResult<Option<QueryPage>> {
        match page.next_query() {
            Some(next) => self.query(endpoint, next).map(Some),
            None => Ok(None),
        }
    }

    /// Counts the records matching `query` server-side.
    pub fn count(&self, endpoint: &BucketEndpoint, query: &Query) -> SyncResult<u64> {
        let request = plan_query(endpoint, query.to_count_json());
        debug!(url = %request.url, "count");
        let response = self.transport().send(&request)?;
        interpret_count(&response)
    }

    /// Callback variant of [`count`](Self::count).
    pub fn count_async(
        &self,
        endpoint: &BucketEndpoint,
        query: &Query,
        callback: impl FnOnce(SyncResult<u64>) + Send + 'static,
    ) {
        let request = plan_query(endpoint, query.to_count_json());
        debug!(url = %request.url, "count");
        self.transport().send_async(
            request,
            Box::new(move |result| {
                callback(
                    result
                        .map_err(SyncError::from)
                        .and_then(|response| interpret_count(&response)),
                );
            }),
        );
    }
}

fn plan_query(endpoint: &BucketEndpoint, body: Value) -> WireRequest {
    WireRequest::new(Method::Post, endpoint.query_url()).with_body(body)
}

fn interpret_query(query: &Query, response: &WireResponse) -> SyncResult<QueryPage> {
    protocol::check_status(response)?;
    let body = protocol::parse_body(response)?;

    let results = match body.get("results") {
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(SyncError::format(format!(
                "expected `results` to be an array, got {other}"
            )))
        }
        None => return Err(SyncError::format("response is missing `results`")),
    };

    let mut records = Vec::with_capacity(results.len());
    for item in results {
        let payload = item
            .as_object()
            .ok_or_else(|| SyncError::format("query result entry is not an object"))?;
        let record = Record::from_payload(payload.clone())
            .map_err(|err| SyncError::format(err.to_string()))?;
        records.push(record);
    }

    let next_query = protocol::opt_str(&body, "nextPaginationKey")?
        .map(|key| query.with_pagination_key(key));

    Ok(QueryPage {
        records,
        next_query,
    })
}

fn interpret_count(response: &WireResponse) -> SyncResult<u64> {
    protocol::check_status(response)?;
    let body = protocol::parse_body(response)?;
    body.get("aggregations")
        .and_then(Value::as_object)
        .and_then(|aggregations| aggregations.get("count_field"))
        .and_then(Value::as_u64)
        .ok_or_else(|| SyncError::format("response carries no `aggregations.count_field`"))
}
