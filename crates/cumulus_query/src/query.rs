//! Query wrapper and wire compilation.

use crate::clause::Clause;
use crate::error::{ClauseError, ClauseResult};
use serde_json::{json, Map, Value};

/// A sort directive. Directives apply in the order they were added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    /// Field to sort by.
    pub field: String,
    /// Descending when true, ascending when false.
    pub descending: bool,
}

/// A compiled-on-demand query: an optional clause tree plus sort, limit
/// and pagination directives.
///
/// A pagination key returned with one result page may only be replayed
/// against a structurally identical query (same clause tree and sort
/// order); the server, not the client, detects violations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    clause: Option<Clause>,
    sort: Vec<SortOrder>,
    limit: Option<u32>,
    pagination_key: Option<String>,
}

impl Query {
    /// Creates a query matching every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query from a clause tree.
    pub fn from_clause(clause: Clause) -> Self {
        Self {
            clause: Some(clause),
            ..Self::default()
        }
    }

    /// Appends an ascending sort directive.
    pub fn sort_by_asc(&mut self, field: &str) -> ClauseResult<()> {
        self.push_sort(field, false)
    }

    /// Appends a descending sort directive.
    pub fn sort_by_desc(&mut self, field: &str) -> ClauseResult<()> {
        self.push_sort(field, true)
    }

    /// Sets the best-effort scan limit. Zero clears the limit.
    pub fn set_limit(&mut self, limit: u32) {
        self.limit = if limit > 0 { Some(limit) } else { None };
    }

    /// Returns the pagination key, if any.
    pub fn pagination_key(&self) -> Option<&str> {
        self.pagination_key.as_deref()
    }

    /// Returns a copy of this query carrying `key` as its pagination
    /// cursor. Used by the result pipeline to build next-page queries.
    pub fn with_pagination_key(&self, key: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.pagination_key = Some(key.into());
        next
    }

    /// Compiles to the query wire format.
    ///
    /// An absent clause compiles to match-all.
    pub fn to_json(&self) -> Value {
        self.compile(None)
    }

    /// Compiles to the wire format with a server-side count aggregation
    /// injected. The response carries the count in
    /// `aggregations.count_field` instead of hydrated records.
    pub fn to_count_json(&self) -> Value {
        let aggregations = json!([{
            "type": "COUNT",
            "putAggregationInto": "count_field",
        }]);
        self.compile(Some(aggregations))
    }

    fn compile(&self, aggregations: Option<Value>) -> Value {
        let mut bucket_query = Map::new();
        let clause = match &self.clause {
            Some(clause) => clause.to_json(),
            None => Clause::All.to_json(),
        };
        bucket_query.insert("clause".into(), clause);
        if !self.sort.is_empty() {
            let sort: Vec<Value> = self
                .sort
                .iter()
                .map(|order| {
                    json!({
                        "field": order.field,
                        "descending": order.descending,
                    })
                })
                .collect();
            bucket_query.insert("sort".into(), Value::Array(sort));
        }
        if let Some(aggregations) = aggregations {
            bucket_query.insert("aggregations".into(), aggregations);
        }

        let mut query = Map::new();
        query.insert("bucketQuery".into(), Value::Object(bucket_query));
        if let Some(key) = &self.pagination_key {
            query.insert("paginationKey".into(), Value::from(key.clone()));
        }
        if let Some(limit) = self.limit {
            query.insert("bestEffortLimit".into(), Value::from(limit));
        }
        Value::Object(query)
    }

    fn push_sort(&mut self, field: &str, descending: bool) -> ClauseResult<()> {
        if field.is_empty() {
            return Err(ClauseError::EmptyField);
        }
        self.sort.push(SortOrder {
            field: field.to_string(),
            descending,
        });
        Ok(())
    }
}
