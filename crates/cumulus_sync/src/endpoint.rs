//! URL endpoints supplied by the surrounding wrapper.

/// The URLs a bucket-shaped collection exposes.
///
/// The engine never derives URLs from scope hierarchies; the wrapper
/// that knows the server layout constructs an endpoint and hands it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketEndpoint {
    records_url: String,
    query_url: String,
}

impl BucketEndpoint {
    /// Creates an endpoint.
    ///
    /// `records_url` is where creates are POSTed and under which
    /// individual records live; `query_url` receives compiled query
    /// bodies.
    pub fn new(records_url: impl Into<String>, query_url: impl Into<String>) -> Self {
        Self {
            records_url: trim_slash(records_url.into()),
            query_url: trim_slash(query_url.into()),
        }
    }

    /// URL for creating records.
    pub fn records_url(&self) -> &str {
        &self.records_url
    }

    /// URL addressing one record by identity.
    pub fn record_url(&self, id: &str) -> String {
        format!("{}/{}", self.records_url, id)
    }

    /// URL receiving compiled queries.
    pub fn query_url(&self) -> &str {
        &self.query_url
    }
}

fn trim_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_url_joins_id() {
        let endpoint = BucketEndpoint::new(
            "https://api.example.com/buckets/scores/objects/",
            "https://api.example.com/buckets/scores/query",
        );
        assert_eq!(
            endpoint.record_url("abc"),
            "https://api.example.com/buckets/scores/objects/abc"
        );
        assert_eq!(
            endpoint.records_url(),
            "https://api.example.com/buckets/scores/objects"
        );
    }
}
