//! The delta-tracking record.

use crate::container::{FieldContainer, FieldValue, FromField};
use crate::error::{FieldError, FieldResult};
use serde_json::{Map, Value};

/// Keys managed by the sync protocol, rejected for direct mutation.
const RESERVED_KEYS: &[&str] = &["_id", "_created", "_modified", "_version", "_owner"];

/// Timestamp sentinel meaning "not yet known from the server".
const UNKNOWN_TIME: i64 = -1;

/// A local mirror of a server-side entity with delta tracking.
///
/// A record holds two views: the `baseline` (the state last known or
/// assumed to match the server) and the `delta` (the subset of keys
/// changed locally since the last successful sync). Every external
/// mutation updates both; a successful save or refresh clears the delta.
///
/// Lifecycle: created locally without identity, saved (server assigns
/// identity, timestamps and a version token), mutated and re-synced, and
/// finally deleted, which resets the record and makes further sync
/// operations fail.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    baseline: FieldContainer,
    delta: Map<String, Value>,
    id: Option<String>,
    version: Option<String>,
    created_at: i64,
    modified_at: i64,
    deleted: bool,
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

impl Record {
    /// Creates an empty, unsaved record.
    pub fn new() -> Self {
        Self {
            baseline: FieldContainer::new(RESERVED_KEYS),
            delta: Map::new(),
            id: None,
            version: None,
            created_at: UNKNOWN_TIME,
            modified_at: UNKNOWN_TIME,
            deleted: false,
        }
    }

    /// Creates an unsaved record with a caller-chosen identity.
    ///
    /// The record is not considered saved until a server response has
    /// been folded in; saving it issues a conditional create.
    pub fn with_id(id: impl Into<String>) -> FieldResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(FieldError::Validation("record id must not be empty".into()));
        }
        let mut record = Self::new();
        record.id = Some(id);
        Ok(record)
    }

    /// Hydrates a record from a raw server payload (e.g. a query result
    /// element).
    ///
    /// Identity, timestamps and the version token are read from the
    /// reserved `_id`/`_created`/`_modified`/`_version` fields. `_id` and
    /// `_created` are required; a missing `_modified` falls back to
    /// `_created`. The delta starts empty.
    pub fn from_payload(payload: Map<String, Value>) -> FieldResult<Self> {
        let baseline = FieldContainer::from_json(payload, RESERVED_KEYS);
        let id: String = baseline.get("_id")?;
        let created_at: i64 = baseline.get("_created")?;
        let modified_at = baseline.get_or("_modified", created_at);
        let version = baseline
            .raw("_version")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            baseline,
            delta: Map::new(),
            id: Some(id),
            version,
            created_at,
            modified_at,
            deleted: false,
        })
    }

    /// Returns the server-assigned identity, if any.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Returns the opaque concurrency version token, if captured.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Creation time in epoch milliseconds, or -1 until known.
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Modification time in epoch milliseconds, or -1 until known.
    pub fn modified_at(&self) -> i64 {
        self.modified_at
    }

    /// Returns true once a server response has assigned timestamps.
    pub fn is_saved(&self) -> bool {
        self.created_at > UNKNOWN_TIME
    }

    /// Returns true after a successful delete.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Returns the typed value for `key` from the baseline.
    pub fn get<T: FromField>(&self, key: &str) -> FieldResult<T> {
        self.baseline.get(key)
    }

    /// Returns the typed value for `key`, or `fallback` on any mismatch
    /// or absence.
    pub fn get_or<T: FromField>(&self, key: &str, fallback: T) -> T {
        self.baseline.get_or(key, fallback)
    }

    /// Returns true if `key` has a value.
    pub fn has(&self, key: &str) -> bool {
        self.baseline.has(key)
    }

    /// Iterates over all non-reserved, non-underscore-prefixed keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.baseline.keys()
    }

    /// Sets `key` in both the baseline and the pending delta.
    pub fn set(&mut self, key: &str, value: impl Into<FieldValue>) -> FieldResult<()> {
        let json = value.into().into_json();
        self.baseline.set(key, jsonable(json.clone()))?;
        self.delta.insert(key.to_string(), json);
        Ok(())
    }

    /// Removes `key` from both the baseline and the pending delta.
    pub fn remove(&mut self, key: &str) -> FieldResult<()> {
        self.baseline.remove(key)?;
        self.delta.remove(key);
        Ok(())
    }

    /// Returns the keys changed locally since the last successful sync.
    pub fn pending_keys(&self) -> impl Iterator<Item = &str> {
        self.delta.keys().map(String::as_str)
    }

    /// Returns true if any local change has not been synced yet.
    pub fn has_pending_changes(&self) -> bool {
        !self.delta.is_empty()
    }

    /// Full baseline as a JSON map (a full-overwrite request body).
    pub fn baseline_json(&self) -> Map<String, Value> {
        self.baseline.to_json()
    }

    /// Pending delta as a JSON map (a partial-update request body).
    pub fn delta_json(&self) -> Map<String, Value> {
        self.delta.clone()
    }

    /// Folds in a create response. Used by the sync layer.
    pub fn absorb_create(
        &mut self,
        id: String,
        created_at: i64,
        updated_at: Option<i64>,
        version: Option<String>,
    ) {
        self.id = Some(id);
        self.created_at = created_at;
        self.modified_at = updated_at.unwrap_or(created_at);
        if version.is_some() {
            self.version = version;
        }
        self.delta.clear();
        self.deleted = false;
    }

    /// Folds in a partial- or full-update response. Used by the sync
    /// layer.
    pub fn absorb_update(
        &mut self,
        id: Option<String>,
        created_at: Option<i64>,
        modified_at: i64,
        version: Option<String>,
    ) {
        if self.id.is_none() {
            self.id = id;
        }
        if let Some(created) = created_at {
            self.created_at = created;
        }
        self.modified_at = modified_at;
        if version.is_some() {
            self.version = version;
        }
        self.delta.clear();
    }

    /// Replaces the baseline with a fetched server payload, discarding
    /// any unsynced local changes. Used by the sync layer.
    pub fn absorb_refresh(
        &mut self,
        payload: Map<String, Value>,
        version: Option<String>,
    ) -> FieldResult<()> {
        let fetched = FieldContainer::from_json(payload, RESERVED_KEYS);
        let created_at: i64 = fetched.get("_created")?;
        let modified_at = fetched.get_or("_modified", created_at);

        self.baseline = fetched;
        self.created_at = created_at;
        self.modified_at = modified_at;
        if version.is_some() {
            self.version = version;
        }
        self.delta.clear();
        Ok(())
    }

    /// Resets the record after a successful delete. Used by the sync
    /// layer. The record transitions to its terminal deleted state.
    pub fn reset_deleted(&mut self) {
        self.baseline.clear();
        self.delta.clear();
        self.id = None;
        self.version = None;
        self.created_at = UNKNOWN_TIME;
        self.modified_at = UNKNOWN_TIME;
        self.deleted = true;
    }
}

// `set` converts through FieldValue once; the baseline re-wraps the
// already-converted JSON so bytes are not base64-encoded twice.
fn jsonable(json: Value) -> FieldValue {
    match json {
        Value::Object(map) => FieldValue::Object(map),
        Value::Array(items) => FieldValue::Array(items),
        Value::Bool(v) => FieldValue::Bool(v),
        Value::String(v) => FieldValue::Str(v),
        Value::Number(v) => {
            if let Some(i) = v.as_i64() {
                FieldValue::Int(i)
            } else {
                FieldValue::Float(v.as_f64().unwrap_or(0.0))
            }
        }
        Value::Null => FieldValue::Str(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_record_is_unsaved() {
        let record = Record::new();
        assert!(record.id().is_none());
        assert!(record.version().is_none());
        assert_eq!(record.created_at(), -1);
        assert!(!record.is_saved());
        assert!(!record.has_pending_changes());
    }

    #[test]
    fn mutation_updates_baseline_and_delta() {
        let mut record = Record::new();
        record.set("score", 10i64).unwrap();

        assert_eq!(record.get::<i64>("score").unwrap(), 10);
        assert_eq!(record.pending_keys().collect::<Vec<_>>(), vec!["score"]);
        assert_eq!(record.delta_json()["score"], json!(10));
    }

    #[test]
    fn remove_clears_both_maps() {
        let mut record = Record::new();
        record.set("score", 10i64).unwrap();
        record.remove("score").unwrap();

        assert!(!record.has("score"));
        assert!(!record.has_pending_changes());
    }

    #[test]
    fn reserved_key_rejected() {
        let mut record = Record::new();
        assert!(matches!(
            record.set("_version", "v9"),
            Err(FieldError::InvalidKey(_))
        ));
    }

    #[test]
    fn bytes_not_double_encoded() {
        let mut record = Record::new();
        record.set("blob", vec![1u8, 2, 3]).unwrap();

        assert_eq!(record.get::<String>("blob").unwrap(), "AQID");
        assert_eq!(record.delta_json()["blob"], json!("AQID"));
    }

    #[test]
    fn from_payload_populates_reserved_fields() {
        let payload = json!({
            "_id": "abc",
            "_created": 1000,
            "_modified": 2000,
            "_version": "v1",
            "score": 10,
        });
        let record = Record::from_payload(payload.as_object().unwrap().clone()).unwrap();

        assert_eq!(record.id(), Some("abc"));
        assert_eq!(record.created_at(), 1000);
        assert_eq!(record.modified_at(), 2000);
        assert_eq!(record.version(), Some("v1"));
        assert_eq!(record.get::<i64>("score").unwrap(), 10);
        assert!(!record.has_pending_changes());
    }

    #[test]
    fn from_payload_missing_modified_falls_back() {
        let payload = json!({"_id": "abc", "_created": 1000});
        let record = Record::from_payload(payload.as_object().unwrap().clone()).unwrap();
        assert_eq!(record.modified_at(), 1000);
        assert!(record.version().is_none());
    }

    #[test]
    fn from_payload_missing_id_fails() {
        let payload = json!({"_created": 1000});
        assert!(Record::from_payload(payload.as_object().unwrap().clone()).is_err());
    }

    #[test]
    fn absorb_create_assigns_identity_and_clears_delta() {
        let mut record = Record::new();
        record.set("score", 10i64).unwrap();

        record.absorb_create("abc".into(), 1000, None, Some("v1".into()));

        assert_eq!(record.id(), Some("abc"));
        assert_eq!(record.created_at(), 1000);
        assert_eq!(record.modified_at(), 1000);
        assert_eq!(record.version(), Some("v1"));
        assert!(record.is_saved());
        assert!(!record.has_pending_changes());
        // the field survives in the baseline
        assert_eq!(record.get::<i64>("score").unwrap(), 10);
    }

    #[test]
    fn absorb_refresh_discards_local_changes() {
        let mut record = Record::with_id("abc").unwrap();
        record.set("score", 99i64).unwrap();

        let payload = json!({"_id": "abc", "_created": 1000, "_modified": 1500, "score": 10});
        record
            .absorb_refresh(payload.as_object().unwrap().clone(), Some("v2".into()))
            .unwrap();

        assert_eq!(record.get::<i64>("score").unwrap(), 10);
        assert!(!record.has_pending_changes());
        assert_eq!(record.version(), Some("v2"));
        assert!(record.is_saved());
    }

    #[test]
    fn reset_deleted_clears_everything() {
        let mut record = Record::new();
        record.set("score", 10i64).unwrap();
        record.absorb_create("abc".into(), 1000, None, Some("v1".into()));

        record.reset_deleted();

        assert!(record.is_deleted());
        assert!(record.id().is_none());
        assert!(record.version().is_none());
        assert_eq!(record.created_at(), -1);
        assert!(!record.has("score"));
    }

    #[test]
    fn with_id_is_not_saved() {
        let record = Record::with_id("abc").unwrap();
        assert_eq!(record.id(), Some("abc"));
        assert!(!record.is_saved());

        assert!(Record::with_id("").is_err());
    }
}
