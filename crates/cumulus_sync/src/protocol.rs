//! Builds wire requests for record operations and folds responses back
//! into the record.
//!
//! Every operation splits into a pure `plan_*` step that produces a
//! [`WireRequest`] and an `interpret_*` step that applies the
//! [`WireResponse`] to the record. The blocking and callback entry
//! points in [`crate::client`] share these verbatim.

use serde_json::{Map, Value};
use tracing::warn;

use cumulus_record::Record;

use crate::endpoint::BucketEndpoint;
use crate::error::{SyncError, SyncResult};
use crate::transport::{Method, WireRequest, WireResponse};

/// Which body an update sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Send only the locally changed fields; server merges.
    Partial,
    /// Send the whole baseline; server replaces.
    Full,
}

/// Whether a write checks the server version first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Last write wins; no precondition headers.
    Force,
    /// Refuse the write if the server holds a different version.
    Safe,
}

/// The shape of save the planner chose, carried to interpretation so
/// the right response fields are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SavePlan {
    Create,
    Partial,
    Full,
}

const OVERRIDE_HEADER: &str = "X-HTTP-Method-Override";

pub(crate) fn plan_save(
    record: &Record,
    endpoint: &BucketEndpoint,
    mode: MergeMode,
    policy: WritePolicy,
) -> SyncResult<(SavePlan, WireRequest)> {
    if record.is_deleted() {
        return Err(SyncError::invalid_state("record has been deleted"));
    }

    let Some(id) = record.id() else {
        // No identity yet: always a create, and there is nothing on the
        // server a precondition could protect.
        let request = WireRequest::new(Method::Post, endpoint.records_url())
            .with_body(Value::Object(record.baseline_json()));
        return Ok((SavePlan::Create, request));
    };

    let url = endpoint.record_url(id);
    let (plan, mut request) = match mode {
        MergeMode::Partial => {
            let request = WireRequest::new(Method::Post, url)
                .with_header(OVERRIDE_HEADER, "PATCH")
                .with_body(Value::Object(record.delta_json()));
            (SavePlan::Partial, request)
        }
        MergeMode::Full => {
            let request = WireRequest::new(Method::Put, url)
                .with_body(Value::Object(record.baseline_json()));
            (SavePlan::Full, request)
        }
    };

    if policy == WritePolicy::Safe {
        match record.version() {
            Some(version) => request = request.with_header("If-Match", version),
            None if record.is_saved() => {
                return Err(SyncError::invalid_state(
                    "no version token held; refresh the record before a safe save",
                ));
            }
            // A partial save merges into a server copy; without a
            // version token there is nothing known to merge into.
            None if plan == SavePlan::Partial => {
                return Err(SyncError::invalid_state(
                    "a safe partial save needs a version token; refresh or save fully first",
                ));
            }
            // Caller-chosen id, never saved: only succeed if the id is
            // still unclaimed on the server.
            None => request = request.with_header("If-None-Match", "*"),
        }
    }

    Ok((plan, request))
}

pub(crate) fn interpret_save(
    record: &mut Record,
    plan: SavePlan,
    response: &WireResponse,
) -> SyncResult<()> {
    check_status(response)?;
    let body = parse_body(response)?;
    let version = response.etag.clone();

    match plan {
        SavePlan::Create => {
            let id = require_str(&body, "objectID")?;
            let created_at = require_i64(&body, "createdAt")?;
            let updated_at = opt_i64(&body, "updatedAt")?;
            record.absorb_create(id, created_at, updated_at, version);
        }
        SavePlan::Partial => {
            let id = opt_str(&body, "objectID")?;
            let created_at = require_i64(&body, "_created")?;
            let modified_at = require_i64(&body, "_modified")?;
            record.absorb_update(id, Some(created_at), modified_at, version);
        }
        SavePlan::Full => {
            let id = opt_str(&body, "objectID")?;
            let created_at = opt_i64(&body, "createdAt")?;
            let modified_at = require_i64(&body, "modifiedAt")?;
            record.absorb_update(id, created_at, modified_at, version);
        }
    }
    Ok(())
}

pub(crate) fn plan_refresh(
    record: &Record,
    endpoint: &BucketEndpoint,
) -> SyncResult<WireRequest> {
    let id = require_identity(record)?;
    Ok(WireRequest::new(Method::Get, endpoint.record_url(id)))
}

pub(crate) fn interpret_refresh(
    record: &mut Record,
    response: &WireResponse,
) -> SyncResult<()> {
    check_status(response)?;
    let body = parse_body(response)?;
    let version = response.etag.clone();
    record
        .absorb_refresh(body, version)
        .map_err(|err| SyncError::format(err.to_string()))
}

pub(crate) fn plan_delete(
    record: &Record,
    endpoint: &BucketEndpoint,
) -> SyncResult<WireRequest> {
    let id = require_identity(record)?;
    Ok(WireRequest::new(Method::Delete, endpoint.record_url(id)))
}

pub(crate) fn interpret_delete(
    record: &mut Record,
    response: &WireResponse,
) -> SyncResult<()> {
    check_status(response)?;
    record.reset_deleted();
    Ok(())
}

fn require_identity(record: &Record) -> SyncResult<&str> {
    if record.is_deleted() {
        return Err(SyncError::invalid_state("record has been deleted"));
    }
    record
        .id()
        .ok_or_else(|| SyncError::invalid_state("record has no identity; save it first"))
}

/// Maps a non-success status to the error taxonomy. 409 and 412 are the
/// precondition failures optimistic concurrency produces.
pub(crate) fn check_status(response: &WireResponse) -> SyncResult<()> {
    if response.is_success() {
        return Ok(());
    }
    match response.status {
        409 | 412 => {
            warn!(status = response.status, "write precondition failed");
            Err(SyncError::Conflict {
                status: response.status,
            })
        }
        status => Err(SyncError::Cloud {
            status,
            message: response.body.clone(),
        }),
    }
}

pub(crate) fn parse_body(response: &WireResponse) -> SyncResult<Map<String, Value>> {
    if response.body.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(&response.body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(SyncError::format(format!(
            "expected a JSON object in the response, got {other}"
        ))),
        Err(err) => Err(SyncError::format(format!("malformed response body: {err}"))),
    }
}

pub(crate) fn require_str(body: &Map<String, Value>, key: &str) -> SyncResult<String> {
    opt_str(body, key)?
        .ok_or_else(|| SyncError::format(format!("response is missing `{key}`")))
}

pub(crate) fn opt_str(body: &Map<String, Value>, key: &str) -> SyncResult<Option<String>> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(SyncError::format(format!(
            "expected `{key}` to be a string, got {other}"
        ))),
    }
}

pub(crate) fn require_i64(body: &Map<String, Value>, key: &str) -> SyncResult<i64> {
    opt_i64(body, key)?
        .ok_or_else(|| SyncError::format(format!("response is missing `{key}`")))
}

pub(crate) fn opt_i64(body: &Map<String, Value>, key: &str) -> SyncResult<Option<i64>> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_i64().map(Some).ok_or_else(|| {
            SyncError::format(format!("`{key}` does not fit a 64-bit integer"))
        }),
        Some(other) => Err(SyncError::format(format!(
            "expected `{key}` to be an integer, got {other}"
        ))),
    }
}
