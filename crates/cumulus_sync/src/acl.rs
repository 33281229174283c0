//! Access-control grants over buckets, records and topics.
//!
//! An ACL entry pairs an action with a subject. Grant and revoke are
//! one request each against `<acl_url>/<ACTION>/<subject>`; listing
//! fetches `<acl_url>` and parses the map of action names to subject
//! arrays the server returns.

use serde_json::Value;

use tracing::debug;

use crate::client::SyncClient;
use crate::error::{SyncError, SyncResult};
use crate::protocol;
use crate::transport::{Method, WireRequest, WireResponse};

/// Actions grantable on a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketAction {
    /// Run queries against the bucket.
    QueryObjectsInBucket,
    /// Create new records in the bucket.
    CreateObjectsInBucket,
    /// Drop the bucket with everything in it.
    DropBucketWithAllContent,
    /// Read records in the bucket.
    ReadObjectsInBucket,
}

/// Actions grantable on a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectAction {
    /// Read the record.
    ReadExistingObject,
    /// Modify the record.
    WriteExistingObject,
}

/// Actions grantable on a push topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicAction {
    /// Publish messages to the topic.
    SendMessageToTopic,
    /// Subscribe to the topic.
    SubscribeToTopic,
}

/// Any grantable action, regardless of what it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclAction {
    /// A bucket-level action.
    Bucket(BucketAction),
    /// A record-level action.
    Object(ObjectAction),
    /// A topic-level action.
    Topic(TopicAction),
}

impl AclAction {
    /// The action name as it appears in URLs and list responses.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Bucket(BucketAction::QueryObjectsInBucket) => "QUERY_OBJECTS_IN_BUCKET",
            Self::Bucket(BucketAction::CreateObjectsInBucket) => "CREATE_OBJECTS_IN_BUCKET",
            Self::Bucket(BucketAction::DropBucketWithAllContent) => {
                "DROP_BUCKET_WITH_ALL_CONTENT"
            }
            Self::Bucket(BucketAction::ReadObjectsInBucket) => "READ_OBJECTS_IN_BUCKET",
            Self::Object(ObjectAction::ReadExistingObject) => "READ_EXISTING_OBJECT",
            Self::Object(ObjectAction::WriteExistingObject) => "WRITE_EXISTING_OBJECT",
            Self::Topic(TopicAction::SendMessageToTopic) => "SEND_MESSAGE_TO_TOPIC",
            Self::Topic(TopicAction::SubscribeToTopic) => "SUBSCRIBE_TO_TOPIC",
        }
    }

    fn from_wire_name(name: &str) -> Option<Self> {
        Some(match name {
            "QUERY_OBJECTS_IN_BUCKET" => Self::Bucket(BucketAction::QueryObjectsInBucket),
            "CREATE_OBJECTS_IN_BUCKET" => Self::Bucket(BucketAction::CreateObjectsInBucket),
            "DROP_BUCKET_WITH_ALL_CONTENT" => {
                Self::Bucket(BucketAction::DropBucketWithAllContent)
            }
            "READ_OBJECTS_IN_BUCKET" => Self::Bucket(BucketAction::ReadObjectsInBucket),
            "READ_EXISTING_OBJECT" => Self::Object(ObjectAction::ReadExistingObject),
            "WRITE_EXISTING_OBJECT" => Self::Object(ObjectAction::WriteExistingObject),
            "SEND_MESSAGE_TO_TOPIC" => Self::Topic(TopicAction::SendMessageToTopic),
            "SUBSCRIBE_TO_TOPIC" => Self::Topic(TopicAction::SubscribeToTopic),
            _ => return None,
        })
    }
}

impl From<BucketAction> for AclAction {
    fn from(action: BucketAction) -> Self {
        Self::Bucket(action)
    }
}

impl From<ObjectAction> for AclAction {
    fn from(action: ObjectAction) -> Self {
        Self::Object(action)
    }
}

impl From<TopicAction> for AclAction {
    fn from(action: TopicAction) -> Self {
        Self::Topic(action)
    }
}

const ANONYMOUS: &str = "ANONYMOUS_USER";
const ANY_AUTHENTICATED: &str = "ANY_AUTHENTICATED_USER";

/// Who an ACL entry applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AclSubject {
    /// A specific user.
    UserId(String),
    /// A specific group.
    GroupId(String),
    /// Unauthenticated callers.
    Anonymous,
    /// Any signed-in user.
    AnyAuthenticated,
}

impl AclSubject {
    /// The subject segment as it appears in grant and revoke URLs.
    pub fn wire_name(&self) -> String {
        match self {
            Self::UserId(id) => format!("UserID:{id}"),
            Self::GroupId(id) => format!("GroupID:{id}"),
            Self::Anonymous => format!("UserID:{ANONYMOUS}"),
            Self::AnyAuthenticated => format!("UserID:{ANY_AUTHENTICATED}"),
        }
    }

    fn from_user_id(id: &str) -> Self {
        match id {
            ANONYMOUS => Self::Anonymous,
            ANY_AUTHENTICATED => Self::AnyAuthenticated,
            other => Self::UserId(other.to_owned()),
        }
    }
}

/// One granted permission, as reported by a list fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEntry {
    /// The granted action.
    pub action: AclAction,
    /// Who holds the grant.
    pub subject: AclSubject,
}

fn entry_url(acl_url: &str, action: AclAction, subject: &AclSubject) -> String {
    format!(
        "{}/{}/{}",
        acl_url.trim_end_matches('/'),
        action.wire_name(),
        subject.wire_name()
    )
}

fn interpret_list(response: &WireResponse) -> SyncResult<Vec<AclEntry>> {
    protocol::check_status(response)?;
    let body = protocol::parse_body(response)?;

    let mut entries = Vec::new();
    for (name, subjects) in &body {
        // Servers may report actions this client does not model; skip
        // them rather than fail the whole listing.
        let Some(action) = AclAction::from_wire_name(name) else {
            continue;
        };
        let Some(subjects) = subjects.as_array() else {
            return Err(SyncError::format(format!(
                "expected `{name}` to hold a subject array"
            )));
        };
        for subject in subjects {
            let Some(subject) = subject.as_object() else {
                return Err(SyncError::format(format!(
                    "malformed subject under `{name}`"
                )));
            };
            let parsed = match (subject.get("userID"), subject.get("groupID")) {
                (Some(Value::String(id)), _) => AclSubject::from_user_id(id),
                (_, Some(Value::String(id))) => AclSubject::GroupId(id.clone()),
                _ => {
                    return Err(SyncError::format(format!(
                        "subject under `{name}` names neither a user nor a group"
                    )))
                }
            };
            entries.push(AclEntry {
                action,
                subject: parsed,
            });
        }
    }
    Ok(entries)
}

impl SyncClient {
    /// Grants `action` on the resource behind `acl_url` to `subject`.
    pub fn grant(
        &self,
        acl_url: &str,
        action: impl Into<AclAction>,
        subject: &AclSubject,
    ) -> SyncResult<()> {
        let url = entry_url(acl_url, action.into(), subject);
        debug!(%url, "acl grant");
        let response = self.transport().send(&WireRequest::new(Method::Put, url))?;
        protocol::check_status(&response)
    }

    /// Revokes `action` on the resource behind `acl_url` from
    /// `subject`.
    pub fn revoke(
        &self,
        acl_url: &str,
        action: impl Into<AclAction>,
        subject: &AclSubject,
    ) -> SyncResult<()> {
        let url = entry_url(acl_url, action.into(), subject);
        debug!(%url, "acl revoke");
        let response = self
            .transport()
            .send(&WireRequest::new(Method::Delete, url))?;
        protocol::check_status(&response)
    }

    /// Lists every grant on the resource behind `acl_url`.
    pub fn list_acl(&self, acl_url: &str) -> SyncResult<Vec<AclEntry>> {
        debug!(url = %acl_url, "acl list");
        let response = self
            .transport()
            .send(&WireRequest::new(Method::Get, acl_url))?;
        interpret_list(&response)
    }

    /// Callback variant of [`list_acl`](Self::list_acl).
    pub fn list_acl_async(
        &self,
        acl_url: &str,
        callback: impl FnOnce(SyncResult<Vec<AclEntry>>) + Send + 'static,
    ) {
        debug!(url = %acl_url, "acl list");
        self.transport().send_async(
            WireRequest::new(Method::Get, acl_url),
            Box::new(move |result| {
                callback(
                    result
                        .map_err(SyncError::from)
                        .and_then(|response| interpret_list(&response)),
                );
            }),
        );
    }
}
