//! Wire types shared by the server handlers and the client driver.
//!
//! Document bodies keep their CouchDB-flavored field names (`_id`, `_rev`,
//! `_deleted`, `_base_content`) on the wire; everything else is snake_case.

use serde::{Deserialize, Serialize};

use crate::merge::ConflictRegion;

/// `GET /` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub name: String,
    pub version: String,
    pub status: String,
}

/// `GET /api/status` body: the cursor tips for one vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub ok: bool,
    pub vault_id: String,
    pub last_seq: i64,
    pub last_attachment_seq: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRev {
    pub rev: String,
}

/// One row of the document change feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocChange {
    pub seq: i64,
    pub id: String,
    pub changes: Vec<ChangeRev>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangesResponse {
    pub results: Vec<DocChange>,
    pub last_seq: i64,
}

/// A document body as served by `GET /api/docs/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocBody {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev")]
    pub rev: String,
    pub content: Option<String>,
    #[serde(rename = "_deleted", default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}

/// Body of `PUT /api/docs/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutDocRequest {
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutDocResponse {
    pub ok: bool,
    pub id: String,
    pub rev: String,
}

/// 409 body for a conflicting PUT or DELETE.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutConflictResponse {
    pub error: String,
    pub reason: String,
    pub current_rev: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provided_rev: Option<String>,
}

/// One entry of a bulk upsert request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkDocInput {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "_deleted", default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    #[serde(
        rename = "_base_content",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub base_content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkDocsRequest {
    pub docs: Vec<BulkDocInput>,
}

/// One entry of a bulk upsert reply, in request order. Exactly one of the
/// `ok`/`error` shapes is populated per entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkDocResult {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_rev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_deleted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicts: Option<Vec<ConflictRegion>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_full_sync: Option<bool>,
}

impl BulkDocResult {
    pub fn ok(id: impl Into<String>, rev: String) -> Self {
        Self {
            id: id.into(),
            ok: Some(true),
            rev: Some(rev),
            ..Self::default()
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.error.as_deref() == Some("conflict")
    }
}

/// One row of the attachment change feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentChange {
    pub seq: i64,
    pub id: String,
    pub path: String,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentChangesResponse {
    pub results: Vec<AttachmentChange>,
    pub last_seq: i64,
}

/// `GET /api/attachments/:id` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentMeta {
    pub id: String,
    pub path: String,
    pub content_type: String,
    pub size: i64,
    pub hash: String,
    pub deleted: bool,
}

/// `PUT /api/attachments/:path` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub ok: bool,
    pub id: String,
    pub hash: String,
    pub size: i64,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unchanged: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminStatsResponse {
    pub ok: bool,
    pub documents: i64,
    pub revisions: i64,
    pub changes: i64,
    pub attachments: i64,
    pub last_seq: i64,
    pub last_attachment_seq: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub ok: bool,
    pub revisions_deleted: u64,
    pub changes_deleted: u64,
}

/// `POST /api/auth/new` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewKeyResponse {
    pub ok: bool,
    pub key: String,
}

/// Generic JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
