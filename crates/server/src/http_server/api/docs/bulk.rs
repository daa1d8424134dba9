//! Bulk upsert with server-side three-way merge.
//!
//! Each input doc is handled independently and in order; the reply always
//! carries one result per input. A revision collision is merged on the spot
//! when a base is available (supplied by the client, or recovered from the
//! revisions table), otherwise reported back as a conflict for the client
//! to resolve.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use tracing::{debug, warn};

use common::merge::{three_way_merge, MergeOutcome};
use common::protocol::{BulkDocInput, BulkDocResult, BulkDocsRequest};
use common::revision;

use crate::database::{Database, DocumentRow};
use crate::http_server::api::VaultQuery;

const CONFLICT_REASON: &str = "Document update conflict - manual resolution required";

pub async fn handler(
    State(state): State<crate::State>,
    Query(query): Query<VaultQuery>,
    Json(request): Json<BulkDocsRequest>,
) -> impl IntoResponse {
    let vault_id = query.vault_id().to_owned();
    let mut results = Vec::with_capacity(request.docs.len());

    for doc in &request.docs {
        let result = match apply_one(state.database(), &vault_id, doc).await {
            Ok(result) => result,
            Err(e) => {
                warn!(doc_id = %doc.id, error = %e, "bulk upsert item failed");
                BulkDocResult {
                    id: doc.id.clone(),
                    error: Some("internal_error".to_owned()),
                    reason: Some(e.to_string()),
                    ..Default::default()
                }
            }
        };
        results.push(result);
    }

    Json(results)
}

async fn apply_one(
    db: &Database,
    vault_id: &str,
    doc: &BulkDocInput,
) -> Result<BulkDocResult, sqlx::Error> {
    let existing = db.get_document(&doc.id, vault_id).await?;
    let deleted = doc.deleted.unwrap_or(false);
    let content = if deleted { None } else { doc.content.as_deref() };

    match existing {
        None => {
            let rev = revision::generate(None);
            db.upsert_document(&doc.id, vault_id, content, &rev, deleted)
                .await?;
            Ok(BulkDocResult::ok(&doc.id, rev))
        }
        Some(ref ex) if doc.rev.is_none() || doc.rev.as_deref() == Some(ex.rev.as_str()) => {
            let rev = revision::generate(Some(&ex.rev));
            db.upsert_document(&doc.id, vault_id, content, &rev, deleted)
                .await?;
            Ok(BulkDocResult::ok(&doc.id, rev))
        }
        Some(ref ex) => merge_or_conflict(db, vault_id, doc, ex).await,
    }
}

/// The pushed `_rev` is stale. Try a three-way merge; fall back to a
/// conflict reply carrying the server's current state.
async fn merge_or_conflict(
    db: &Database,
    vault_id: &str,
    doc: &BulkDocInput,
    existing: &DocumentRow,
) -> Result<BulkDocResult, sqlx::Error> {
    // Base preference: the client-supplied snapshot, else the content of
    // the revision the client claims to have seen.
    let named_base = match (&doc.base_content, &doc.rev) {
        (Some(base), _) => Some(base.clone()),
        (None, Some(rev)) => db
            .get_revision(&doc.id, vault_id, rev)
            .await?
            .and_then(|r| r.content),
        (None, None) => None,
    };
    let base_unlocatable = doc.base_content.is_none() && named_base.is_none();

    if let (Some(base), Some(server_content), Some(pushed_content)) =
        (&named_base, &existing.content, &doc.content)
    {
        if !server_content.is_empty() && !pushed_content.is_empty() {
            match three_way_merge(base, server_content, pushed_content) {
                Ok(MergeOutcome::Merged(merged)) => {
                    let rev = revision::generate(Some(&existing.rev));
                    db.upsert_document(&doc.id, vault_id, Some(&merged), &rev, false)
                        .await?;
                    debug!(doc_id = %doc.id, vault_id, rev = %rev, "bulk conflict auto-merged");
                    return Ok(BulkDocResult {
                        merged: Some(true),
                        ..BulkDocResult::ok(&doc.id, rev)
                    });
                }
                Ok(MergeOutcome::Conflicts(regions)) => {
                    return Ok(conflict_result(
                        doc,
                        existing,
                        CONFLICT_REASON,
                        Some(regions),
                        false,
                    ));
                }
                Err(e) => {
                    // Size caps: not mergeable, hand it to a human.
                    return Ok(conflict_result(doc, existing, &e.to_string(), None, false));
                }
            }
        }
    }

    if base_unlocatable {
        Ok(conflict_result(
            doc,
            existing,
            "base_revision_not_found",
            None,
            true,
        ))
    } else {
        Ok(conflict_result(doc, existing, CONFLICT_REASON, None, false))
    }
}

fn conflict_result(
    doc: &BulkDocInput,
    existing: &DocumentRow,
    reason: &str,
    conflicts: Option<Vec<common::ConflictRegion>>,
    requires_full_sync: bool,
) -> BulkDocResult {
    BulkDocResult {
        id: doc.id.clone(),
        error: Some("conflict".to_owned()),
        reason: Some(reason.to_owned()),
        current_rev: Some(existing.rev.clone()),
        current_content: existing.content.clone(),
        current_deleted: existing.deleted.then_some(true),
        conflicts,
        requires_full_sync: requires_full_sync.then_some(true),
        ..Default::default()
    }
}
