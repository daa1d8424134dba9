use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use common::protocol::{PutConflictResponse, PutDocRequest, PutDocResponse};
use common::revision;

use crate::http_server::api::VaultQuery;

/// Conflict-checked write of one document. A matching (or absent, for a new
/// document) `_rev` advances the revision; a stale `_rev` is refused with
/// the current state so the client can force-push or adopt it.
pub async fn handler(
    State(state): State<crate::State>,
    Path(id): Path<String>,
    Query(query): Query<VaultQuery>,
    Json(request): Json<PutDocRequest>,
) -> Result<Response, PutDocError> {
    let vault_id = query.vault_id();
    let existing = state.database().get_document(&id, vault_id).await?;

    if let Some(existing) = &existing {
        let provided = request.rev.as_deref();
        if provided != Some(existing.rev.as_str()) {
            return Ok((
                http::StatusCode::CONFLICT,
                Json(PutConflictResponse {
                    error: "conflict".to_owned(),
                    reason: "Document update conflict".to_owned(),
                    current_rev: existing.rev.clone(),
                    provided_rev: provided.map(str::to_owned),
                }),
            )
                .into_response());
        }
    }

    let rev = revision::generate(existing.as_ref().map(|d| d.rev.as_str()));
    state
        .database()
        .upsert_document(&id, vault_id, request.content.as_deref(), &rev, false)
        .await?;

    tracing::debug!(doc_id = %id, vault_id, rev = %rev, "document stored");

    Ok(Json(PutDocResponse { ok: true, id, rev }).into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum PutDocError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for PutDocError {
    fn into_response(self) -> Response {
        (
            http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("doc put error: {self}"),
        )
            .into_response()
    }
}
