use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use common::protocol::{ErrorBody, PutConflictResponse, PutDocResponse};
use common::revision;

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub vault_id: Option<String>,
    pub rev: Option<String>,
}

/// Soft delete, conflict-checked by `rev`.
pub async fn handler(
    State(state): State<crate::State>,
    Path(id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> Result<Response, DeleteDocError> {
    let vault_id = query.vault_id.as_deref().unwrap_or("default");

    let Some(rev) = query.rev.as_deref() else {
        return Ok((
            http::StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "bad_request".to_owned(),
                reason: Some("rev query parameter is required".to_owned()),
            }),
        )
            .into_response());
    };

    let Some(existing) = state.database().get_document(&id, vault_id).await? else {
        return Ok((
            http::StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "not_found".to_owned(),
                reason: Some(format!("no document: {id}")),
            }),
        )
            .into_response());
    };

    if existing.rev != rev {
        return Ok((
            http::StatusCode::CONFLICT,
            Json(PutConflictResponse {
                error: "conflict".to_owned(),
                reason: "Document update conflict".to_owned(),
                current_rev: existing.rev,
                provided_rev: Some(rev.to_owned()),
            }),
        )
            .into_response());
    }

    let next_rev = revision::generate(Some(&existing.rev));
    state
        .database()
        .delete_document(&id, vault_id, &next_rev)
        .await?;

    tracing::debug!(doc_id = %id, vault_id, rev = %next_rev, "document tombstoned");

    Ok(Json(PutDocResponse {
        ok: true,
        id,
        rev: next_rev,
    })
    .into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteDocError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for DeleteDocError {
    fn into_response(self) -> Response {
        (
            http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("doc delete error: {self}"),
        )
            .into_response()
    }
}
