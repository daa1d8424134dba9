//! Attachment change feed; mirrors the document feed shape.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use common::protocol::{AttachmentChange, AttachmentChangesResponse};

use crate::http_server::api::{FeedQuery, ParamError};

pub async fn handler(
    State(state): State<crate::State>,
    Query(query): Query<FeedQuery>,
) -> Result<impl IntoResponse, AttachmentChangesError> {
    let (since, limit, vault_id) = query.validate()?;

    let (rows, last_seq) = state
        .database()
        .get_attachment_changes(vault_id, since, limit)
        .await?;

    let results = rows
        .into_iter()
        .map(|row| AttachmentChange {
            seq: row.seq,
            id: row.attachment_id,
            path: row.path,
            hash: row.hash,
            deleted: row.deleted.then_some(true),
        })
        .collect();

    Ok(Json(AttachmentChangesResponse { results, last_seq }))
}

#[derive(Debug, thiserror::Error)]
pub enum AttachmentChangesError {
    #[error("invalid parameter")]
    Param(#[from] ParamError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for AttachmentChangesError {
    fn into_response(self) -> Response {
        match self {
            AttachmentChangesError::Param(e) => e.into_response(),
            AttachmentChangesError::Database(e) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("attachment changes error: {e}"),
            )
                .into_response(),
        }
    }
}
