//! Raw attachment bytes. Public so documents can embed direct links.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use http::header::CONTENT_TYPE;

use crate::blobs::BlobsError;
use crate::http_server::api::VaultQuery;

use super::{id_belongs_to_vault, X_ATTACHMENT_HASH};

pub async fn handler(
    State(state): State<crate::State>,
    Path(id): Path<String>,
    Query(query): Query<VaultQuery>,
) -> Result<Response, ContentError> {
    let vault_id = query.vault_id();
    if !id_belongs_to_vault(&id, vault_id) {
        return Err(ContentError::WrongVault);
    }

    let meta = state
        .database()
        .get_attachment(&id, vault_id)
        .await?
        .filter(|row| !row.deleted)
        .ok_or(ContentError::NotFound)?;

    let bytes = state
        .blobs()
        .get(&meta.object_key)
        .await?
        .ok_or(ContentError::NotFound)?;

    Ok((
        [
            (CONTENT_TYPE, meta.content_type),
            (
                http::HeaderName::from_static(X_ATTACHMENT_HASH),
                meta.hash,
            ),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("attachment does not belong to this vault")]
    WrongVault,
    #[error("attachment not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("blob store error: {0}")]
    Blobs(#[from] BlobsError),
}

impl IntoResponse for ContentError {
    fn into_response(self) -> Response {
        let status = match &self {
            ContentError::WrongVault => http::StatusCode::FORBIDDEN,
            ContentError::NotFound => http::StatusCode::NOT_FOUND,
            ContentError::Database(_) | ContentError::Blobs(_) => {
                http::StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, format!("{self}")).into_response()
    }
}
