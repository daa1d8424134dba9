use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use common::protocol::{AttachmentMeta, ErrorBody};

use crate::http_server::api::VaultQuery;

use super::id_belongs_to_vault;

pub async fn handler(
    State(state): State<crate::State>,
    Path(id): Path<String>,
    Query(query): Query<VaultQuery>,
) -> Result<Response, MetaError> {
    let vault_id = query.vault_id();
    if !id_belongs_to_vault(&id, vault_id) {
        return Err(MetaError::WrongVault);
    }

    match state.database().get_attachment(&id, vault_id).await? {
        Some(row) => Ok(Json(AttachmentMeta {
            id: row.id,
            path: row.path,
            content_type: row.content_type,
            size: row.size,
            hash: row.hash,
            deleted: row.deleted,
        })
        .into_response()),
        None => Ok((
            http::StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "not_found".to_owned(),
                reason: Some(format!("no attachment: {id}")),
            }),
        )
            .into_response()),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    #[error("attachment does not belong to this vault")]
    WrongVault,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for MetaError {
    fn into_response(self) -> Response {
        match self {
            MetaError::WrongVault => {
                (http::StatusCode::FORBIDDEN, format!("{self}")).into_response()
            }
            MetaError::Database(e) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("attachment meta error: {e}"),
            )
                .into_response(),
        }
    }
}
