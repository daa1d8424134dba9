use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use common::protocol::ErrorBody;

use crate::http_server::api::VaultQuery;

use super::id_belongs_to_vault;

pub async fn handler(
    State(state): State<crate::State>,
    Path(id): Path<String>,
    Query(query): Query<VaultQuery>,
) -> Result<Response, DeleteAttachmentError> {
    let vault_id = query.vault_id();
    if !id_belongs_to_vault(&id, vault_id) {
        return Err(DeleteAttachmentError::WrongVault);
    }

    if state
        .database()
        .soft_delete_attachment(&id, vault_id)
        .await?
    {
        tracing::debug!(id = %id, vault_id, "attachment soft-deleted");
        Ok(Json(serde_json::json!({ "ok": true, "id": id })).into_response())
    } else {
        Ok((
            http::StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "not_found".to_owned(),
                reason: Some(format!("no attachment: {id}")),
            }),
        )
            .into_response())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteAttachmentError {
    #[error("attachment does not belong to this vault")]
    WrongVault,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for DeleteAttachmentError {
    fn into_response(self) -> Response {
        match self {
            DeleteAttachmentError::WrongVault => {
                (http::StatusCode::FORBIDDEN, format!("{self}")).into_response()
            }
            DeleteAttachmentError::Database(e) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("attachment delete error: {e}"),
            )
                .into_response(),
        }
    }
}
