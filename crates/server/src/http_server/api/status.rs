//! Cursor tips for one vault. Cheap enough for clients to poll before
//! deciding whether a sync run is worth starting.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use common::protocol::StatusResponse;

use super::VaultQuery;

pub async fn handler(
    State(state): State<crate::State>,
    Query(query): Query<VaultQuery>,
) -> Result<impl IntoResponse, StatusError> {
    let vault_id = query.vault_id();
    let last_seq = state.database().latest_doc_seq(vault_id).await?;
    let last_attachment_seq = state.database().latest_attachment_seq(vault_id).await?;

    Ok(Json(StatusResponse {
        ok: true,
        vault_id: vault_id.to_owned(),
        last_seq,
        last_attachment_seq,
    }))
}

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for StatusError {
    fn into_response(self) -> Response {
        (
            http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("status error: {self}"),
        )
            .into_response()
    }
}
