use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use common::protocol::{DocBody, ErrorBody};

use crate::http_server::api::VaultQuery;

pub async fn handler(
    State(state): State<crate::State>,
    Path(id): Path<String>,
    Query(query): Query<VaultQuery>,
) -> Result<Response, GetDocError> {
    let vault_id = query.vault_id();

    match state.database().get_document(&id, vault_id).await? {
        Some(doc) => Ok(Json(DocBody {
            id: doc.doc_id,
            rev: doc.rev,
            content: doc.content,
            deleted: doc.deleted.then_some(true),
        })
        .into_response()),
        None => Ok((
            http::StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "not_found".to_owned(),
                reason: Some(format!("no document: {id}")),
            }),
        )
            .into_response()),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GetDocError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for GetDocError {
    fn into_response(self) -> Response {
        (
            http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("doc fetch error: {self}"),
        )
            .into_response()
    }
}
