//! Document change feed: rows with `seq > since`, ascending, batched.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use common::protocol::{ChangeRev, ChangesResponse, DocChange};

use super::{FeedQuery, ParamError};

pub async fn handler(
    State(state): State<crate::State>,
    Query(query): Query<FeedQuery>,
) -> Result<impl IntoResponse, ChangesError> {
    let (since, limit, vault_id) = query.validate()?;

    let (rows, last_seq) = state.database().get_changes(vault_id, since, limit).await?;

    let results = rows
        .into_iter()
        .map(|row| DocChange {
            seq: row.seq,
            id: row.doc_id,
            changes: vec![ChangeRev { rev: row.rev }],
            deleted: row.deleted.then_some(true),
        })
        .collect();

    Ok(Json(ChangesResponse { results, last_seq }))
}

#[derive(Debug, thiserror::Error)]
pub enum ChangesError {
    #[error("invalid parameter")]
    Param(#[from] ParamError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for ChangesError {
    fn into_response(self) -> Response {
        match self {
            ChangesError::Param(e) => e.into_response(),
            ChangesError::Database(e) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("changes error: {e}"),
            )
                .into_response(),
        }
    }
}
