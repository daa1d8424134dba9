use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;

use common::protocol::AdminStatsResponse;

pub async fn handler(
    State(state): State<crate::State>,
) -> Result<impl IntoResponse, StatsError> {
    let db = state.database();
    let (last_seq, last_attachment_seq) = db.global_seq_tips().await?;

    Ok(Json(AdminStatsResponse {
        ok: true,
        documents: db.count_documents().await?,
        revisions: db.count_revisions().await?,
        changes: db.count_changes().await?,
        attachments: db.count_attachments().await?,
        last_seq,
        last_attachment_seq,
    }))
}

#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for StatsError {
    fn into_response(self) -> Response {
        (
            http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("stats error: {self}"),
        )
            .into_response()
    }
}
