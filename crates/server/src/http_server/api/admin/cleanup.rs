//! Prune old revisions and change rows. Whatever is still a document's
//! latest state survives regardless of age.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::info;

use common::protocol::CleanupResponse;

use crate::http_server::api::ParamError;

#[derive(Debug, Deserialize)]
pub struct CleanupQuery {
    pub max_age_days: Option<i64>,
}

pub async fn handler(
    State(state): State<crate::State>,
    Query(query): Query<CleanupQuery>,
) -> Result<impl IntoResponse, CleanupError> {
    let days = query
        .max_age_days
        .ok_or_else(|| ParamError::new("max_age_days is required"))?;
    if !(1..=365).contains(&days) {
        return Err(ParamError::new("max_age_days must be between 1 and 365").into());
    }

    let cutoff = chrono::Utc::now().timestamp_millis() - days * 24 * 60 * 60 * 1000;
    let (revisions_deleted, changes_deleted) = state.database().cleanup(cutoff).await?;

    info!(days, revisions_deleted, changes_deleted, "cleanup finished");

    Ok(Json(CleanupResponse {
        ok: true,
        revisions_deleted,
        changes_deleted,
    }))
}

#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error("invalid parameter")]
    Param(#[from] ParamError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for CleanupError {
    fn into_response(self) -> Response {
        match self {
            CleanupError::Param(e) => e.into_response(),
            CleanupError::Database(e) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("cleanup error: {e}"),
            )
                .into_response(),
        }
    }
}
