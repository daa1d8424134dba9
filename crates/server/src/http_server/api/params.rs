//! Query-parameter envelopes shared by the feed-shaped endpoints.

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use common::protocol::ErrorBody;

pub const DEFAULT_VAULT: &str = "default";

/// `?vault_id=` with its default.
#[derive(Debug, Deserialize)]
pub struct VaultQuery {
    pub vault_id: Option<String>,
}

impl VaultQuery {
    pub fn vault_id(&self) -> &str {
        self.vault_id.as_deref().unwrap_or(DEFAULT_VAULT)
    }
}

/// `?since=&limit=&vault_id=` for the two change feeds.
#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub since: Option<i64>,
    pub limit: Option<i64>,
    pub vault_id: Option<String>,
}

impl FeedQuery {
    /// Apply defaults and bounds: `since >= 0`, `1 <= limit <= 1000`.
    pub fn validate(&self) -> Result<(i64, i64, &str), ParamError> {
        let since = self.since.unwrap_or(0);
        if since < 0 {
            return Err(ParamError::new("since must be >= 0"));
        }
        let limit = self.limit.unwrap_or(100);
        if !(1..=1000).contains(&limit) {
            return Err(ParamError::new("limit must be between 1 and 1000"));
        }
        Ok((since, limit, self.vault_id.as_deref().unwrap_or(DEFAULT_VAULT)))
    }
}

/// A 400 with a JSON body naming the offending parameter.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ParamError(String);

impl ParamError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

impl IntoResponse for ParamError {
    fn into_response(self) -> Response {
        (
            http::StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "bad_request".to_owned(),
                reason: Some(self.0),
            }),
        )
            .into_response()
    }
}
