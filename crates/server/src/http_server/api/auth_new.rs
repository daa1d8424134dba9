//! Mint a new bearer key. Mounted outside the auth layer; deployments gate
//! it at the proxy.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

use common::protocol::NewKeyResponse;

pub async fn handler(
    State(state): State<crate::State>,
) -> Result<impl IntoResponse, NewKeyError> {
    let mut raw = [0u8; 32];
    rand::rng().fill_bytes(&mut raw);
    let key = URL_SAFE_NO_PAD.encode(raw);

    state.database().insert_api_key(&key, None).await?;
    tracing::info!("issued new api key");

    Ok(Json(NewKeyResponse { ok: true, key }))
}

#[derive(Debug, thiserror::Error)]
pub enum NewKeyError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for NewKeyError {
    fn into_response(self) -> Response {
        (
            http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("key issuance error: {self}"),
        )
            .into_response()
    }
}
