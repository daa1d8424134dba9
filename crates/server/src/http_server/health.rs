use axum::response::IntoResponse;
use axum::Json;

use common::protocol::HealthResponse;

pub async fn handler() -> impl IntoResponse {
    Json(HealthResponse {
        name: env!("CARGO_PKG_NAME").to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        status: "ok".to_owned(),
    })
}
