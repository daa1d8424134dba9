//! Bearer authentication layer for the protected API routes.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::header::AUTHORIZATION;

use common::protocol::ErrorBody;

pub async fn require_bearer(
    State(state): State<crate::State>,
    request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match token {
        Some(token) if state.is_authorized(token).await => next.run(request).await,
        _ => (
            http::StatusCode::UNAUTHORIZED,
            Json(ErrorBody {
                error: "unauthorized".to_owned(),
                reason: Some("missing or invalid bearer token".to_owned()),
            }),
        )
            .into_response(),
    }
}
