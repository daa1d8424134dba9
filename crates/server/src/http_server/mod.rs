//! HTTP surface: one router with a public face (health, attachment bytes,
//! key issuance) and a bearer-gated API for everything else.

pub mod api;
pub mod auth;
pub mod health;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Router};
use http::header::{HeaderName, CONTENT_TYPE};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::State;

use api::attachments::MAX_ATTACHMENT_BYTES;

pub fn router(state: State) -> Router {
    let public = Router::new()
        .route("/", get(health::handler))
        .route(
            "/api/attachments/:id/content",
            get(api::attachments::content::handler),
        )
        // Bearer-free by design: an upstream proxy gates key issuance.
        .route("/api/auth/new", post(api::auth_new::handler));

    let protected = Router::new()
        .route("/api/status", get(api::status::handler))
        .route("/api/changes", get(api::changes::handler))
        .route("/api/docs/bulk_docs", post(api::docs::bulk::handler))
        .route("/api/_bulk_docs", post(api::docs::bulk::handler))
        .route(
            "/api/docs/:id",
            get(api::docs::get_doc::handler)
                .put(api::docs::put::handler)
                .delete(api::docs::delete_doc::handler),
        )
        .route(
            "/api/attachments/changes",
            get(api::attachments::changes::handler),
        )
        .route(
            "/api/attachments/:id",
            get(api::attachments::get_meta::handler)
                .put(api::attachments::upload::handler)
                .delete(api::attachments::delete_attachment::handler),
        )
        .route("/api/admin/stats", get(api::admin::stats::handler))
        .route("/api/admin/cleanup", post(api::admin::cleanup::handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    public
        .merge(protected)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_ATTACHMENT_BYTES + 1024 * 1024))
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            CONTENT_TYPE,
            HeaderName::from_static("x-content-hash"),
            HeaderName::from_static("x-content-length"),
            HeaderName::from_static("x-attachment-hash"),
        ])
}
