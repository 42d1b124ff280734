//! HTTP router construction.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use crate::api;
use crate::state::AppState;

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>, cors_origin: &str) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/revisions", get(api::list_revisions))
        .route("/revisions/{commit_hash}", get(api::get_revision))
        .route("/builders", get(api::list_builders))
        .route("/github-info", post(api::github_push))
        .layer(cors_layer(cors_origin))
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::permissive();
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => CorsLayer::permissive().allow_origin(AllowOrigin::exact(value)),
        Err(e) => {
            warn!(origin, error = %e, "invalid CORS_ORIGIN, allowing any origin");
            CorsLayer::permissive()
        }
    }
}
