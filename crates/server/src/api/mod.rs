//! HTTP endpoints.
//!
//! Read-only views over the revision store and cursor registry, plus the
//! GitHub push receiver.

mod builders;
mod health;
mod revisions;
mod webhook;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

pub use builders::list_builders;
pub use health::health;
pub use revisions::{get_revision, list_revisions};
pub use webhook::github_push;

#[derive(Serialize)]
pub struct QueryErrorResponse {
    pub error: String,
}

pub(crate) type ApiError = (StatusCode, Json<QueryErrorResponse>);

pub(crate) fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(QueryErrorResponse {
            error: error.into(),
        }),
    )
}
