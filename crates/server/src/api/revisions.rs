use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use buildwatch_core::Revision;
use serde::Deserialize;

use super::{api_error, ApiError};
use crate::state::AppState;

const DEFAULT_COUNT: i64 = 20;

#[derive(Deserialize)]
pub struct PageParams {
    pub count: Option<i64>,
    pub offset: Option<i64>,
}

/// `GET /revisions?count=&offset=`, newest first.
pub async fn list_revisions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<Revision>>, ApiError> {
    let count = params.count.unwrap_or(DEFAULT_COUNT);
    let offset = params.offset.unwrap_or(0);
    if count < 0 || offset < 0 {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("count and offset must be non-negative (got count={count}, offset={offset})"),
        ));
    }
    let page = state
        .store
        .list_descending(count as usize, offset as usize);
    Ok(Json(page))
}

/// `GET /revisions/{commit_hash}`
pub async fn get_revision(
    State(state): State<Arc<AppState>>,
    Path(commit_hash): Path<String>,
) -> Result<Json<Revision>, ApiError> {
    state
        .store
        .get(&commit_hash)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("unknown revision {commit_hash}")))
}
