use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use buildwatch_ingest::checkpoint::persist_revisions;
use buildwatch_ingest::payload::parse_push_event;
use serde::Serialize;
use tracing::{info, warn};

use super::{api_error, ApiError};
use crate::state::AppState;

#[derive(Serialize)]
pub struct PushAccepted {
    pub commit_hash: String,
    pub created: bool,
}

/// `POST /github-info`: GitHub `push` webhook.
///
/// Records the head commit like the commit poller would. `ping` deliveries
/// are acknowledged without touching the store.
pub async fn github_push(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let event = headers
        .get("x-github-event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("push");
    if event == "ping" {
        return Ok((StatusCode::OK, Json(serde_json::json!({ "status": "pong" }))));
    }

    let commit = parse_push_event(&body).map_err(|e| {
        warn!(error = %e, "rejecting push webhook");
        api_error(StatusCode::BAD_REQUEST, e.to_string())
    })?;

    let created = state.store.create(&commit);
    if created {
        info!(commit = %commit.commit_hash, branch = %commit.branch, "revision recorded from push webhook");
        if let Err(e) = persist_revisions(&state.store, vec![commit.commit_hash.clone()]).await {
            warn!(commit = %commit.commit_hash, error = %e, "webhook revision not persisted");
        }
    }
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    let accepted = PushAccepted {
        commit_hash: commit.commit_hash,
        created,
    };
    Ok((status, Json(serde_json::json!(accepted))))
}
