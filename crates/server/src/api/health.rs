use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub revisions: usize,
    pub builders: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        revisions: state.store.len(),
        builders: state.cursors.len(),
    })
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use buildwatch_core::CommitRecord;
    use chrono::Utc;

    use crate::api::test_support::{app, body_json, get};

    #[tokio::test]
    async fn test_health_reports_counts() {
        let (router, state) = app();
        state.store.create(&CommitRecord {
            commit_hash: "abc".into(),
            timestamp: Utc::now(),
            branch: "main".into(),
        });
        state.cursors.register("clang", 3);

        let resp = get(router, "/health").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["revisions"], 1);
        assert_eq!(json["builders"], 1);
    }
}
