use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use buildwatch_core::BuilderCursor;

use crate::state::AppState;

/// `GET /builders`: last consumed build index per builder.
pub async fn list_builders(State(state): State<Arc<AppState>>) -> Json<Vec<BuilderCursor>> {
    Json(state.cursors.snapshot())
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{app, body_json, get};

    #[tokio::test]
    async fn test_lists_cursors_by_name() {
        let (router, state) = app();
        state.cursors.register("windows", 12);
        state.cursors.register("linux", 4);
        state.cursors.advance("linux", 5).unwrap();

        let json = body_json(get(router, "/builders").await).await;
        assert_eq!(json[0]["builder_name"], "linux");
        assert_eq!(json[0]["last_consumed_index"], 5);
        assert_eq!(json[1]["builder_name"], "windows");
    }
}
