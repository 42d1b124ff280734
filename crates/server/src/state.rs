use std::sync::Arc;

use buildwatch_storage::{CursorRegistry, RevisionStore};

pub struct AppState {
    pub store: Arc<RevisionStore>,
    pub cursors: Arc<CursorRegistry>,
}

impl AppState {
    pub fn new(store: Arc<RevisionStore>, cursors: Arc<CursorRegistry>) -> Self {
        Self { store, cursors }
    }
}
