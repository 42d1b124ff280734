//! Writing in-memory store and cursor state to disk from async code.
//!
//! The file writes run on the blocking pool. A write that has started
//! finishes even if the awaiting poll cycle is cancelled.

use std::sync::Arc;

use buildwatch_storage::{CursorRegistry, RevisionStore, StorageError};

/// Persist the given revisions.
pub async fn persist_revisions(
    store: &Arc<RevisionStore>,
    commits: Vec<String>,
) -> Result<(), StorageError> {
    if commits.is_empty() {
        return Ok(());
    }
    let store = store.clone();
    tokio::task::spawn_blocking(move || commits.iter().try_for_each(|c| store.persist(c)))
        .await
        .map_err(|e| StorageError::Io(e.into()))?
}

/// Persist a consumed build: the revision it touched first, then the
/// builder's cursor. A crash between the two leaves the cursor behind, so
/// the build is fetched again rather than lost.
pub async fn persist_consumed_build(
    store: &Arc<RevisionStore>,
    commit: Option<String>,
    cursors: &Arc<CursorRegistry>,
    builder: &str,
) -> Result<(), StorageError> {
    let store = store.clone();
    let cursors = cursors.clone();
    let builder = builder.to_string();
    tokio::task::spawn_blocking(move || {
        if let Some(commit) = &commit {
            store.persist(commit)?;
        }
        cursors.persist(&builder)
    })
    .await
    .map_err(|e| StorageError::Io(e.into()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildwatch_core::{BuilderResult, BuilderStatus};
    use chrono::Utc;

    #[tokio::test]
    async fn test_consumed_build_reaches_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RevisionStore::open(dir.path().join("revisions")).unwrap());
        let cursors = Arc::new(CursorRegistry::open(dir.path().join("cursors")).unwrap());
        store.merge(BuilderResult {
            builder_name: "clang".into(),
            commit_hash: "abc".into(),
            timestamp: Utc::now(),
            status: BuilderStatus::Passed,
            logs: Vec::new(),
        });
        cursors.register("clang", 7);

        persist_consumed_build(&store, Some("abc".into()), &cursors, "clang")
            .await
            .unwrap();

        let store = RevisionStore::open(dir.path().join("revisions")).unwrap();
        let cursors = CursorRegistry::open(dir.path().join("cursors")).unwrap();
        assert_eq!(store.get("abc").unwrap().status(), BuilderStatus::Passed);
        assert_eq!(cursors.read("clang"), Some(7));
    }

    #[tokio::test]
    async fn test_persist_nothing_is_ok() {
        let store = Arc::new(RevisionStore::new());
        persist_revisions(&store, Vec::new()).await.unwrap();
    }
}
