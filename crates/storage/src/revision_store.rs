use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use buildwatch_core::{BuilderResult, BuilderStatus, CommitRecord, Revision};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::error::StorageError;
use crate::files;

/// What a merge did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    /// The commit was unknown and a stub revision was created for it.
    pub stub_created: bool,
    /// Aggregate status after the append.
    pub status: BuilderStatus,
}

/// Keyed store of revisions, one per commit hash.
///
/// Writes to the same key are serialized by the shard lock held for the whole
/// read-modify-write of `create`/`merge`; writes to different keys only
/// contend when they hash to the same shard.
///
/// Mutations only touch memory. A store opened on a directory keeps one
/// `{dir}/{commit_hash}.json` per revision, written by [`RevisionStore::persist`]
/// (blocking; async callers run it on the blocking pool).
#[derive(Debug, Default)]
pub struct RevisionStore {
    revisions: DashMap<String, Revision>,
    dir: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl RevisionStore {
    /// A store that forgets everything on drop.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or create) a file-backed store and load every persisted revision.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        let revisions: DashMap<String, Revision> = files::load_dir::<Revision>(&dir)?
            .into_iter()
            .map(|r| (r.commit_hash().to_string(), r))
            .collect();

        info!(dir = %dir.display(), count = revisions.len(), "Revision store opened");
        Ok(Self {
            revisions,
            dir: Some(dir),
            write_lock: Mutex::new(()),
        })
    }

    /// Insert a revision for a newly seen commit. Returns `false` and leaves
    /// the store untouched if the commit is already present (stubs included).
    pub fn create(&self, commit: &CommitRecord) -> bool {
        match self.revisions.entry(commit.commit_hash.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Revision::new(commit));
                true
            }
        }
    }

    /// Append a builder result to its commit's revision, creating a stub
    /// revision when the commit has not been seen yet.
    pub fn merge(&self, result: BuilderResult) -> MergeOutcome {
        match self.revisions.entry(result.commit_hash.clone()) {
            Entry::Occupied(mut slot) => MergeOutcome {
                stub_created: false,
                status: slot.get_mut().append(result),
            },
            Entry::Vacant(slot) => {
                debug!(commit = %result.commit_hash, "Creating stub revision");
                let mut revision = Revision::stub(result.commit_hash.clone());
                let status = revision.append(result);
                slot.insert(revision);
                MergeOutcome {
                    stub_created: true,
                    status,
                }
            }
        }
    }

    pub fn get(&self, commit_hash: &str) -> Option<Revision> {
        self.revisions.get(commit_hash).map(|r| r.value().clone())
    }

    /// Remove a revision from memory. Call [`RevisionStore::persist`] to
    /// drop its file.
    pub fn delete(&self, commit_hash: &str) -> bool {
        self.revisions.remove(commit_hash).is_some()
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    /// Newest-first page of revisions. Stubs sort after every timestamped
    /// revision; equal timestamps are ordered by commit hash.
    pub fn list_descending(&self, limit: usize, offset: usize) -> Vec<Revision> {
        let mut keys: Vec<(Option<DateTime<Utc>>, String)> = self
            .revisions
            .iter()
            .map(|r| (r.timestamp(), r.key().clone()))
            .collect();
        keys.sort_by(newest_first);
        keys.into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|(_, hash)| self.get(&hash))
            .collect()
    }

    /// Drop every revision last active before `cutoff`: timestamped
    /// revisions by push time, stubs by their newest builder result.
    /// Files of removed revisions are deleted too. Returns the number removed.
    pub fn prune_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = Vec::new();
        self.revisions.retain(|hash, rev| match activity_time(rev) {
            Some(ts) if ts < cutoff => {
                removed.push(hash.clone());
                false
            }
            _ => true,
        });
        for hash in &removed {
            if let Err(e) = self.persist(hash) {
                warn!(commit = %hash, error = %e, "Pruned revision file not removed");
            }
        }
        removed.len()
    }

    /// Bring the revision's file in line with memory: write it, or remove it
    /// when the revision is gone. No-op for an in-memory store.
    ///
    /// Writes are serialized and each one reads the revision after taking the
    /// write lock, so concurrent merges into one commit cannot leave an older
    /// snapshot on disk.
    pub fn persist(&self, commit_hash: &str) -> Result<(), StorageError> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let path = files::entry_path(dir, commit_hash);
        match self.get(commit_hash) {
            Some(revision) => files::write_atomic(&path, &revision),
            None => files::remove_if_present(&path),
        }
    }
}

fn activity_time(rev: &Revision) -> Option<DateTime<Utc>> {
    rev.timestamp().or_else(|| rev.last_result_at())
}

fn newest_first(a: &(Option<DateTime<Utc>>, String), b: &(Option<DateTime<Utc>>, String)) -> Ordering {
    match (a.0, b.0) {
        (Some(ta), Some(tb)) => tb.cmp(&ta),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.1.cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn commit(hash: &str, hour: u32) -> CommitRecord {
        CommitRecord {
            commit_hash: hash.into(),
            timestamp: at(hour),
            branch: "main".into(),
        }
    }

    fn result(builder: &str, hash: &str, status: BuilderStatus) -> BuilderResult {
        BuilderResult {
            builder_name: builder.into(),
            commit_hash: hash.into(),
            timestamp: at(12),
            status,
            logs: Vec::new(),
        }
    }

    #[test]
    fn test_create_is_idempotent() {
        let store = RevisionStore::new();
        assert!(store.create(&commit("abc", 1)));
        store.merge(result("b1", "abc", BuilderStatus::Passed));

        let mut later = commit("abc", 5);
        later.branch = "other".into();
        assert!(!store.create(&later));

        let rev = store.get("abc").unwrap();
        assert_eq!(rev.timestamp(), Some(at(1)));
        assert_eq!(rev.branch(), Some("main"));
        assert_eq!(rev.builders().len(), 1);
    }

    #[test]
    fn test_new_revision_starts_lost() {
        let store = RevisionStore::new();
        store.create(&commit("abc", 1));
        let rev = store.get("abc").unwrap();
        assert_eq!(rev.status(), BuilderStatus::Lost);
        assert!(rev.builders().is_empty());
    }

    #[test]
    fn test_merge_unknown_commit_creates_stub_that_create_keeps() {
        let store = RevisionStore::new();
        let outcome = store.merge(result("b1", "abc", BuilderStatus::Passed));
        assert!(outcome.stub_created);
        assert_eq!(outcome.status, BuilderStatus::Passed);

        assert!(!store.create(&commit("abc", 3)));
        let rev = store.get("abc").unwrap();
        assert!(rev.is_stub());
        assert_eq!(rev.branch(), None);
        assert_eq!(rev.builders().len(), 1);
    }

    #[test]
    fn test_merge_recomputes_status() {
        let store = RevisionStore::new();
        store.create(&commit("abc", 1));
        assert_eq!(store.merge(result("b1", "abc", BuilderStatus::Lost)).status, BuilderStatus::Lost);
        assert_eq!(store.merge(result("b2", "abc", BuilderStatus::Passed)).status, BuilderStatus::Passed);
        let outcome = store.merge(result("b3", "abc", BuilderStatus::Failed));
        assert!(!outcome.stub_created);
        assert_eq!(outcome.status, BuilderStatus::Failed);
        assert_eq!(store.get("abc").unwrap().status(), BuilderStatus::Failed);
    }

    #[test]
    fn test_get_missing() {
        assert!(RevisionStore::new().get("nope").is_none());
    }

    #[test]
    fn test_list_descending_pages() {
        let store = RevisionStore::new();
        for (hash, hour) in [("a", 1), ("b", 3), ("c", 2)] {
            store.create(&commit(hash, hour));
        }
        let hashes = |revs: Vec<Revision>| -> Vec<String> {
            revs.iter().map(|r| r.commit_hash().to_string()).collect()
        };
        assert_eq!(hashes(store.list_descending(10, 0)), ["b", "c", "a"]);
        assert_eq!(hashes(store.list_descending(1, 1)), ["c"]);
        assert!(store.list_descending(5, 10).is_empty());
    }

    #[test]
    fn test_list_fewer_than_requested() {
        let store = RevisionStore::new();
        store.create(&commit("only", 1));
        assert_eq!(store.list_descending(2, 0).len(), 1);
    }

    #[test]
    fn test_stubs_sort_last() {
        let store = RevisionStore::new();
        store.merge(result("b1", "stub", BuilderStatus::Passed));
        store.create(&commit("old", 1));
        store.create(&commit("new", 9));
        let revs = store.list_descending(10, 0);
        assert_eq!(revs[0].commit_hash(), "new");
        assert_eq!(revs[2].commit_hash(), "stub");
    }

    #[test]
    fn test_delete() {
        let store = RevisionStore::new();
        store.create(&commit("abc", 1));
        assert!(store.delete("abc"));
        assert!(!store.delete("abc"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_prune_keeps_recent_revisions_and_active_stubs() {
        let store = RevisionStore::new();
        store.create(&commit("old", 1));
        store.create(&commit("new", 10));
        // Result timestamped at hour 12.
        store.merge(result("b1", "stub", BuilderStatus::Lost));

        let removed = store.prune_older_than(at(5));
        assert_eq!(removed, 1);
        assert!(store.get("old").is_none());
        assert!(store.get("new").is_some());
        assert!(store.get("stub").is_some());
        assert_eq!(store.prune_older_than(at(10) - Duration::seconds(1)), 0);
    }

    #[test]
    fn test_prune_ages_stubs_by_newest_result() {
        let store = RevisionStore::new();
        let mut stale = result("b1", "stale", BuilderStatus::Passed);
        stale.timestamp = at(2);
        store.merge(stale);
        let mut early = result("b1", "busy", BuilderStatus::Passed);
        early.timestamp = at(1);
        store.merge(early);
        store.merge(result("b2", "busy", BuilderStatus::Failed));

        assert_eq!(store.prune_older_than(at(5)), 1);
        assert!(store.get("stale").is_none());
        assert!(store.get("busy").is_some());
    }

    #[test]
    fn test_revisions_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = RevisionStore::open(dir.path()).unwrap();
            store.create(&commit("abc", 1));
            store.merge(result("b1", "abc", BuilderStatus::Failed));
            store.merge(result("b1", "stub", BuilderStatus::Passed));
            store.persist("abc").unwrap();
            store.persist("stub").unwrap();
        }
        let store = RevisionStore::open(dir.path()).unwrap();
        assert_eq!(store.len(), 2);
        let rev = store.get("abc").unwrap();
        assert_eq!(rev.timestamp(), Some(at(1)));
        assert_eq!(rev.status(), BuilderStatus::Failed);
        assert!(store.get("stub").unwrap().is_stub());
    }

    #[test]
    fn test_persist_after_delete_and_prune_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = RevisionStore::open(dir.path()).unwrap();
            for (hash, hour) in [("gone", 1), ("old", 2), ("kept", 9)] {
                store.create(&commit(hash, hour));
                store.persist(hash).unwrap();
            }
            assert!(store.delete("gone"));
            store.persist("gone").unwrap();
            assert_eq!(store.prune_older_than(at(5)), 1);
        }
        let store = RevisionStore::open(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.get("kept").is_some());
    }

    #[test]
    fn test_persist_writes_latest_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = RevisionStore::open(dir.path()).unwrap();
        store.create(&commit("abc", 1));
        store.persist("abc").unwrap();
        store.merge(result("b1", "abc", BuilderStatus::Passed));
        store.persist("abc").unwrap();

        let reopened = RevisionStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get("abc").unwrap().builders().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_merges_are_not_lost() {
        let store = Arc::new(RevisionStore::new());
        let hashes = ["h0", "h1", "h2"];
        let mut handles = Vec::new();
        for builder in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    let hash = hashes[i % hashes.len()];
                    let status = if builder == 0 && hash == "h1" {
                        BuilderStatus::Failed
                    } else {
                        BuilderStatus::Passed
                    };
                    store.merge(result(&format!("b{builder}"), hash, status));
                    if i % 7 == 0 {
                        store.create(&commit(hash, 1));
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        // 8 builders * 50 merges spread round-robin over 3 hashes.
        let counts: Vec<usize> = hashes
            .iter()
            .map(|h| store.get(h).unwrap().builders().len())
            .collect();
        assert_eq!(counts.iter().sum::<usize>(), 400);
        assert_eq!(counts, [8 * 17, 8 * 17, 8 * 16]);
        assert_eq!(store.get("h0").unwrap().status(), BuilderStatus::Passed);
        assert_eq!(store.get("h1").unwrap().status(), BuilderStatus::Failed);
    }
}
