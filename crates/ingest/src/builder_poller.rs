use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use buildwatch_core::BuilderSpec;
use buildwatch_storage::{CursorRegistry, RevisionStore};
use tracing::{debug, info, warn};

use crate::checkpoint::persist_consumed_build;
use crate::error::PollError;
use crate::payload::parse_build;
use crate::schedule::PollTask;
use crate::source::{BuilderFeed, FeedEntry};

/// Walks one builder's feed index by index, merging each build into the
/// revision store and recording the consumed index in the cursor registry.
///
/// Merge and cursor update run back to back after the feed request with no
/// await between them, so a cancelled cycle applies both or neither. Both are
/// then written to disk, revision first.
pub struct BuilderPoller {
    builder: String,
    feed: Arc<dyn BuilderFeed>,
    store: Arc<RevisionStore>,
    cursors: Arc<CursorRegistry>,
    delay: Duration,
    next_index: u64,
}

impl BuilderPoller {
    /// Resume after the persisted cursor, or start at the configured initial
    /// build when this builder has never been polled.
    pub fn new(
        spec: &BuilderSpec,
        feed: Arc<dyn BuilderFeed>,
        store: Arc<RevisionStore>,
        cursors: Arc<CursorRegistry>,
    ) -> Self {
        let next_index = cursors
            .read(&spec.name)
            .map(|last| last + 1)
            .unwrap_or(spec.initial_build_id);
        Self {
            builder: spec.name.clone(),
            feed,
            store,
            cursors,
            delay: Duration::from_secs(spec.delay_secs),
            next_index,
        }
    }

    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    fn record_consumed(&self, index: u64) -> Result<(), PollError> {
        match self.cursors.read(&self.builder) {
            None => {
                self.cursors.register(&self.builder, index);
                Ok(())
            }
            Some(_) => Ok(self.cursors.advance(&self.builder, index)?),
        }
    }
}

#[async_trait]
impl PollTask for BuilderPoller {
    fn name(&self) -> &str {
        &self.builder
    }

    fn delay(&self) -> Duration {
        self.delay
    }

    async fn poll_once(&mut self) -> Result<(), PollError> {
        let index = self.next_index;
        let body = match self.feed.fetch(&self.builder, index).await? {
            FeedEntry::NotYetBuilt => {
                debug!(builder = %self.builder, index, "build not available yet");
                return Ok(());
            }
            FeedEntry::Present(body) => body,
        };

        let merged = match parse_build(&self.builder, &body) {
            Ok(result) => {
                let commit = result.commit_hash.clone();
                let build_status = result.status;
                let outcome = self.store.merge(result);
                info!(
                    builder = %self.builder,
                    index,
                    commit = %commit,
                    build_status = %build_status,
                    revision_status = %outcome.status,
                    stub_created = outcome.stub_created,
                    "build merged"
                );
                Some(commit)
            }
            Err(e) => {
                warn!(builder = %self.builder, index, error = %e, "skipping malformed build");
                None
            }
        };

        self.next_index = index + 1;
        let recorded = self.record_consumed(index);

        if let Err(e) = persist_consumed_build(&self.store, merged, &self.cursors, &self.builder).await {
            warn!(builder = %self.builder, index, error = %e, "consumed build not persisted");
        }
        recorded
    }
}
