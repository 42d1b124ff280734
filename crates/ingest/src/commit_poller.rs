use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use buildwatch_storage::RevisionStore;
use tracing::{debug, info, warn};

use crate::checkpoint::persist_revisions;
use crate::error::PollError;
use crate::schedule::PollTask;
use crate::source::CommitSource;

/// Creates a revision for every new commit reported by the commit feed.
pub struct CommitPoller {
    source: Arc<dyn CommitSource>,
    store: Arc<RevisionStore>,
    delay: Duration,
}

impl CommitPoller {
    pub fn new(source: Arc<dyn CommitSource>, store: Arc<RevisionStore>, delay: Duration) -> Self {
        Self { source, store, delay }
    }
}

#[async_trait]
impl PollTask for CommitPoller {
    fn name(&self) -> &str {
        "commits"
    }

    fn delay(&self) -> Duration {
        self.delay
    }

    async fn poll_once(&mut self) -> Result<(), PollError> {
        let commits = self.source.latest_commits().await?;
        let created: Vec<String> = commits
            .iter()
            .filter(|c| self.store.create(c))
            .map(|c| c.commit_hash.clone())
            .collect();
        if created.is_empty() {
            debug!(fetched = commits.len(), "no new commits");
            return Ok(());
        }

        info!(fetched = commits.len(), created = created.len(), "new revisions recorded");
        if let Err(e) = persist_revisions(&self.store, created).await {
            warn!(error = %e, "new revisions not persisted");
        }
        Ok(())
    }
}
