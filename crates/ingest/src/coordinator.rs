use std::sync::Arc;
use std::time::Duration;

use buildwatch_core::{BuilderSpec, BuildwatchError};
use buildwatch_storage::{CursorRegistry, RevisionStore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::builder_poller::BuilderPoller;
use crate::commit_poller::CommitPoller;
use crate::error::PollError;
use crate::schedule::{run_poll_loop, PollTask};
use crate::source::{BuilderFeed, CommitSource};

type PollerExit = (String, Result<(), PollError>);

/// Owns the poller tasks and the token that stops them.
///
/// Every poller writes through the shared [`RevisionStore`] and
/// [`CursorRegistry`]; the coordinator itself never touches revisions.
pub struct IngestionCoordinator {
    store: Arc<RevisionStore>,
    cursors: Arc<CursorRegistry>,
    shutdown: CancellationToken,
    tasks: JoinSet<PollerExit>,
}

impl IngestionCoordinator {
    pub fn new(store: Arc<RevisionStore>, cursors: Arc<CursorRegistry>) -> Self {
        Self {
            store,
            cursors,
            shutdown: CancellationToken::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Token that stops every poller when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Number of poller tasks that have not been reaped yet.
    pub fn running(&self) -> usize {
        self.tasks.len()
    }

    /// Start one commit poller and one poller per configured builder.
    pub fn start(
        &mut self,
        commits: Arc<dyn CommitSource>,
        commit_delay: Duration,
        feed: Arc<dyn BuilderFeed>,
        builders: &[BuilderSpec],
    ) -> Result<(), BuildwatchError> {
        if builders.is_empty() {
            return Err(BuildwatchError::Config(
                "ingestion needs at least one builder".into(),
            ));
        }
        self.spawn_commit_poller(commits, commit_delay);
        for spec in builders {
            self.spawn_builder_poller(spec, feed.clone());
        }
        info!(builders = builders.len(), "ingestion started");
        Ok(())
    }

    pub fn spawn_commit_poller(&mut self, source: Arc<dyn CommitSource>, delay: Duration) {
        let poller = CommitPoller::new(source, self.store.clone(), delay);
        self.spawn_task(poller);
    }

    pub fn spawn_builder_poller(&mut self, spec: &BuilderSpec, feed: Arc<dyn BuilderFeed>) {
        let poller = BuilderPoller::new(spec, feed, self.store.clone(), self.cursors.clone());
        debug!(builder = %spec.name, next_index = poller.next_index(), "builder poller created");
        self.spawn_task(poller);
    }

    /// Run any [`PollTask`] under this coordinator's shutdown token.
    pub fn spawn_task<T: PollTask + 'static>(&mut self, task: T) {
        let name = task.name().to_string();
        let token = self.shutdown.child_token();
        self.tasks.spawn(async move {
            let result = run_poll_loop(task, token).await;
            (name, result)
        });
    }

    /// Reap pollers as they exit until shutdown is requested, then stop the
    /// rest, waiting at most `shutdown_timeout` before aborting them.
    pub async fn run(mut self, shutdown_timeout: Duration) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    log_exit(joined);
                }
            }
        }
        self.drain(shutdown_timeout).await;
    }

    async fn drain(&mut self, timeout: Duration) {
        info!(running = self.tasks.len(), timeout = ?timeout, "stopping pollers");
        let tasks = &mut self.tasks;
        let drained = tokio::time::timeout(timeout, async {
            while let Some(joined) = tasks.join_next().await {
                log_exit(joined);
            }
        })
        .await;

        if drained.is_err() {
            warn!(remaining = self.tasks.len(), "pollers did not stop in time, aborting");
            self.tasks.abort_all();
            while self.tasks.join_next().await.is_some() {}
        }
        info!("ingestion stopped");
    }
}

fn log_exit(joined: Result<PollerExit, JoinError>) {
    match joined {
        Ok((name, Ok(()))) => debug!(poller = %name, "poller exited"),
        Ok((name, Err(e))) => error!(poller = %name, error = %e, "poller terminated"),
        Err(e) if e.is_cancelled() => debug!("poller aborted"),
        Err(e) => error!(error = %e, "poller panicked"),
    }
}
