//! Periodic removal of revisions older than the retention window.

use std::sync::Arc;
use std::time::Duration;

use buildwatch_storage::RevisionStore;
use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Remove every revision last active before `now - retention`. Blocks on
/// file removal for a persistent store.
pub fn sweep_once(store: &RevisionStore, retention: chrono::Duration, now: DateTime<Utc>) -> usize {
    let cutoff = now - retention;
    let removed = store.prune_older_than(cutoff);
    if removed > 0 {
        info!(removed, cutoff = %cutoff, "retention sweep removed revisions");
    } else {
        debug!(cutoff = %cutoff, "retention sweep found nothing to remove");
    }
    removed
}

pub async fn run_retention_sweeper(
    store: Arc<RevisionStore>,
    retention_days: u32,
    every: Duration,
    shutdown: CancellationToken,
) {
    let retention = chrono::Duration::days(i64::from(retention_days));
    info!(retention_days, interval_secs = every.as_secs(), "retention sweeper started");

    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let store = store.clone();
                let swept =
                    tokio::task::spawn_blocking(move || sweep_once(&store, retention, Utc::now())).await;
                if let Err(e) = swept {
                    warn!(error = %e, "retention sweep task failed");
                }
            }
        }
    }
    info!("retention sweeper stopped");
}
