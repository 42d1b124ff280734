//! Fixed-delay scheduling for pollers.
//!
//! A [`PollTask`] does one unit of work per cycle. [`run_poll_loop`] runs it
//! forever, sleeping for the task's delay after each cycle. Non-fatal errors
//! are logged and the cycle is retried after the delay. Cancellation is
//! checked before every cycle and raced against both the work and the sleep.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::PollError;

#[async_trait]
pub trait PollTask: Send {
    /// Name used in log lines.
    fn name(&self) -> &str;

    /// Pause between the end of one cycle and the start of the next.
    fn delay(&self) -> Duration;

    /// Run one cycle.
    ///
    /// The returned future may be dropped at any await point when the loop is
    /// cancelled, so state changes must not straddle an await.
    async fn poll_once(&mut self) -> Result<(), PollError>;
}

/// Drive `task` until `shutdown` fires or the task reports a fatal error.
pub async fn run_poll_loop<T: PollTask>(mut task: T, shutdown: CancellationToken) -> Result<(), PollError> {
    info!(
        task = task.name(),
        delay_secs = task.delay().as_secs_f64(),
        "poller started"
    );

    loop {
        if shutdown.is_cancelled() {
            break;
        }

        let outcome = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            r = task.poll_once() => r,
        };

        if let Err(e) = outcome {
            if e.is_fatal() {
                error!(task = task.name(), error = %e, "poller stopping on invariant violation");
                return Err(e);
            }
            warn!(task = task.name(), error = %e, "poll cycle failed; retrying after delay");
        }

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(task.delay()) => {}
        }
    }

    info!(task = task.name(), "poller stopped");
    Ok(())
}
