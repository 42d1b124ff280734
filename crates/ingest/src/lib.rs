pub mod builder_poller;
pub mod checkpoint;
pub mod commit_poller;
pub mod coordinator;
pub mod error;
pub mod payload;
pub mod schedule;
pub mod source;

#[cfg(test)]
mod testing;

pub use builder_poller::BuilderPoller;
pub use commit_poller::CommitPoller;
pub use coordinator::IngestionCoordinator;
pub use error::{PayloadError, PollError, SourceError};
pub use schedule::{run_poll_loop, PollTask};
pub use source::{BuildbotFeed, BuilderFeed, CommitSource, FeedEntry, GithubCommitSource};
