use async_trait::async_trait;
use buildwatch_core::CommitRecord;

use crate::error::SourceError;

/// Feed of newly pushed commits.
#[async_trait]
pub trait CommitSource: Send + Sync {
    /// Newest commits, already parsed. Malformed records are dropped by the
    /// source and never reach the caller.
    async fn latest_commits(&self) -> Result<Vec<CommitRecord>, SourceError>;
}

/// What a builder feed holds at one build index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEntry {
    NotYetBuilt,
    /// Raw build document, parsed by the poller.
    Present(String),
}

/// Per-builder sequence of numbered builds.
#[async_trait]
pub trait BuilderFeed: Send + Sync {
    async fn fetch(&self, builder: &str, index: u64) -> Result<FeedEntry, SourceError>;
}
