use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::{aggregate, BuilderStatus};

/// One `(type, link)` entry from a build's log list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildLog {
    #[serde(rename = "type")]
    pub log_type: String,
    pub link: String,
}

impl BuildLog {
    pub fn new(log_type: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            log_type: log_type.into(),
            link: link.into(),
        }
    }
}

/// Outcome of one builder run against one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderResult {
    pub builder_name: String,
    pub commit_hash: String,
    pub timestamp: DateTime<Utc>,
    pub status: BuilderStatus,
    #[serde(default)]
    pub logs: Vec<BuildLog>,
}

/// A pushed commit as reported by the commit feed or the push webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub commit_hash: String,
    pub timestamp: DateTime<Utc>,
    pub branch: String,
}

/// Last build index consumed from one builder's feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderCursor {
    pub builder_name: String,
    pub last_consumed_index: u64,
}

/// Aggregate record for one commit and every builder result seen for it.
///
/// Identity, timestamp and branch never change after construction. Results
/// are append-only and `status` is recomputed on each append, so it always
/// agrees with `builders`.
///
/// A stub is a revision first seen through a builder result: its timestamp
/// and branch stay unknown for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    commit_hash: String,
    timestamp: Option<DateTime<Utc>>,
    branch: Option<String>,
    builders: Vec<BuilderResult>,
    status: BuilderStatus,
}

impl Revision {
    pub fn new(commit: &CommitRecord) -> Self {
        Self {
            commit_hash: commit.commit_hash.clone(),
            timestamp: Some(commit.timestamp),
            branch: Some(commit.branch.clone()),
            builders: Vec::new(),
            status: BuilderStatus::Lost,
        }
    }

    pub fn stub(commit_hash: impl Into<String>) -> Self {
        Self {
            commit_hash: commit_hash.into(),
            timestamp: None,
            branch: None,
            builders: Vec::new(),
            status: BuilderStatus::Lost,
        }
    }

    pub fn commit_hash(&self) -> &str {
        &self.commit_hash
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub fn builders(&self) -> &[BuilderResult] {
        &self.builders
    }

    pub fn status(&self) -> BuilderStatus {
        self.status
    }

    pub fn is_stub(&self) -> bool {
        self.timestamp.is_none()
    }

    /// Timestamp of the newest builder result, if any.
    pub fn last_result_at(&self) -> Option<DateTime<Utc>> {
        self.builders.iter().map(|b| b.timestamp).max()
    }

    /// Attach a builder result and recompute the aggregate status.
    pub fn append(&mut self, result: BuilderResult) -> BuilderStatus {
        self.builders.push(result);
        self.status = aggregate(self.builders.iter().map(|b| b.status));
        self.status
    }
}
