use async_trait::async_trait;
use buildwatch_core::config::GithubConfig;
use buildwatch_core::CommitRecord;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use tracing::debug;

use super::traits::CommitSource;
use crate::error::SourceError;
use crate::payload::parse_commit_listing;

/// Commit feed backed by the GitHub REST commits listing.
pub struct GithubCommitSource {
    client: Client,
    commits_url: String,
    branch: String,
    per_page: u32,
    token: Option<String>,
}

impl GithubCommitSource {
    pub fn new(client: Client, config: &GithubConfig) -> Self {
        Self {
            client,
            commits_url: config.commits_url.clone(),
            branch: config.branch.clone(),
            per_page: config.per_page,
            token: config.token.clone(),
        }
    }
}

#[async_trait]
impl CommitSource for GithubCommitSource {
    async fn latest_commits(&self) -> Result<Vec<CommitRecord>, SourceError> {
        let mut request = self
            .client
            .get(&self.commits_url)
            .query(&[("sha", self.branch.as_str())])
            .query(&[("per_page", self.per_page)])
            .header(USER_AGENT, concat!("buildwatch/", env!("CARGO_PKG_VERSION")))
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Status {
                url: self.commits_url.clone(),
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        let commits = parse_commit_listing(&body, &self.branch)?;
        debug!(count = commits.len(), branch = %self.branch, "Fetched commit listing");
        Ok(commits)
    }
}
