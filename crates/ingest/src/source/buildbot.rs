use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};

use super::traits::{BuilderFeed, FeedEntry};
use crate::error::SourceError;
use crate::payload::is_empty_build;

/// Builder feeds served by a Buildbot JSON API, one build per request at
/// `{base_url}/{builder}/builds/{index}`.
pub struct BuildbotFeed {
    client: Client,
    base_url: Url,
}

impl BuildbotFeed {
    pub fn new(client: Client, base_url: &str) -> Result<Self, SourceError> {
        let invalid = |reason: String| SourceError::InvalidUrl {
            url: base_url.to_string(),
            reason,
        };
        let parsed = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(invalid("not a hierarchical URL".into()));
        }
        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    /// The builder name is one escaped path segment, whatever it contains.
    fn build_url(&self, builder: &str, index: u64) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(builder)
                .push("builds")
                .push(&index.to_string());
        }
        url
    }
}

#[async_trait]
impl BuilderFeed for BuildbotFeed {
    async fn fetch(&self, builder: &str, index: u64) -> Result<FeedEntry, SourceError> {
        let url = self.build_url(builder, index);
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(FeedEntry::NotYetBuilt);
        }
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        if is_empty_build(&body) {
            Ok(FeedEntry::NotYetBuilt)
        } else {
            Ok(FeedEntry::Present(body))
        }
    }
}
