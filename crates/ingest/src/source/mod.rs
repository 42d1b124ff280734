pub mod buildbot;
pub mod github;
pub mod traits;

pub use buildbot::BuildbotFeed;
pub use github::GithubCommitSource;
pub use traits::{BuilderFeed, CommitSource, FeedEntry};
