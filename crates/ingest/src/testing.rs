//! In-process fakes shared by the ingest tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use axum::Router;
use buildwatch_core::CommitRecord;
use chrono::{TimeZone, Utc};

use crate::error::SourceError;
use crate::source::{BuilderFeed, CommitSource, FeedEntry};

/// Serve `app` on an ephemeral localhost port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn commit(hash: &str, hour: u32) -> CommitRecord {
    CommitRecord {
        commit_hash: hash.into(),
        timestamp: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
        branch: "main".into(),
    }
}

pub fn build_json(builder: &str, hash: &str, words: &[&str]) -> String {
    serde_json::json!({
        "builderName": builder,
        "sourceStamp": {"revision": hash, "branch": "main", "when": 1714557600},
        "text": words,
        "logs": [["stdio", format!("http://lab/{builder}/stdio")]],
    })
    .to_string()
}

/// Scripted builder feed: indices not in the script are "not yet built",
/// indices listed in `failing` answer with HTTP 503.
#[derive(Default)]
pub struct ScriptedFeed {
    entries: HashMap<(String, u64), String>,
    failing: Mutex<HashMap<(String, u64), u32>>,
    pub requests: Mutex<Vec<(String, u64)>>,
}

impl ScriptedFeed {
    pub fn with_build(mut self, builder: &str, index: u64, body: String) -> Self {
        self.entries.insert((builder.to_string(), index), body);
        self
    }

    /// Make the next `times` requests for this index fail.
    pub fn failing(self, builder: &str, index: u64, times: u32) -> Self {
        self.failing
            .lock()
            .unwrap()
            .insert((builder.to_string(), index), times);
        self
    }

    pub fn requested(&self) -> Vec<(String, u64)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl BuilderFeed for ScriptedFeed {
    async fn fetch(&self, builder: &str, index: u64) -> Result<FeedEntry, SourceError> {
        let key = (builder.to_string(), index);
        self.requests.lock().unwrap().push(key.clone());
        if let Some(left) = self.failing.lock().unwrap().get_mut(&key) {
            if *left > 0 {
                *left -= 1;
                return Err(SourceError::Status {
                    url: format!("fake://{builder}/{index}"),
                    status: 503,
                });
            }
        }
        Ok(match self.entries.get(&key) {
            Some(body) => FeedEntry::Present(body.clone()),
            None => FeedEntry::NotYetBuilt,
        })
    }
}

/// Commit source that replays a queue of responses, then keeps answering
/// with an empty listing. `None` in the queue is a transport failure.
#[derive(Default)]
pub struct ScriptedCommits {
    responses: Mutex<VecDeque<Option<Vec<CommitRecord>>>>,
    pub calls: AtomicU32,
}

impl ScriptedCommits {
    pub fn new(responses: Vec<Option<Vec<CommitRecord>>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommitSource for ScriptedCommits {
    async fn latest_commits(&self) -> Result<Vec<CommitRecord>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.lock().unwrap().pop_front() {
            Some(Some(commits)) => Ok(commits),
            Some(None) => Err(SourceError::Status {
                url: "fake://commits".into(),
                status: 500,
            }),
            None => Ok(Vec::new()),
        }
    }
}
