//! Decoding of the JSON documents served by GitHub and Buildbot.

use buildwatch_core::{classify_words, BuildLog, BuilderResult, CommitRecord};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::PayloadError;

// ── GitHub commits listing ────────────────────────────────────

#[derive(Deserialize)]
struct ListedCommit {
    sha: Option<String>,
    commit: Option<CommitDetail>,
}

#[derive(Deserialize)]
struct CommitDetail {
    committer: Option<Signature>,
    author: Option<Signature>,
}

#[derive(Deserialize)]
struct Signature {
    date: Option<String>,
}

/// Parse a `GET /repos/{owner}/{repo}/commits` response.
///
/// The body must be a JSON array. Items that lack a hash or a usable date are
/// dropped with a warning; the rest are returned in listing order.
pub fn parse_commit_listing(body: &str, branch: &str) -> Result<Vec<CommitRecord>, PayloadError> {
    let items: Vec<Value> = serde_json::from_str(body)?;
    let mut commits = Vec::with_capacity(items.len());
    for (position, item) in items.into_iter().enumerate() {
        match listed_commit(item, branch) {
            Ok(commit) => commits.push(commit),
            Err(e) => warn!(position, error = %e, "Dropping malformed commit record"),
        }
    }
    Ok(commits)
}

fn listed_commit(item: Value, branch: &str) -> Result<CommitRecord, PayloadError> {
    let listed: ListedCommit = serde_json::from_value(item)?;
    let commit_hash = listed
        .sha
        .filter(|s| !s.is_empty())
        .ok_or(PayloadError::MissingField("sha"))?;
    let detail = listed.commit.ok_or(PayloadError::MissingField("commit"))?;
    let date = detail
        .committer
        .and_then(|s| s.date)
        .or_else(|| detail.author.and_then(|s| s.date))
        .ok_or(PayloadError::MissingField("commit.committer.date"))?;
    Ok(CommitRecord {
        commit_hash,
        timestamp: parse_rfc3339(&date)?,
        branch: branch.to_string(),
    })
}

// ── GitHub push webhook ───────────────────────────────────────

#[derive(Deserialize)]
struct PushEvent {
    #[serde(rename = "ref")]
    git_ref: Option<String>,
    head_commit: Option<HeadCommit>,
}

#[derive(Deserialize)]
struct HeadCommit {
    id: Option<String>,
    timestamp: Option<String>,
}

/// Parse a GitHub `push` webhook body. The branch is the last path component
/// of `ref` (`refs/heads/main` → `main`).
pub fn parse_push_event(body: &[u8]) -> Result<CommitRecord, PayloadError> {
    let event: PushEvent = serde_json::from_slice(body)?;
    let git_ref = event.git_ref.ok_or(PayloadError::MissingField("ref"))?;
    let branch = git_ref
        .rsplit('/')
        .next()
        .filter(|b| !b.is_empty())
        .ok_or(PayloadError::MissingField("ref"))?;
    let head = event.head_commit.ok_or(PayloadError::MissingField("head_commit"))?;
    let commit_hash = head
        .id
        .filter(|s| !s.is_empty())
        .ok_or(PayloadError::MissingField("head_commit.id"))?;
    let timestamp = head
        .timestamp
        .ok_or(PayloadError::MissingField("head_commit.timestamp"))?;
    Ok(CommitRecord {
        commit_hash,
        timestamp: parse_rfc3339(&timestamp)?,
        branch: branch.to_string(),
    })
}

// ── Buildbot build ────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBuild {
    builder_name: Option<String>,
    source_stamp: Option<RawSourceStamp>,
    text: Option<StatusText>,
    #[serde(default)]
    logs: Vec<Value>,
    #[serde(default)]
    times: Vec<Value>,
}

#[derive(Deserialize)]
struct RawSourceStamp {
    revision: Option<String>,
    when: Option<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StatusText {
    Words(Vec<String>),
    Line(String),
}

impl StatusText {
    fn words(&self) -> Vec<String> {
        match self {
            StatusText::Words(words) => words
                .iter()
                .flat_map(|w| w.split_whitespace())
                .map(str::to_string)
                .collect(),
            StatusText::Line(line) => line.split_whitespace().map(str::to_string).collect(),
        }
    }
}

/// True when a feed body carries no build: empty, `null`, or `{}`.
pub fn is_empty_build(body: &str) -> bool {
    let trimmed = body.trim();
    trimmed.is_empty()
        || match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Null) => true,
            Ok(Value::Object(m)) => m.is_empty(),
            _ => false,
        }
}

/// Parse one Buildbot build document polled from `builder`'s feed.
///
/// The commit comes from `sourceStamp.revision`, the time from
/// `sourceStamp.when` (falling back to the build's finish/start time), and the
/// status from the words of `text`. A missing `builderName` falls back to the
/// polled builder.
pub fn parse_build(builder: &str, body: &str) -> Result<BuilderResult, PayloadError> {
    let raw: RawBuild = serde_json::from_str(body)?;
    let stamp = raw.source_stamp.ok_or(PayloadError::MissingField("sourceStamp"))?;
    let commit_hash = stamp
        .revision
        .filter(|r| !r.is_empty())
        .ok_or(PayloadError::MissingField("sourceStamp.revision"))?;

    let timestamp = match stamp.when.filter(|w| !w.is_null()) {
        Some(when) => parse_when(&when)?,
        None => build_time(&raw.times)?,
    };

    let words = raw.text.map(|t| t.words()).unwrap_or_default();
    let status = classify_words(words.iter().map(String::as_str))
        .ok_or_else(|| PayloadError::UnrecognizedStatus(words.clone()))?;

    let logs = raw.logs.iter().filter_map(log_pair).collect();

    Ok(BuilderResult {
        builder_name: raw
            .builder_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| builder.to_string()),
        commit_hash,
        timestamp,
        status,
        logs,
    })
}

fn log_pair(entry: &Value) -> Option<BuildLog> {
    match entry.as_array()?.as_slice() {
        [Value::String(kind), Value::String(link), ..] => Some(BuildLog::new(kind, link)),
        _ => None,
    }
}

/// Latest non-null entry of Buildbot's `[start, end]` times.
fn build_time(times: &[Value]) -> Result<DateTime<Utc>, PayloadError> {
    let when = times
        .iter()
        .rev()
        .find(|t| !t.is_null())
        .ok_or(PayloadError::MissingField("sourceStamp.when"))?;
    parse_when(when)
}

fn parse_when(when: &Value) -> Result<DateTime<Utc>, PayloadError> {
    match when {
        Value::Number(n) => n
            .as_f64()
            .and_then(epoch_seconds)
            .ok_or_else(|| PayloadError::InvalidTimestamp(n.to_string())),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(secs) => epoch_seconds(secs).ok_or_else(|| PayloadError::InvalidTimestamp(s.clone())),
            Err(_) => parse_rfc3339(s),
        },
        other => Err(PayloadError::InvalidTimestamp(other.to_string())),
    }
}

fn epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    let whole = secs.trunc();
    let nanos = ((secs - whole) * 1_000_000_000.0).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, PayloadError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| PayloadError::InvalidTimestamp(s.to_string()))
}
