use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of a single builder run, and the derived outcome of a revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuilderStatus {
    Passed,
    Failed,
    Lost,
}

impl BuilderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuilderStatus::Passed => "PASSED",
            BuilderStatus::Failed => "FAILED",
            BuilderStatus::Lost => "LOST",
        }
    }
}

impl fmt::Display for BuilderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fold builder outcomes into the revision's overall status.
///
/// A failure anywhere wins, then any pass. No results, or only lost ones,
/// give `Lost`.
pub fn aggregate<I>(statuses: I) -> BuilderStatus
where
    I: IntoIterator<Item = BuilderStatus>,
{
    let mut any_passed = false;
    for status in statuses {
        match status {
            BuilderStatus::Failed => return BuilderStatus::Failed,
            BuilderStatus::Passed => any_passed = true,
            BuilderStatus::Lost => {}
        }
    }
    if any_passed {
        BuilderStatus::Passed
    } else {
        BuilderStatus::Lost
    }
}

/// Words in a build's status text that map to an outcome, in match order.
pub const STATUS_KEYWORDS: &[(&str, BuilderStatus)] = &[
    ("failed", BuilderStatus::Failed),
    ("lost", BuilderStatus::Lost),
    ("successful", BuilderStatus::Passed),
];

fn keyword_status(word: &str) -> Option<BuilderStatus> {
    STATUS_KEYWORDS
        .iter()
        .find(|(kw, _)| word.eq_ignore_ascii_case(kw))
        .map(|(_, status)| *status)
}

/// Classify a build from its status words.
///
/// `failed` and `lost` settle the outcome as soon as they are seen.
/// `successful` is remembered but a later `failed`/`lost` still overrides it.
/// Returns `None` when no word is recognised.
pub fn classify_words<'a, I>(words: I) -> Option<BuilderStatus>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut found = None;
    for word in words {
        match keyword_status(word.trim()) {
            Some(BuilderStatus::Passed) => found = Some(BuilderStatus::Passed),
            Some(terminal) => return Some(terminal),
            None => {}
        }
    }
    found
}
