use buildwatch_storage::StorageError;
use thiserror::Error;

/// A payload from an external source could not be turned into a record.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("no recognised status word in {0:?}")]
    UnrecognizedStatus(Vec<String>),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Failure talking to an external source. Always transient for the caller:
/// the cycle is abandoned and retried after the poll delay.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} responded with {status}")]
    Status { url: String, status: u16 },

    #[error("unparseable response: {0}")]
    Parse(#[from] PayloadError),

    #[error("invalid base URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceError::Timeout {
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            SourceError::Http(e)
        }
    }
}

/// Why a single poll cycle did not complete.
#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PollError {
    /// Fatal errors stop the poller; everything else is retried.
    pub fn is_fatal(&self) -> bool {
        match self {
            PollError::Source(_) => false,
            PollError::Storage(e) => e.is_invariant_violation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_errors_are_not_fatal() {
        let err = PollError::from(SourceError::Status {
            url: "http://lab/json".into(),
            status: 503,
        });
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_monotonicity_violation_is_fatal() {
        let err = PollError::from(StorageError::MonotonicityViolation {
            builder: "b1".into(),
            current: 4,
            requested: 4,
        });
        assert!(err.is_fatal());
    }

    #[test]
    fn test_cursor_io_is_not_fatal() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "ro");
        assert!(!PollError::from(StorageError::Io(io)).is_fatal());
    }
}
