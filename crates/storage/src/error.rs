use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("cursor for builder '{builder}' cannot move from {current} to {requested}")]
    MonotonicityViolation {
        builder: String,
        current: u64,
        requested: u64,
    },

    #[error("builder '{0}' has no registered cursor")]
    UnknownBuilder(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    /// Invariant violations are programming errors, not I/O hiccups.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            StorageError::MonotonicityViolation { .. } | StorageError::UnknownBuilder(_)
        )
    }
}
