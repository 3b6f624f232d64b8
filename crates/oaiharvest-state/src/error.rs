//! State store errors

use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Checkpoint file or run log cannot be interpreted
    #[error("corrupt harvest state in {}: {reason}", path.display())]
    CheckpointCorruption { path: PathBuf, reason: String },
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A response date that is not an ISO-8601 date or date-time
    #[error("invalid date: {0:?}")]
    InvalidDate(String),
}

impl StateError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn corrupt(path: &Path, reason: impl Into<String>) -> Self {
        Self::CheckpointCorruption {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}
