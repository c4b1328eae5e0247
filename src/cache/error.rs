//! Error types for cache log operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error type for cache log operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The entry cannot be stored in the log.
    #[error("invalid cache log entry: {0}")]
    InvalidEntry(String),

    /// A removal targeted an entry the log does not hold.
    #[error("This entry does not appear in the log.")]
    EntryNotFound,

    /// A relocation named a file no entry points at.
    #[error("no cache log entry points at {0}")]
    NoEntryForFile(String),

    /// A line of the ascii log could not be parsed.
    #[error("malformed cache log line {line}: {content:?} (expected 5 whitespace-separated fields)")]
    MalformedLog { line: usize, content: String },

    /// The home directory needed for the standard log location is unknown.
    #[error("unable to determine the home directory for the standard cache log location")]
    NoHomeDirectory,

    /// Underlying filesystem failure.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for cache log operations.
pub type CacheResult<T> = Result<T, CacheError>;
