// src/error.rs
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = IndexerError> = std::result::Result<T, E>;

/// Failure taxonomy for the indexer.
///
/// `Config`, `Io` and `Format` are fatal when raised during startup.
/// `Transport` is per-URL once dispatching has begun and never aborts a run.
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed record at {location}: {reason}")]
    Format { location: String, reason: String },
    #[error("transport error: {0}")]
    Transport(String),
}

impl IndexerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn format(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Format {
            location: location.into(),
            reason: reason.into(),
        }
    }
}
