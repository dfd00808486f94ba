//! Error kinds shared by the catalog, watchlist and store layers.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the local persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document exists but could not be decoded.
    #[error("corrupt document at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A record write carried a revision that is no longer current.
    #[error("revision conflict on record '{id}': expected {expected:?}, found {found:?}")]
    Conflict {
        id: String,
        expected: Option<String>,
        found: Option<String>,
    },

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<fjall::Error> for StoreError {
    fn from(err: fjall::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Top-level error type for fund lookups.
#[derive(Debug, Error)]
pub enum FundError {
    #[error("catalog source unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error(transparent)]
    Persistence(#[from] StoreError),

    #[error("query was superseded")]
    Cancelled,
}

impl FundError {
    pub fn upstream(err: impl std::fmt::Display) -> Self {
        FundError::UpstreamUnavailable(err.to_string())
    }
}
