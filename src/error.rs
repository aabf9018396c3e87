use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single network retrieval. Cloneable so one outcome can be
/// handed to every coalesced waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("{0}")]
    Network(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("request timed out")]
    Timeout,

    #[error("download cancelled")]
    Cancelled,

    /// The bytes arrived but could not be stored in the cache.
    #[error("cache write failed: {0}")]
    Storage(String),
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no cache entry for key {0}")]
    NotFound(String),

    #[error("cache I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("artifact is empty")]
    Empty,

    #[error("unrecognised image format")]
    UnknownFormat,
}

/// Errors that end a session. Display strings are the messages handed to the
/// on-error hook and the sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("Url has not been set.")]
    MissingUrl,

    #[error("Url is not correct.")]
    InvalidUrl(String),

    #[error("Error while downloading the image : {0}")]
    Fetch(FetchError),

    #[error("Loading image file has been failed.")]
    CacheRead(String),
}

impl From<FetchError> for LoadError {
    fn from(err: FetchError) -> Self {
        LoadError::Fetch(err)
    }
}

impl From<CacheError> for LoadError {
    fn from(err: CacheError) -> Self {
        LoadError::CacheRead(err.to_string())
    }
}

impl From<DecodeError> for LoadError {
    fn from(err: DecodeError) -> Self {
        LoadError::CacheRead(err.to_string())
    }
}
