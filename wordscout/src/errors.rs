//! Error types for wordscout.
//!
//! Only precondition failures and configuration problems ever surface to the
//! caller as `Err`. Per-file failures during a run (unreadable files, invalid
//! UTF-8, subtrees that deny access) are still represented as `SearchError`
//! values so they can be logged uniformly, but the workers swallow them and
//! move on to the next unit of work.
//!
//! ```rust,ignore
//! match engine.search(&target, &query) {
//!     Ok(report) => // inspect report.outcome,
//!     Err(SearchError::RootNotFound(path)) => // ask the user for another directory,
//!     Err(e) => // other precondition failures
//! }
//! ```

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that can occur during search operations
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Directory not found: {0}")]
    RootNotFound(PathBuf),
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Search token must not be empty")]
    EmptyToken,
    #[error("Invalid extension filter: {0}")]
    InvalidFilter(String),
    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Operation not permitted while {0}")]
    Busy(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid UTF-8 in file {path}: {source}")]
    EncodingError {
        path: PathBuf,
        source: std::str::Utf8Error,
    },
}

impl SearchError {
    pub fn root_not_found(path: impl Into<PathBuf>) -> Self {
        Self::RootNotFound(path.into())
    }

    pub fn not_a_directory(path: impl Into<PathBuf>) -> Self {
        Self::NotADirectory(path.into())
    }

    pub fn invalid_filter(filter: impl Into<String>) -> Self {
        Self::InvalidFilter(filter.into())
    }

    pub fn invalid_timeout(msg: impl Into<String>) -> Self {
        Self::InvalidTimeout(msg.into())
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn busy(state: impl Into<String>) -> Self {
        Self::Busy(state.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn encoding_error(path: impl Into<PathBuf>, source: std::str::Utf8Error) -> Self {
        Self::EncodingError {
            path: path.into(),
            source,
        }
    }

    /// Maps an I/O error raised while touching `path` to the most specific variant
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::file_not_found(path),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::IoError(err),
        }
    }
}

impl From<config::ConfigError> for SearchError {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}
