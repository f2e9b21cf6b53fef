//! Error types for the confsync system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for confsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the confsync system
#[derive(Error, Debug)]
pub enum Error {
    /// Entry or remote record absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Optimistic-concurrency version mismatch on a remote update
    #[error("version conflict: {0}")]
    Conflict(String),

    /// Remote record already exists (benign; converted into a retry)
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization of an unrecognized entry kind
    #[error("unsupported entry kind: {0}")]
    UnsupportedKind(String),

    /// Update helper attempt budget exceeded
    #[error("failed to update remote record {key} after {attempts} attempts")]
    RetryExhausted {
        /// Collection key of the record
        key: String,
        /// Attempt budget that was exhausted
        attempts: usize,
    },

    /// Remote store errors other than the categorized ones above
    #[error("remote store error: {0}")]
    RemoteStore(String),

    /// File or remote watch channel failure
    #[error("watch error: {0}")]
    Watch(String),

    /// Service reload signal failure
    #[error("reload error: {0}")]
    Reload(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Cooperative cancellation observed mid-operation
    #[error("operation cancelled")]
    Cancelled,

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a version conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create an "already exists" error
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    /// Create a remote store error
    pub fn remote_store(msg: impl Into<String>) -> Self {
        Self::RemoteStore(msg.into())
    }

    /// Create a watch error
    pub fn watch(msg: impl Into<String>) -> Self {
        Self::Watch(msg.into())
    }

    /// Create a reload error
    pub fn reload(msg: impl Into<String>) -> Self {
        Self::Reload(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for the errors the retry helper treats as transient
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
