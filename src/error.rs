//! Error types for atlas-watch

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for atlas-watch
///
/// Protocol conditions reported by the server inside a change stream arrive
/// as [`Error::Watch`]. Misuse of [`crate::stream::WatchStream`] is a panic and
/// never shows up here.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parse error
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    /// Configuration validation error
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the functions endpoint
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Terminal error reported by the change stream
    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

/// Structured error delivered by a change stream
///
/// `code` is whatever the server put in `error_code`. It is not
/// checked against a list of known codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct WatchError {
    pub code: String,
    pub message: String,
}

impl WatchError {
    /// Code used when an `error` frame cannot be interpreted
    pub const UNKNOWN: &'static str = "unknown";

    /// Code used when an ordinary event is not a document
    pub const BAD_BSON_PARSE: &'static str = "bad bson parse";

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}
