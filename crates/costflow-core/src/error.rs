//! Error types for costflow-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in costflow-core and the calculation layer built on it
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed dotted/indexed path
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Output key that is neither a required result nor a `slug|title` pair
    #[error("Invalid result key: {0}")]
    InvalidResultKey(String),

    /// LOGIC_JSON block could not be decoded
    #[error("Invalid logic definition: {0}")]
    InvalidLogic(String),

    /// A detail, binding, stage or calculator id that does not exist
    #[error("Unknown {kind}: {id}")]
    UnknownItem { kind: &'static str, id: String },

    /// The calculation run was cancelled before it finished
    #[error("Calculation cancelled")]
    Cancelled,

    /// JSON decoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    pub(crate) fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        Error::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}
