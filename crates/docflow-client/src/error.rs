//! Error types for the client.

use thiserror::Error;

use docflow_core::CoreError;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {path}")]
    Status { status: u16, path: String },

    /// Resource not found (unknown job or workflow).
    #[error("not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Push stream failed or ended unexpectedly.
    #[error("stream error: {0}")]
    Stream(String),

    /// Malformed update payload.
    #[error(transparent)]
    Core(#[from] CoreError),
}
