//! Error types for the relay pipeline.
//!
//! [`StreamError`] covers the terminal conditions of the decode pipeline and is
//! frozen on the stream object that produced it. [`AppError`] wraps it together
//! with the configuration, transport and sink failures around the pipeline.

use crate::core::error_types::ErrorCategoryCode;
use thiserror::Error;

/// Terminal failure of a frame decoder or typed event stream.
#[derive(Error, Debug)]
pub enum StreamError {
    /// I/O failure while reading the underlying byte source
    #[error("failed to read event stream: {0}")]
    FrameRead(#[from] std::io::Error),

    /// A single SSE line grew past the configured limit
    #[error("event stream line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    /// The byte source was released before the read
    #[error("read on closed event stream")]
    Closed,

    /// Payload did not match the strict chunk schema
    #[error("failed to decode stream chunk: {0}")]
    Decode(#[source] serde_json::Error),

    /// Payload carried an explicit top-level `error` field
    #[error("received error while streaming: {message}")]
    Upstream { message: String },
}

impl StreamError {
    /// Category used in structured logs.
    pub fn category(&self) -> ErrorCategoryCode {
        match self {
            StreamError::FrameRead(_) | StreamError::LineTooLong { .. } | StreamError::Closed => {
                ErrorCategoryCode::FrameRead
            }
            StreamError::Decode(_) => ErrorCategoryCode::Decode,
            StreamError::Upstream { .. } => ErrorCategoryCode::Upstream,
        }
    }

    /// The upstream-supplied message, if this is an upstream error.
    pub fn upstream_message(&self) -> Option<&str> {
        match self {
            StreamError::Upstream { message } => Some(message),
            _ => None,
        }
    }
}

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (file not found, parse errors, etc.)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// HTTP request errors from the reqwest client
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Caller provided invalid data
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Model is not served by the selected upstream
    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    /// Upstream answered with a non-success status
    #[error("Upstream returned status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// Terminal stream failure
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// The event sink stopped accepting events
    #[error("Event sink closed")]
    SinkClosed,
}

/// Convenience type alias for Results using [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;
