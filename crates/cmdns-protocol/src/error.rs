//! Protocol error types

use thiserror::Error;

/// Errors that can occur while encoding or decoding wire messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A line was not a valid JSON message
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    /// A line was not valid UTF-8
    #[error("message is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
