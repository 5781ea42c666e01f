//! Core error types for cmdns

use std::path::PathBuf;
use thiserror::Error;

/// Connection-related errors
///
/// All of them are terminal for the session; there is no reconnection.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The transport could not be established
    #[error("failed to connect to {url}: {reason}")]
    Dial { url: String, reason: String },

    /// Dialing took longer than the configured timeout
    #[error("timed out connecting to {0}")]
    Timeout(String),

    /// Reading from the transport failed
    #[error("read failed: {0}")]
    Read(String),

    /// Writing to the transport failed
    #[error("write failed: {0}")]
    Write(String),

    /// The connection is already closed
    #[error("connection closed")]
    Closed,
}

/// Probe failures
///
/// These never end a session; their text is reported to the server inside
/// the lookup response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// HTTP transport-level failure
    #[error("{0}")]
    Request(String),

    /// DNS exchange with the resolver failed
    #[error("{0}")]
    Exchange(String),

    /// The resolver answered with an empty answer section
    #[error("no answer records")]
    NoAnswer,

    /// The first answer record was neither A nor AAAA
    #[error("no A/AAAA record found in answer")]
    NoAddressRecord,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Resolver address could not be understood
    #[error("Invalid resolver address: {0}")]
    InvalidResolver(String),
}
