//! cmdns-core: Core abstractions and configuration for the cmdns client
//!
//! This crate provides the configuration, error taxonomy and the transport and
//! probe traits the session orchestrator is written against.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{ConfigError, ConnectionError, ProbeError};
pub use types::ServerEndpoint;
