//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::{duration_millis, duration_secs};
use crate::error::ConfigError;
use crate::types::ServerEndpoint;

/// Measurement service used when none is configured
pub const DEFAULT_SERVER: &str = "cmdns.dev.dns-oarc.net";

/// Port used when none is configured, with or without TLS
pub const DEFAULT_PORT: u16 = 443;

/// Configuration for the measurement client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Measurement service host name or address
    pub server: String,

    /// Measurement service port
    pub port: u16,

    /// Connect with `wss` (true) or plain `ws` (false)
    pub tls: bool,

    /// Resolver to probe lookups against.
    ///
    /// When set, lookups are answered with a DNS A/AAAA exchange against this
    /// resolver instead of an HTTP fetch.
    pub resolver: Option<String>,

    /// Check ids to run; empty means every check
    pub checks: Vec<String>,

    /// Stop the session as soon as the rating arrives
    pub exit_on_rating: bool,

    /// How long to wait for the connection to be established
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Upper bound for a single lookup probe
    #[serde(with = "duration_secs")]
    pub probe_timeout: Duration,

    /// How long to wait for the peer to acknowledge a close on interrupt
    #[serde(with = "duration_millis")]
    pub close_grace: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            port: DEFAULT_PORT,
            tls: true,
            resolver: None,
            checks: vec![],
            exit_on_rating: false,
            connect_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(10),
            close_grace: Duration::from_secs(1),
        }
    }
}

impl ClientConfig {
    /// Endpoint of the measurement service
    pub fn endpoint(&self) -> ServerEndpoint {
        ServerEndpoint::new(self.server.clone(), self.port, self.tls)
    }

    /// Check the configuration for values that cannot work
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.trim().is_empty() {
            return Err(ConfigError::Invalid("server address is empty".into()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".into()));
        }
        if let Some(resolver) = &self.resolver {
            if resolver.trim().is_empty() {
                return Err(ConfigError::InvalidResolver("empty".into()));
            }
        }
        if self.probe_timeout.is_zero() {
            return Err(ConfigError::Invalid("probe_timeout must be non-zero".into()));
        }
        Ok(())
    }
}

/// Split a comma-separated list of check ids, dropping empty entries
pub fn parse_check_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}
