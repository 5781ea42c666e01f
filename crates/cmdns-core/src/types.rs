//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Path the measurement service serves its WebSocket on
pub const WS_PATH: &str = "/ws/";

/// Where the measurement service lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEndpoint {
    /// Host name or IP address
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Whether to use `wss` rather than `ws`
    pub tls: bool,
}

impl ServerEndpoint {
    /// Create a new endpoint
    pub fn new(host: impl Into<String>, port: u16, tls: bool) -> Self {
        Self {
            host: host.into(),
            port,
            tls,
        }
    }

    /// URL scheme for this endpoint
    pub fn scheme(&self) -> &'static str {
        if self.tls {
            "wss"
        } else {
            "ws"
        }
    }

    /// Full WebSocket URL, e.g. `wss://example.net:443/ws/`
    pub fn url(&self) -> String {
        // Bare IPv6 literals need brackets inside a URL authority
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        format!("{}://{}:{}{}", self.scheme(), host, self.port, WS_PATH)
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}
