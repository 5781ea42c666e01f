//! Client-side lookup probes
//!
//! Two interchangeable strategies decide whether a domain is reachable from
//! the client's network. HTTP is the default; configuring a resolver switches
//! to a DNS A/AAAA exchange against it.

mod dns;
mod http;

use std::sync::Arc;

use thiserror::Error;

use cmdns_core::config::ClientConfig;
use cmdns_core::traits::Resolver;
use cmdns_core::ConfigError;

pub use dns::{resolver_socket_addr, DnsExchange, DnsResolver, UdpExchange, DEFAULT_DNS_PORT};
pub use http::HttpResolver;

/// Errors while setting up a probe strategy
#[derive(Debug, Error)]
pub enum ProbeSetupError {
    /// The HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    /// The resolver address is unusable
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Pick the probe strategy for this run
pub async fn build_resolver(config: &ClientConfig) -> Result<Arc<dyn Resolver>, ProbeSetupError> {
    match &config.resolver {
        Some(address) => {
            let server = resolver_socket_addr(address).await?;
            tracing::info!("Probing lookups with DNS against {}", server);
            let exchange = UdpExchange::new(server, config.probe_timeout);
            Ok(Arc::new(DnsResolver::new(exchange)))
        }
        None => {
            tracing::info!("Probing lookups with HTTP");
            Ok(Arc::new(HttpResolver::new(config.probe_timeout)?))
        }
    }
}
