//! Probe traits

use async_trait::async_trait;

use crate::error::ProbeError;

/// Decides whether a domain name is reachable from the client's network
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Short name of the strategy, used in logs
    fn strategy(&self) -> &'static str;

    /// Probe `domain`
    async fn resolve(&self, domain: &str) -> Result<(), ProbeError>;
}
