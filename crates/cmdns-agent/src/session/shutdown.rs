//! Shutdown coordination
//!
//! Races the interrupt signal against the end of the read loop and closes
//! the connection exactly once, whichever comes first.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::orchestrator::SessionReport;
use super::outbound::{Outbound, WriterHandle};

/// Default wait for the peer to acknowledge a close frame
pub const DEFAULT_CLOSE_GRACE: Duration = Duration::from_secs(1);

/// What ended the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// The process was asked to stop
    Interrupted,
    /// The read loop finished on its own
    Drained,
}

/// Result of a coordinated shutdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownOutcome {
    pub trigger: ShutdownTrigger,
    /// Report of the read loop, unless it had to be aborted
    pub report: Option<SessionReport>,
}

/// Drives a session to its closed state
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    grace: Duration,
}

impl ShutdownCoordinator {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    /// Wait for `interrupt` or the end of `session`, then close the writer
    ///
    /// On interrupt a close frame is sent and the read loop gets the grace
    /// period to see the acknowledgment before it is aborted. The close frame
    /// and the acknowledgment share one deadline, and closing the connection
    /// afterwards is bounded by the grace period as well.
    pub async fn run<F>(
        &self,
        interrupt: F,
        mut session: JoinHandle<SessionReport>,
        outbound: Outbound,
        writer: WriterHandle,
    ) -> ShutdownOutcome
    where
        F: Future<Output = ()>,
    {
        let outcome = tokio::select! {
            joined = &mut session => ShutdownOutcome {
                trigger: ShutdownTrigger::Drained,
                report: report_of(joined),
            },
            _ = interrupt => {
                tracing::info!("Interrupted, closing connection");
                ShutdownOutcome {
                    trigger: ShutdownTrigger::Interrupted,
                    report: self.close_gracefully(session, &outbound).await,
                }
            }
        };

        writer.close_within(self.grace).await;
        outcome
    }

    async fn close_gracefully(
        &self,
        mut session: JoinHandle<SessionReport>,
        outbound: &Outbound,
    ) -> Option<SessionReport> {
        let deadline = Instant::now() + self.grace;

        match tokio::time::timeout_at(deadline, outbound.close_handshake()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!("Failed to send close frame: {}", e);
                session.abort();
                return None;
            }
            Err(_) => {
                tracing::warn!("Close frame not sent within {:?}, closing anyway", self.grace);
                session.abort();
                return None;
            }
        }

        match tokio::time::timeout_at(deadline, &mut session).await {
            Ok(joined) => report_of(joined),
            Err(_) => {
                tracing::warn!(
                    "No close acknowledgment within {:?}, closing anyway",
                    self.grace
                );
                session.abort();
                None
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_CLOSE_GRACE)
    }
}

fn report_of(joined: Result<SessionReport, tokio::task::JoinError>) -> Option<SessionReport> {
    match joined {
        Ok(report) => Some(report),
        Err(e) => {
            tracing::error!("Session task failed: {}", e);
            None
        }
    }
}
