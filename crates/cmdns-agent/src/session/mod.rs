//! Measurement session
//!
//! One session per connection. The tasks involved:
//!
//! - the read loop ([`Orchestrator`]) owning the inbound half and counters
//! - the outbound writer owning the write half
//! - the lookup [`Dispatcher`]
//! - the caller's task, which runs the [`ShutdownCoordinator`]

mod dispatcher;
mod orchestrator;
mod outbound;
mod shutdown;

#[cfg(test)]
pub(crate) mod fake;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use cmdns_core::traits::{Resolver, Transport};

use crate::output::Echo;
use crate::state::SessionPhase;

pub use dispatcher::{Dispatcher, LookupQueue};
pub use orchestrator::{DrainReason, Orchestrator, SessionMode, SessionOptions, SessionReport};
pub use outbound::{spawn_writer, Outbound, WriterHandle};
pub use shutdown::{ShutdownCoordinator, ShutdownOutcome, ShutdownTrigger, DEFAULT_CLOSE_GRACE};

/// A configured session, ready to run over a dialed transport
pub struct Session {
    options: SessionOptions,
    grace: Duration,
    echo: Echo,
}

impl Session {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            grace: DEFAULT_CLOSE_GRACE,
            echo: Echo::stdout(),
        }
    }

    /// How long to wait for a close acknowledgment after an interrupt
    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Where the frame echo goes
    pub fn with_echo(mut self, echo: Echo) -> Self {
        self.echo = echo;
        self
    }

    /// Run the session until it drains or `interrupt` resolves
    ///
    /// The transport is closed when this returns.
    pub async fn run<F>(
        self,
        transport: Transport,
        resolver: Arc<dyn Resolver>,
        interrupt: F,
    ) -> ShutdownOutcome
    where
        F: Future<Output = ()>,
    {
        let Transport { reader, writer } = transport;
        let (outbound, writer) = spawn_writer(writer, self.echo.clone());

        let (lookups, requests) = LookupQueue::channel();
        let cancel = CancellationToken::new();
        let dispatcher = Dispatcher::new(resolver, outbound.clone(), cancel.clone()).spawn(requests);

        let orchestrator = Orchestrator::new(
            reader,
            outbound.clone(),
            lookups,
            cancel.clone(),
            self.echo,
            self.options,
        );
        let session = tokio::spawn(orchestrator.run());

        let mut outcome = ShutdownCoordinator::new(self.grace)
            .run(interrupt, session, outbound, writer)
            .await;

        // An aborted read loop never got to stop the dispatcher
        cancel.cancel();
        if let Err(e) = dispatcher.await {
            tracing::error!("Dispatcher task failed: {}", e);
        }

        if let Some(report) = outcome.report.as_mut() {
            report.phase = SessionPhase::Closed;
        }
        tracing::debug!("Session phase {}", SessionPhase::Closed);
        outcome
    }
}
