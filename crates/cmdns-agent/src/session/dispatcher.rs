//! Probe dispatcher
//!
//! Lookup requests are handed over by the read loop through a [`LookupQueue`]
//! and probed one at a time, in arrival order, by a single worker task.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use cmdns_core::traits::Resolver;
use cmdns_protocol::{LookupMsg, Message};

use super::outbound::Outbound;

/// Sending side of the lookup handoff
///
/// Handing over never blocks. Once closed, every handoff is refused.
#[derive(Debug)]
pub struct LookupQueue {
    tx: Option<mpsc::UnboundedSender<LookupMsg>>,
}

impl LookupQueue {
    /// Create an open queue and its receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<LookupMsg>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Hand over a lookup, returning `false` if it was discarded
    pub fn try_send(&self, lookup: LookupMsg) -> bool {
        match &self.tx {
            Some(tx) => tx.send(lookup).is_ok(),
            None => false,
        }
    }

    /// Stop accepting lookups
    pub fn close(&mut self) {
        self.tx = None;
    }

    /// Whether handoffs are refused
    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().map_or(true, |tx| tx.is_closed())
    }
}

/// Worker answering lookup requests
pub struct Dispatcher {
    resolver: Arc<dyn Resolver>,
    outbound: Outbound,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(resolver: Arc<dyn Resolver>, outbound: Outbound, cancel: CancellationToken) -> Self {
        Self {
            resolver,
            outbound,
            cancel,
        }
    }

    /// Run the worker on its own task
    pub fn spawn(self, rx: mpsc::UnboundedReceiver<LookupMsg>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }

    /// Answer lookups until the queue closes, the token is cancelled or a
    /// response cannot be written
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<LookupMsg>) {
        tracing::debug!("Dispatcher started ({} strategy)", self.resolver.strategy());

        loop {
            let mut lookup = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                lookup = rx.recv() => match lookup {
                    Some(lookup) => lookup,
                    None => break,
                },
            };

            tracing::debug!("Probing {} for check {}", lookup.dn, lookup.id);
            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => break,
                outcome = self.resolver.resolve(&lookup.dn) => outcome,
            };

            match outcome {
                Ok(()) => lookup.succeed(),
                Err(e) => {
                    tracing::debug!("Probe of {} failed: {}", lookup.dn, e);
                    lookup.fail(e.to_string());
                }
            }

            if let Err(e) = self.outbound.send(&Message::Lookup(lookup)).await {
                tracing::warn!("Failed to send lookup response: {}", e);
                break;
            }
        }

        tracing::debug!("Dispatcher stopped");
    }
}
