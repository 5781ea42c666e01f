//! Session read loop
//!
//! Reads inbound frames, echoes and decodes every line, keeps the prepare
//! counters and issues the control messages. Lookups are handed to the
//! dispatcher without waiting for them.

use std::fmt;

use tokio_util::sync::CancellationToken;

use cmdns_core::traits::FrameReader;
use cmdns_protocol::{codec, Frame, LookupMsg, Message, PrepareMsg, RatingMsg};

use super::dispatcher::LookupQueue;
use super::outbound::Outbound;
use crate::output::Echo;
use crate::state::{PrepareProgress, SessionPhase};

/// What the session asks the server for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    /// Prepare and run checks, all of them when `checks` is empty
    Run { checks: Vec<String> },
    /// Only enumerate the available checks
    ListOnly,
}

/// Behaviour of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub mode: SessionMode,
    /// Stop reading once the rating arrives
    pub exit_on_rating: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            mode: SessionMode::Run { checks: Vec::new() },
            exit_on_rating: false,
        }
    }
}

/// Why the read loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainReason {
    /// The peer ended the inbound stream
    PeerClosed,
    /// The check list arrived
    ListReceived,
    /// The rating arrived and the session exits on it
    RatingReceived,
    /// An inbound line could not be decoded
    Decode,
    /// The transport failed while reading
    Read,
    /// A control message could not be written
    Write,
}

impl DrainReason {
    /// Whether the session ended on an error
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Decode | Self::Read | Self::Write)
    }
}

impl fmt::Display for DrainReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::PeerClosed => "peer closed the connection",
            Self::ListReceived => "check list received",
            Self::RatingReceived => "rating received",
            Self::Decode => "malformed message",
            Self::Read => "read error",
            Self::Write => "write error",
        };
        f.write_str(text)
    }
}

/// Outcome of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub reason: DrainReason,
    /// Error text when the loop stopped on an error
    pub error: Option<String>,
    pub phase: SessionPhase,
    pub prepare_total: i64,
    pub prepare_done: u32,
    pub checks_started: bool,
    pub lookups_forwarded: u64,
    pub lookups_dropped: u64,
}

struct Drain {
    reason: DrainReason,
    error: Option<String>,
}

impl Drain {
    fn new(reason: DrainReason) -> Self {
        Self {
            reason,
            error: None,
        }
    }

    fn failed(reason: DrainReason, error: impl fmt::Display) -> Self {
        Self {
            reason,
            error: Some(error.to_string()),
        }
    }
}

/// Owner of the inbound half and the session counters
pub struct Orchestrator {
    reader: Box<dyn FrameReader>,
    outbound: Outbound,
    lookups: LookupQueue,
    dispatcher: CancellationToken,
    echo: Echo,
    options: SessionOptions,
    progress: PrepareProgress,
    phase: SessionPhase,
    lookups_forwarded: u64,
    lookups_dropped: u64,
}

impl Orchestrator {
    pub fn new(
        reader: Box<dyn FrameReader>,
        outbound: Outbound,
        lookups: LookupQueue,
        dispatcher: CancellationToken,
        echo: Echo,
        options: SessionOptions,
    ) -> Self {
        Self {
            reader,
            outbound,
            lookups,
            dispatcher,
            echo,
            options,
            progress: PrepareProgress::new(),
            phase: SessionPhase::Connecting,
            lookups_forwarded: 0,
            lookups_dropped: 0,
        }
    }

    /// Run the session until the read loop stops, then stop the dispatcher
    pub async fn run(mut self) -> SessionReport {
        let drain = self.read_loop().await;

        self.lookups.close();
        self.dispatcher.cancel();
        self.set_phase(SessionPhase::Draining);

        match &drain.error {
            Some(error) => tracing::warn!("Session draining, {}: {}", drain.reason, error),
            None => tracing::info!("Session draining, {}", drain.reason),
        }

        SessionReport {
            reason: drain.reason,
            error: drain.error,
            phase: self.phase,
            prepare_total: self.progress.total(),
            prepare_done: self.progress.done(),
            checks_started: self.progress.started(),
            lookups_forwarded: self.lookups_forwarded,
            lookups_dropped: self.lookups_dropped,
        }
    }

    async fn read_loop(&mut self) -> Drain {
        let request = match &self.options.mode {
            SessionMode::Run { checks } => Message::prepare(checks.clone()),
            SessionMode::ListOnly => Message::list_request(),
        };
        if let Err(e) = self.outbound.send(&request).await {
            return Drain::failed(DrainReason::Write, e);
        }
        self.set_phase(SessionPhase::AwaitingPrepare);

        while let Some(frame) = self.reader.next_frame().await {
            let payload = match frame {
                Ok(payload) => payload,
                Err(e) => return Drain::failed(DrainReason::Read, e),
            };

            // A bad line ends the session; the rest of the frame is dropped
            for line in Frame::new(&payload) {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => return Drain::failed(DrainReason::Decode, e),
                };
                self.echo.inbound(&line);

                let message = match codec::decode(line.as_bytes()) {
                    Ok(message) => message,
                    Err(e) => return Drain::failed(DrainReason::Decode, e),
                };
                if let Err(drain) = self.handle_message(message).await {
                    return drain;
                }
            }
        }

        Drain::new(DrainReason::PeerClosed)
    }

    async fn handle_message(&mut self, message: Message) -> Result<(), Drain> {
        tracing::trace!("Received {} message", message.kind());

        match message {
            Message::Prepare(prepare) => self.handle_prepare(prepare).await,
            Message::Lookup(lookup) => {
                self.handle_lookup(lookup);
                Ok(())
            }
            Message::List(list) => {
                tracing::info!("Server offers {} checks", list.checks.len());
                Err(Drain::new(DrainReason::ListReceived))
            }
            Message::Rating(rating) => self.handle_rating(rating),
            _ => Ok(()),
        }
    }

    async fn handle_prepare(&mut self, prepare: PrepareMsg) -> Result<(), Drain> {
        let start = if prepare.done {
            tracing::debug!("Prepared check {} ({})", prepare.id, prepare.name);
            self.progress.record_done()
        } else {
            tracing::debug!("Server will prepare {} checks", prepare.total);
            self.progress.record_total(prepare.total)
        };

        if start {
            tracing::info!("All {} checks prepared, starting", self.progress.total());
            self.outbound
                .send(&Message::check_all())
                .await
                .map_err(|e| Drain::failed(DrainReason::Write, e))?;
            self.set_phase(SessionPhase::Running);
        }
        Ok(())
    }

    fn handle_lookup(&mut self, lookup: LookupMsg) {
        let dn = lookup.dn.clone();
        if self.lookups.try_send(lookup) {
            self.lookups_forwarded += 1;
        } else {
            self.lookups_dropped += 1;
            tracing::debug!("Dispatcher is gone, dropping lookup of {}", dn);
        }
    }

    fn handle_rating(&mut self, rating: RatingMsg) -> Result<(), Drain> {
        tracing::info!("Rating: {} ({})", rating.text, rating.class);
        if self.options.exit_on_rating {
            return Err(Drain::new(DrainReason::RatingReceived));
        }
        Ok(())
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            tracing::debug!("Session phase {} -> {}", self.phase, phase);
            self.phase = phase;
        }
    }
}
