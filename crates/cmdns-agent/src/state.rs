//! Session state tracking

use std::fmt;

/// Lifecycle of a measurement session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Dialing the measurement service
    Connecting,
    /// Connected, waiting for every check to be prepared
    AwaitingPrepare,
    /// Checks are executing
    Running,
    /// Read loop has stopped, no new work is accepted
    Draining,
    /// Connection is closed
    Closed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::AwaitingPrepare => "awaiting-prepare",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Preparation counters
///
/// Only the read loop touches these. `record_total` and `record_done` return
/// `true` exactly once per session: the first time the number of prepared
/// checks equals a positive announced total.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareProgress {
    total: i64,
    done: u32,
    started: bool,
}

impl PrepareProgress {
    /// Fresh counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the announced number of checks
    pub fn record_total(&mut self, total: i64) -> bool {
        self.total = total;
        self.should_start()
    }

    /// Record one prepared check
    pub fn record_done(&mut self) -> bool {
        self.done = self.done.saturating_add(1);
        self.should_start()
    }

    /// Announced number of checks
    pub fn total(&self) -> i64 {
        self.total
    }

    /// Checks prepared so far
    pub fn done(&self) -> u32 {
        self.done
    }

    /// Whether execution has been triggered
    pub fn started(&self) -> bool {
        self.started
    }

    fn should_start(&mut self) -> bool {
        if self.started || self.total <= 0 || i64::from(self.done) != self.total {
            return false;
        }
        self.started = true;
        true
    }
}
