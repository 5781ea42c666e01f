//! cmdns-agent: command-line client for the cmdns measurement service
//!
//! The agent dials the service over WebSocket, asks it to prepare and run
//! its DNS checks, answers the client-side lookup probes the server requests,
//! and echoes the whole message stream on stdout.

pub mod output;
pub mod probe;
pub mod session;
pub mod state;
pub mod transport;

pub use output::Echo;
pub use session::{Session, SessionMode, SessionOptions, SessionReport, ShutdownOutcome};
pub use state::SessionPhase;
