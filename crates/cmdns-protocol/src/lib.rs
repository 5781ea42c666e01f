//! cmdns-protocol: Wire protocol for the cmdns measurement client
//!
//! This crate defines the newline-delimited JSON messages exchanged with the
//! measurement service over a WebSocket.

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::{decode, encode, LineCodec};
pub use error::ProtocolError;
pub use frame::Frame;
pub use message::{
    CheckMsg, CompleteMsg, DnsMsg, ListMsg, LookupMsg, Message, MessageKind, NetworkMsg,
    PrepareMsg, ProgressMsg, RatingMsg, RrMsg, UserAgentMsg, WhoisMsg,
};
