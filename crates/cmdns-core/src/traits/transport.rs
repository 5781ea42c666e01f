//! Transport traits
//!
//! The session only needs a duplex message channel: frames in, text frames
//! out, and a close handshake. The WebSocket implementation lives in the
//! agent crate; tests substitute in-memory halves.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ConnectionError;

/// Inbound half of a connection
#[async_trait]
pub trait FrameReader: Send {
    /// Wait for the next inbound frame payload
    ///
    /// Returns `None` once the peer has closed the connection.
    async fn next_frame(&mut self) -> Option<Result<Bytes, ConnectionError>>;
}

/// Outbound half of a connection
#[async_trait]
pub trait FrameWriter: Send {
    /// Send one text frame
    async fn send_text(&mut self, text: String) -> Result<(), ConnectionError>;

    /// Start the close handshake by sending a normal-closure close frame
    async fn send_close(&mut self) -> Result<(), ConnectionError>;

    /// Close the underlying connection
    async fn close(&mut self) -> Result<(), ConnectionError>;
}

/// A dialed connection, split into its two halves
pub struct Transport {
    /// Inbound half, owned by the read loop
    pub reader: Box<dyn FrameReader>,
    /// Outbound half, owned by the writer task
    pub writer: Box<dyn FrameWriter>,
}

impl Transport {
    /// Bundle two halves
    pub fn new(reader: Box<dyn FrameReader>, writer: Box<dyn FrameWriter>) -> Self {
        Self { reader, writer }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}
