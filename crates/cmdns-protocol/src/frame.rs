//! Inbound transport frames
//!
//! A single transport frame may carry several newline-separated messages.
//! [`Frame`] yields those lines in order, skipping blank ones, and stops for
//! good after the first line it cannot read.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::LineCodec;
use crate::error::ProtocolError;

/// Lines of one inbound transport frame
#[derive(Debug)]
pub struct Frame {
    buffer: BytesMut,
    codec: LineCodec,
    finished: bool,
}

impl Frame {
    /// Wrap a raw frame payload
    pub fn new(payload: impl AsRef<[u8]>) -> Self {
        Self {
            buffer: BytesMut::from(payload.as_ref()),
            codec: LineCodec::new(),
            finished: false,
        }
    }
}

impl Iterator for Frame {
    type Item = Result<String, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            match self.codec.decode_eof(&mut self.buffer) {
                // Blank lines carry no message and are skipped, not treated as malformed
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => return Some(Ok(line)),
                Ok(None) => self.finished = true,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

impl std::iter::FusedIterator for Frame {}
