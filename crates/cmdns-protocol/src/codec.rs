//! JSON codec for protocol messages
//!
//! Each message is one JSON object. Inbound transport frames may carry several
//! messages separated by `\n`; [`LineCodec`] splits them, [`decode`] and
//! [`encode`] convert single lines.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use crate::error::ProtocolError;
use crate::message::Message;

/// Decode one line into a message
pub fn decode(line: &[u8]) -> Result<Message, ProtocolError> {
    let message = serde_json::from_slice(line)?;
    Ok(message)
}

/// Encode a message as a single line of JSON (without terminator)
pub fn encode(message: &Message) -> Result<String, ProtocolError> {
    let line = serde_json::to_string(message)?;
    Ok(line)
}

/// Splits a byte buffer into newline-delimited text lines
///
/// A trailing `\r` is removed from every line. At end of input the remainder
/// is yielded as a final line when non-empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineCodec;

impl LineCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self
    }

    fn take_line(src: &mut BytesMut, len: usize, skip: usize) -> Result<String, ProtocolError> {
        let mut line = src.split_to(len);
        src.advance(skip);
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        let text = std::str::from_utf8(&line)?;
        Ok(text.to_owned())
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match src.iter().position(|b| *b == b'\n') {
            Some(pos) => Self::take_line(src, pos, 1).map(Some),
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let len = src.len();
        Self::take_line(src, len, 0).map(Some)
    }
}
