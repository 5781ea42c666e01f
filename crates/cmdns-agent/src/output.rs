//! Frame echo on standard output
//!
//! Every inbound line is printed verbatim and every outbound message is
//! printed as `{"send":<message>}`, one per line. Diagnostics go to stderr
//! through `tracing`, so stdout carries nothing but the protocol stream.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Shared writer receiving the frame echo
#[derive(Clone)]
pub struct Echo {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Echo {
    /// Echo to the process's standard output
    pub fn stdout() -> Self {
        Self::to_writer(io::stdout())
    }

    /// Echo into an arbitrary writer
    pub fn to_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Echo into an in-memory buffer that can be inspected later
    pub fn capture() -> (Self, EchoBuffer) {
        let buffer = EchoBuffer::default();
        (Self::to_writer(buffer.clone()), buffer)
    }

    /// Print an inbound line as received
    pub fn inbound(&self, line: &str) {
        self.write_line(line);
    }

    /// Print an outbound message, wrapped in a `send` envelope
    pub fn outbound(&self, json: &str) {
        self.write_line(&format!("{{\"send\":{}}}", json));
    }

    fn write_line(&self, line: &str) {
        let Ok(mut sink) = self.sink.lock() else {
            return;
        };
        if let Err(e) = writeln!(sink, "{}", line).and_then(|_| sink.flush()) {
            tracing::debug!("Failed to echo frame: {}", e);
        }
    }
}

impl std::fmt::Debug for Echo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Echo").finish_non_exhaustive()
    }
}

/// In-memory echo target
#[derive(Debug, Clone, Default)]
pub struct EchoBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl EchoBuffer {
    /// Lines written so far
    pub fn lines(&self) -> Vec<String> {
        let bytes = self.inner.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(String::from)
            .collect()
    }
}

impl Write for EchoBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "echo buffer poisoned"))?;
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_wraps_outbound_only() {
        let (echo, buffer) = Echo::capture();
        echo.inbound(r#"{"prepare":{"total":1}}"#);
        echo.outbound(r#"{"check":{"all":true}}"#);

        assert_eq!(
            buffer.lines(),
            vec![
                r#"{"prepare":{"total":1}}"#,
                r#"{"send":{"check":{"all":true}}}"#,
            ]
        );
    }

    #[test]
    fn test_clones_share_the_sink() {
        let (echo, buffer) = Echo::capture();
        let other = echo.clone();
        echo.inbound("a");
        other.inbound("b");
        assert_eq!(buffer.lines(), vec!["a", "b"]);
    }
}
