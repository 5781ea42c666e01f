//! In-memory transport for unit testing the session without a server.
//!
//! The controller plays the server: it pushes inbound frames, ends the
//! inbound stream, and inspects everything the writer did.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use cmdns_core::traits::{FrameReader, FrameWriter, Transport};
use cmdns_core::ConnectionError;

type Inbound = Result<Bytes, ConnectionError>;

/// What the session did with the outbound half
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterEvent {
    /// A text frame was written
    Text(String),
    /// A close frame was written
    CloseFrame,
    /// The connection was closed
    Closed,
}

#[derive(Default)]
struct Shared {
    events: Mutex<Vec<WriterEvent>>,
    fail_writes: AtomicBool,
    ack_close: AtomicBool,
    stall_writes: AtomicBool,
    stall_close: AtomicBool,
    inbound: Mutex<Option<mpsc::UnboundedSender<Inbound>>>,
}

impl Shared {
    fn record(&self, event: WriterEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn end_inbound(&self) {
        self.inbound.lock().unwrap().take();
    }
}

/// Fake transport halves
pub struct FakeTransport;

impl FakeTransport {
    /// Build a transport and the controller driving it
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Transport, FakeController) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            inbound: Mutex::new(Some(tx)),
            ..Shared::default()
        });

        let transport = Transport::new(
            Box::new(FakeReader { rx }),
            Box::new(FakeWriter {
                shared: Arc::clone(&shared),
            }),
        );
        (transport, FakeController { shared })
    }
}

/// Server side of a [`FakeTransport`]
#[derive(Clone)]
pub struct FakeController {
    shared: Arc<Shared>,
}

impl FakeController {
    /// Deliver one inbound frame
    pub fn push(&self, frame: impl Into<String>) {
        self.push_result(Ok(Bytes::from(frame.into())));
    }

    /// Deliver a read error
    pub fn push_error(&self, error: ConnectionError) {
        self.push_result(Err(error));
    }

    /// End the inbound stream as if the peer closed
    pub fn close_peer(&self) {
        self.shared.end_inbound();
    }

    /// Answer a close frame by ending the inbound stream
    pub fn ack_close(&self) {
        self.shared.ack_close.store(true, Ordering::SeqCst);
    }

    /// Make every write fail
    pub fn fail_writes(&self) {
        self.shared.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Make every write hang, as with a peer that stopped reading
    pub fn stall_writes(&self) {
        self.shared.stall_writes.store(true, Ordering::SeqCst);
    }

    /// Make closing the connection hang
    pub fn stall_close(&self) {
        self.shared.stall_close.store(true, Ordering::SeqCst);
    }

    /// Everything the writer did so far
    pub fn events(&self) -> Vec<WriterEvent> {
        self.shared.events.lock().unwrap().clone()
    }

    /// Text frames written so far
    pub fn sent(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                WriterEvent::Text(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Number of physical closes
    pub fn close_count(&self) -> usize {
        self.count(WriterEvent::Closed)
    }

    /// Number of close frames written
    pub fn close_frame_count(&self) -> usize {
        self.count(WriterEvent::CloseFrame)
    }

    fn count(&self, wanted: WriterEvent) -> usize {
        self.events().iter().filter(|e| **e == wanted).count()
    }

    fn push_result(&self, item: Inbound) {
        if let Some(tx) = self.shared.inbound.lock().unwrap().as_ref() {
            let _ = tx.send(item);
        }
    }
}

struct FakeReader {
    rx: mpsc::UnboundedReceiver<Inbound>,
}

#[async_trait]
impl FrameReader for FakeReader {
    async fn next_frame(&mut self) -> Option<Inbound> {
        self.rx.recv().await
    }
}

struct FakeWriter {
    shared: Arc<Shared>,
}

impl FakeWriter {
    async fn check_writable(&self) -> Result<(), ConnectionError> {
        if self.shared.stall_writes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.shared.fail_writes.load(Ordering::SeqCst) {
            return Err(ConnectionError::Write("broken pipe".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl FrameWriter for FakeWriter {
    async fn send_text(&mut self, text: String) -> Result<(), ConnectionError> {
        self.check_writable().await?;
        self.shared.record(WriterEvent::Text(text));
        Ok(())
    }

    async fn send_close(&mut self) -> Result<(), ConnectionError> {
        self.check_writable().await?;
        self.shared.record(WriterEvent::CloseFrame);
        if self.shared.ack_close.load(Ordering::SeqCst) {
            self.shared.end_inbound();
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        if self.shared.stall_close.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.shared.record(WriterEvent::Closed);
        Ok(())
    }
}
