//! Outbound writer
//!
//! The read loop and the probe dispatcher both send messages. Instead of
//! sharing the transport's write half, they hand messages to a single writer
//! task through a queue and wait for the write result. The writer task owns
//! the write half and is the only place that ever closes it.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use cmdns_core::traits::FrameWriter;
use cmdns_core::ConnectionError;
use cmdns_protocol::{codec, Message};

use crate::output::Echo;

/// Commands queued for the writer task.
///
/// Outbound traffic is a handful of control messages plus one response per
/// lookup, so a small buffer is plenty.
const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

/// Default bound on closing the connection once the writer is stopped
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

type Reply = oneshot::Sender<Result<(), ConnectionError>>;

enum Command {
    Text { text: String, reply: Reply },
    CloseHandshake { reply: Reply },
}

/// Cloneable handle for sending through the writer task
#[derive(Clone, Debug)]
pub struct Outbound {
    tx: mpsc::Sender<Command>,
}

impl Outbound {
    /// Encode and send `message`, waiting until it has been written
    pub async fn send(&self, message: &Message) -> Result<(), ConnectionError> {
        let text = codec::encode(message).map_err(|e| ConnectionError::Write(e.to_string()))?;
        self.submit(|reply| Command::Text { text, reply }).await
    }

    /// Send a close frame to start the close handshake
    pub async fn close_handshake(&self) -> Result<(), ConnectionError> {
        self.submit(|reply| Command::CloseHandshake { reply }).await
    }

    async fn submit(&self, command: impl FnOnce(Reply) -> Command) -> Result<(), ConnectionError> {
        let (reply, result) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| ConnectionError::Closed)?;
        result.await.unwrap_or(Err(ConnectionError::Closed))
    }
}

/// Owner side of the writer task
#[derive(Debug)]
pub struct WriterHandle {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl WriterHandle {
    /// Stop the writer and close the connection within [`DEFAULT_CLOSE_TIMEOUT`]
    pub async fn close(self) {
        self.close_within(DEFAULT_CLOSE_TIMEOUT).await
    }

    /// Stop the writer and close the connection, giving up after `limit`
    ///
    /// A write in flight is abandoned as soon as the writer is stopped. If
    /// the close itself does not finish in time the task is aborted, which
    /// drops the write half.
    pub async fn close_within(mut self, limit: Duration) {
        self.stop.cancel();
        match tokio::time::timeout(limit, &mut self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Outbound writer task failed: {}", e),
            Err(_) => {
                tracing::warn!("Connection did not close within {:?}, dropping it", limit);
                self.task.abort();
            }
        }
    }
}

/// Start the writer task over `writer`
pub fn spawn_writer(writer: Box<dyn FrameWriter>, echo: Echo) -> (Outbound, WriterHandle) {
    let (tx, rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
    let stop = CancellationToken::new();
    let task = tokio::spawn(run_writer(writer, rx, echo, stop.clone()));
    (Outbound { tx }, WriterHandle { stop, task })
}

async fn run_writer(
    mut writer: Box<dyn FrameWriter>,
    mut rx: mpsc::Receiver<Command>,
    echo: Echo,
    stop: CancellationToken,
) {
    loop {
        let command = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            command = rx.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        match command {
            Command::Text { text, reply } => {
                let Some(result) = until_stopped(&stop, writer.send_text(text.clone())).await else {
                    let _ = reply.send(Err(ConnectionError::Closed));
                    break;
                };
                match &result {
                    Ok(()) => echo.outbound(&text),
                    Err(e) => tracing::error!("Failed to send message: {}", e),
                }
                let _ = reply.send(result);
            }
            Command::CloseHandshake { reply } => {
                tracing::debug!("Sending close frame");
                let Some(result) = until_stopped(&stop, writer.send_close()).await else {
                    let _ = reply.send(Err(ConnectionError::Closed));
                    break;
                };
                let _ = reply.send(result);
            }
        }
    }

    // Anything still queued will never be written
    rx.close();

    if let Err(e) = writer.close().await {
        tracing::debug!("Error closing connection: {}", e);
    }
    tracing::debug!("Connection closed");
}

/// Run one write unless the writer is stopped first
async fn until_stopped<F>(stop: &CancellationToken, write: F) -> Option<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = stop.cancelled() => None,
        result = write => Some(result),
    }
}
