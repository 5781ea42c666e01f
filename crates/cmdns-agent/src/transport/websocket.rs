//! WebSocket transport
//!
//! Dials the measurement service and splits the socket into the reader and
//! writer halves the session works with.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use cmdns_core::traits::{FrameReader, FrameWriter, Transport};
use cmdns_core::{ConnectionError, ServerEndpoint};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dial the measurement service
///
/// There is no retry: a failed or timed-out dial is returned to the caller.
pub async fn connect(
    endpoint: &ServerEndpoint,
    timeout: Duration,
) -> Result<Transport, ConnectionError> {
    let url = endpoint.url();
    tracing::info!("Connecting to {}", url);

    let (stream, response) = tokio::time::timeout(timeout, connect_async(url.as_str()))
        .await
        .map_err(|_| ConnectionError::Timeout(url.clone()))?
        .map_err(|e| ConnectionError::Dial {
            url: url.clone(),
            reason: e.to_string(),
        })?;

    tracing::debug!("WebSocket handshake complete ({})", response.status());

    Ok(from_stream(stream))
}

/// Split an established WebSocket into transport halves
pub(crate) fn from_stream<S>(stream: WebSocketStream<S>) -> Transport
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let (sink, stream) = stream.split();
    Transport::new(
        Box::new(WsReader { stream }),
        Box::new(WsWriter { sink }),
    )
}

/// Inbound half of the WebSocket
struct WsReader<S = MaybeTlsStream<TcpStream>> {
    stream: SplitStream<WebSocketStream<S>>,
}

#[async_trait]
impl<S> FrameReader for WsReader<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    async fn next_frame(&mut self) -> Option<Result<Bytes, ConnectionError>> {
        loop {
            match self.stream.next().await? {
                Ok(WsMessage::Text(text)) => return Some(Ok(Bytes::from(text))),
                Ok(WsMessage::Binary(data)) => return Some(Ok(Bytes::from(data))),
                Ok(WsMessage::Close(frame)) => {
                    tracing::debug!("Peer closed the connection: {:?}", frame);
                    return None;
                }
                // Pings are answered by tungstenite itself
                Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) | Ok(WsMessage::Frame(_)) => {
                    continue
                }
                Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => return None,
                Err(e) => return Some(Err(ConnectionError::Read(e.to_string()))),
            }
        }
    }
}

/// Outbound half of the WebSocket
struct WsWriter<S = MaybeTlsStream<TcpStream>> {
    sink: SplitSink<WebSocketStream<S>, WsMessage>,
}

#[async_trait]
impl<S> FrameWriter for WsWriter<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    async fn send_text(&mut self, text: String) -> Result<(), ConnectionError> {
        self.sink
            .send(WsMessage::Text(text))
            .await
            .map_err(write_error)
    }

    async fn send_close(&mut self) -> Result<(), ConnectionError> {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        self.sink
            .send(WsMessage::Close(Some(frame)))
            .await
            .map_err(write_error)
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        match self.sink.close().await {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(write_error(e)),
        }
    }
}

fn write_error(e: WsError) -> ConnectionError {
    match e {
        WsError::ConnectionClosed | WsError::AlreadyClosed => ConnectionError::Closed,
        other => ConnectionError::Write(other.to_string()),
    }
}
