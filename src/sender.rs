//! Sender (spec §4.4, second half of C4): given a connected transport,
//! frames each chunk per `wire::encode` and transmits it over the
//! WebSocket session; reads inbound messages and forwards text payloads
//! to the caller verbatim (spec: "Reply parsing (JSON) is delegated to
//! the sink" — the core treats replies as opaque).

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::chunker::Chunk;
use crate::error::TransportError;
use crate::wire;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Something observed on the inbound half of the connection.
#[derive(Debug)]
pub enum InboundEvent {
    /// A text message from the peer, forwarded verbatim (spec: opaque
    /// JSON transcription replies).
    Reply(String),
    /// A binary message was received and ignored (spec §6 wire protocol).
    BinaryIgnored,
    /// The peer closed the connection.
    Closed,
}

pub struct Sender {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

impl Sender {
    /// Connects to `ws_url`, bounded by `connect_timeout` (spec §5: 10s).
    pub async fn connect(ws_url: &str, connect_timeout: Duration) -> Result<Self, TransportError> {
        let attempt = tokio_tungstenite::connect_async(ws_url);
        let (stream, _response) = tokio::time::timeout(connect_timeout, attempt)
            .await
            .map_err(|_| TransportError::ConnectTimeout(connect_timeout))?
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;
        let (sink, stream) = stream.split();
        Ok(Self { sink, stream })
    }

    /// Splits into independent sink/stream borrows so a caller can drive
    /// writes and reads concurrently in the same `select!` (the session
    /// controller's network task does exactly this — a whole-`&mut self`
    /// method can't be awaited from two branches at once).
    pub fn split_mut(
        &mut self,
    ) -> (
        &mut SplitSink<WsStream, Message>,
        &mut SplitStream<WsStream>,
    ) {
        (&mut self.sink, &mut self.stream)
    }

    /// Frames and transmits one chunk as a single binary WebSocket
    /// message (spec: "no fragmentation within a chunk"). A send that
    /// doesn't complete within `send_timeout` is a connection fault.
    pub async fn send_chunk(
        sink: &mut SplitSink<WsStream, Message>,
        chunk: &Chunk,
        send_timeout: Duration,
    ) -> Result<(), TransportError> {
        let frame = wire::encode(
            chunk.sequence_no as u16,
            chunk.captured_at_unix_ms,
            chunk.is_final,
            &chunk.payload,
        );
        tokio::time::timeout(send_timeout, sink.send(Message::Binary(frame)))
            .await
            .map_err(|_| TransportError::SendTimeout(send_timeout))?
            .map_err(TransportError::WebSocket)
    }

    /// Sends a text `ping` heartbeat (spec §4.4: idle NAT-keepalive).
    pub async fn send_heartbeat(
        sink: &mut SplitSink<WsStream, Message>,
    ) -> Result<(), TransportError> {
        sink.send(Message::Text("ping".to_string()))
            .await
            .map_err(TransportError::WebSocket)
    }

    /// Awaits the next inbound message, bounded by `read_idle_timeout`
    /// (spec §5: 60s triggers reconnect).
    pub async fn next_inbound(
        stream: &mut SplitStream<WsStream>,
        read_idle_timeout: Duration,
    ) -> Result<InboundEvent, TransportError> {
        let next = tokio::time::timeout(read_idle_timeout, stream.next())
            .await
            .map_err(|_| TransportError::ReadIdleTimeout(read_idle_timeout))?;

        match next {
            Some(Ok(Message::Text(text))) => Ok(InboundEvent::Reply(text)),
            Some(Ok(Message::Binary(_))) => Ok(InboundEvent::BinaryIgnored),
            Some(Ok(Message::Close(_))) | None => Ok(InboundEvent::Closed),
            Some(Ok(_)) => Ok(InboundEvent::BinaryIgnored),
            Some(Err(e)) => Err(TransportError::WebSocket(e)),
        }
    }

    /// Closes with the given close code (spec §6: 1000 normal, 1001 going
    /// away, 1011 internal error).
    pub async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        self.sink
            .send(Message::Close(Some(frame)))
            .await
            .map_err(TransportError::WebSocket)
    }
}

#[cfg(test)]
mod tests {
    // Connection-level behavior is exercised in `tests/end_to_end.rs`
    // against an in-process echo server; unit-testable logic here is
    // limited to the frame encoding, already covered in `wire`.
}
