//! WebSocket Transport Adapter
//!
//! Implements the [`Transport`] port over `tokio-tungstenite`. Text frames
//! are surfaced to the client; WebSocket control frames are handled here
//! (pings are answered transparently, close frames and stream errors become
//! `Disconnected` events).

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{ConnectionEvent, Transport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Conn {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
}

/// WebSocket transport for one endpoint.
pub struct WsTransport {
    url: String,
    conn: Option<Conn>,
    announce_connected: bool,
}

impl WsTransport {
    /// Create a transport for the given WebSocket URL.
    #[must_use]
    pub const fn new(url: String) -> Self {
        Self {
            url,
            conn: None,
            announce_connected: false,
        }
    }

    /// The endpoint this transport connects to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        tracing::info!(url = %self.url, "Connecting");
        let (stream, _response) = tokio_tungstenite::connect_async(&self.url)
            .await
            .map_err(|e| TransportError::Open(e.to_string()))?;

        let (write, read) = stream.split();
        self.conn = Some(Conn { write, read });
        self.announce_connected = true;
        Ok(())
    }

    async fn send(&mut self, frame: &str) -> Result<(), TransportError> {
        let conn = self.conn.as_mut().ok_or(TransportError::NotConnected)?;
        conn.write
            .send(Message::text(frame))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        conn.write
            .send(Message::Close(None))
            .await
            .map_err(|e| TransportError::Close(e.to_string()))?;
        conn.write
            .close()
            .await
            .map_err(|e| TransportError::Close(e.to_string()))
    }

    async fn next_event(&mut self) -> Option<ConnectionEvent> {
        if self.announce_connected {
            self.announce_connected = false;
            return Some(ConnectionEvent::Connected);
        }

        let reason = {
            let conn = self.conn.as_mut()?;
            loop {
                match conn.read.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return Some(ConnectionEvent::Frame(text.to_string()));
                    }
                    Some(Ok(Message::Ping(data))) => {
                        // A failed pong will surface as a read error.
                        let _ = conn.write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(frame))) => break close_reason(frame),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break e.to_string(),
                    None => break "stream ended".to_string(),
                }
            }
        };

        self.conn = None;
        Some(ConnectionEvent::Disconnected { reason })
    }
}

fn close_reason(frame: Option<CloseFrame>) -> String {
    frame.map_or_else(
        || "closed by server".to_string(),
        |f| format!("closed by server: {} ({})", f.reason, u16::from(f.code)),
    )
}
