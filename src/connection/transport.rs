//! Transport seam between the connection manager and the network

use futures::StreamExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::{Result, TimingError};

/// An open streaming connection to a bridge.
#[async_trait::async_trait]
pub trait Link: Send {
    /// Wait for the next text message.
    ///
    /// Returns:
    /// - `Some(Ok(text))` - a message arrived
    /// - `Some(Err(e))` - the transport failed; the link is unusable afterwards
    /// - `None` - the bridge closed the connection
    ///
    /// Must be cancel safe: dropping the future loses no message.
    async fn next_message(&mut self) -> Option<Result<String>>;

    /// Close the connection. Closing an already-closed link is a no-op.
    async fn close(&mut self);
}

/// Opens links to a bridge endpoint.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Perform the open handshake with `url`.
    ///
    /// Resolves once the link is open. Failures are reported as
    /// [`TimingError::ConnectFailed`]. Timeouts are applied by the caller.
    async fn open(&self, url: &str) -> Result<Box<dyn Link>>;
}

/// WebSocket connector used against real bridges.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait::async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> Result<Box<dyn Link>> {
        debug!("Opening WebSocket handshake with {}", url);

        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| TimingError::connect_failed_with_source("handshake failed", Box::new(e)))?;

        debug!("WebSocket handshake complete (status {})", response.status());
        Ok(Box::new(WsLink { stream, closed: false }))
    }
}

struct WsLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

#[async_trait::async_trait]
impl Link for WsLink {
    async fn next_message(&mut self) -> Option<Result<String>> {
        if self.closed {
            return None;
        }

        while let Some(message) = self.stream.next().await {
            match message {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => {
                    return Some(Ok(String::from_utf8_lossy(&bytes).into_owned()));
                }
                Ok(Message::Close(frame)) => {
                    debug!("Bridge sent close frame: {:?}", frame);
                    self.closed = true;
                    return None;
                }
                Ok(other) => {
                    trace!("Ignoring control message: {:?}", other);
                }
                Err(e) => {
                    self.closed = true;
                    return Some(Err(TimingError::connection_lost_with_source(
                        "WebSocket error",
                        Box::new(e),
                    )));
                }
            }
        }

        self.closed = true;
        None
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        const CLOSE_GRACE: Duration = Duration::from_secs(1);
        match tokio::time::timeout(CLOSE_GRACE, self.stream.close(None)).await {
            Ok(Ok(())) => debug!("WebSocket closed"),
            Ok(Err(e)) => debug!("WebSocket close failed: {}", e),
            Err(_) => debug!("WebSocket close timed out, dropping stream"),
        }
    }
}
