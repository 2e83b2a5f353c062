use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::ChannelError;

/// Receive side of one open socket.
#[async_trait::async_trait]
pub trait FrameSource: Send {
    /// Next text frame. `None` once the peer has closed the socket.
    async fn next_frame(&mut self) -> Option<Result<String, ChannelError>>;

    async fn close(&mut self);
}

#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<Box<dyn FrameSource>, ChannelError>;
}

#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait::async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn FrameSource>, ChannelError> {
        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(ChannelError::InvalidUrl(format!(
                    "unsupported scheme {other}"
                )))
            }
        }
        let (stream, _response) = tokio::time::timeout(
            self.connect_timeout,
            tokio_tungstenite::connect_async(url.as_str()),
        )
        .await
        .map_err(|_| ChannelError::Timeout)?
        .map_err(map_ws_error)?;
        Ok(Box::new(WsFrameSource { stream }))
    }
}

struct WsFrameSource {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait::async_trait]
impl FrameSource for WsFrameSource {
    async fn next_frame(&mut self) -> Option<Result<String, ChannelError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => {
                    return Some(String::from_utf8(bytes).map_err(|_| ChannelError::InvalidUtf8))
                }
                Ok(Message::Close(_)) => return None,
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
                Err(err) => return Some(Err(map_ws_error(err))),
            }
        }
    }

    async fn close(&mut self) {
        // Peer may already be gone.
        let _ = self.stream.close(None).await;
    }
}

fn map_ws_error(err: WsError) -> ChannelError {
    match err {
        WsError::Url(err) => ChannelError::InvalidUrl(err.to_string()),
        WsError::Http(response) => {
            ChannelError::Handshake(format!("http status {}", response.status()))
        }
        WsError::Io(err) => ChannelError::Network(err.to_string()),
        WsError::ConnectionClosed | WsError::AlreadyClosed => {
            ChannelError::Network("connection closed".to_string())
        }
        other => ChannelError::Protocol(other.to_string()),
    }
}
