use std::time::Duration;

use thiserror::Error;

pub type SessionId = u64;

/// Events reported by the socket task of one session, in arrival order.
///
/// Every session that was asked to connect ends with exactly one `Closed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Opened { session: SessionId },
    Frame { session: SessionId, text: String },
    Failed { session: SessionId, error: ChannelError },
    Closed { session: SessionId },
}

impl ChannelEvent {
    pub fn session(&self) -> SessionId {
        match self {
            ChannelEvent::Opened { session }
            | ChannelEvent::Frame { session, .. }
            | ChannelEvent::Failed { session, .. }
            | ChannelEvent::Closed { session } => *session,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("handshake rejected: {0}")]
    Handshake(String),
    #[error("connect timed out")]
    Timeout,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("network error: {0}")]
    Network(String),
    /// Binary frame that is not UTF-8 text. The socket stays open.
    #[error("binary frame is not valid utf-8")]
    InvalidUtf8,
}

#[derive(Debug, Clone)]
pub struct ChannelSettings {
    /// Wait between a terminal outcome and closing the socket.
    pub grace_delay: Duration,
    pub connect_timeout: Duration,
    /// Bound on waiting for the socket task when the handle is dropped.
    pub shutdown_timeout: Duration,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            grace_delay: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}
