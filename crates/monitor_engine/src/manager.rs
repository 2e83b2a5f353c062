use std::sync::Arc;
use std::time::Duration;

use monitor_logging::{monitor_debug, monitor_info, monitor_warn};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::socket::{Connector, FrameSource};
use crate::{ChannelError, ChannelEvent, SessionId};

pub trait EventSink: Send + Sync {
    fn emit(&self, event: ChannelEvent);
}

pub struct ChannelEventSink {
    tx: std::sync::mpsc::Sender<ChannelEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: std::sync::mpsc::Sender<ChannelEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: ChannelEvent) {
        let _ = self.tx.send(event);
    }
}

struct ActiveSocket {
    session: SessionId,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the single socket of a monitoring channel.
///
/// At most one socket task is alive at a time: a socket for a new session
/// waits for the previous one to finish closing before it connects. A session
/// gets at most one socket over its lifetime; there is no reconnect.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    sink: Arc<dyn EventSink>,
    runtime: Handle,
    current: Option<ActiveSocket>,
    sockets_created: usize,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, sink: Arc<dyn EventSink>, runtime: Handle) -> Self {
        Self {
            connector,
            sink,
            runtime,
            current: None,
            sockets_created: 0,
        }
    }

    /// Creates a socket for `session` unless it already has one.
    /// Returns whether a new socket was created.
    pub fn ensure_connected(&mut self, session: SessionId, url: Url) -> bool {
        if let Some(current) = &self.current {
            if current.session == session {
                monitor_debug!("session {} already has a socket", session);
                return false;
            }
        }

        let previous = self.current.take().map(|old| {
            monitor_info!("closing socket of session {} for session {}", old.session, session);
            old.cancel.cancel();
            old.task
        });
        let cancel = CancellationToken::new();
        let task = self.runtime.spawn(run_socket(
            session,
            url,
            self.connector.clone(),
            self.sink.clone(),
            cancel.clone(),
            previous,
        ));
        self.current = Some(ActiveSocket {
            session,
            cancel,
            task,
        });
        self.sockets_created += 1;
        true
    }

    /// Closes the socket of `session` once `delay` has passed. Frames that
    /// arrive in the meantime are still delivered.
    pub fn close_after(&mut self, session: SessionId, delay: Duration) {
        let Some(current) = self.current.as_ref().filter(|c| c.session == session) else {
            monitor_debug!("grace close for session {} without a socket", session);
            return;
        };
        let cancel = current.cancel.clone();
        self.runtime.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => cancel.cancel(),
                _ = cancel.cancelled() => {}
            }
        });
    }

    pub fn close_now(&mut self, session: SessionId) {
        match self.current.as_ref().filter(|c| c.session == session) {
            Some(current) => current.cancel.cancel(),
            None => monitor_debug!("close for session {} without a socket", session),
        }
    }

    /// True while the socket of `session` is connecting or open.
    pub fn is_live(&self, session: SessionId) -> bool {
        self.current
            .as_ref()
            .is_some_and(|c| c.session == session && !c.task.is_finished())
    }

    pub fn sockets_created(&self) -> usize {
        self.sockets_created
    }

    /// Cancels whatever is open and hands back its task so the caller can
    /// wait for the close to go out.
    pub fn shutdown(&mut self) -> Option<JoinHandle<()>> {
        self.current.take().map(|current| {
            current.cancel.cancel();
            current.task
        })
    }
}

async fn run_socket(
    session: SessionId,
    url: Url,
    connector: Arc<dyn Connector>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        let _ = previous.await;
    }

    let connected = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = connector.connect(&url) => Some(result),
    };
    let mut source = match connected {
        Some(Ok(source)) => source,
        Some(Err(error)) => {
            monitor_warn!("connect to {} failed: {}", url, error);
            sink.emit(ChannelEvent::Failed { session, error });
            sink.emit(ChannelEvent::Closed { session });
            return;
        }
        None => {
            sink.emit(ChannelEvent::Closed { session });
            return;
        }
    };
    monitor_info!("connected to {}", url);
    sink.emit(ChannelEvent::Opened { session });

    pump_frames(session, source.as_mut(), sink.as_ref(), &cancel).await;
    sink.emit(ChannelEvent::Closed { session });
}

async fn pump_frames(
    session: SessionId,
    source: &mut dyn FrameSource,
    sink: &dyn EventSink,
    cancel: &CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                source.close().await;
                return;
            }
            frame = source.next_frame() => match frame {
                Some(Ok(text)) => sink.emit(ChannelEvent::Frame { session, text }),
                Some(Err(ChannelError::InvalidUtf8)) => {
                    monitor_warn!("dropping non-utf-8 frame on session {}", session);
                }
                Some(Err(error)) => {
                    sink.emit(ChannelEvent::Failed { session, error });
                    return;
                }
                None => {
                    monitor_debug!("peer closed socket of session {}", session);
                    return;
                }
            }
        }
    }
}
