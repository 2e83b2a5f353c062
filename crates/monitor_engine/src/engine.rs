use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use monitor_logging::monitor_warn;
use url::Url;

use crate::manager::{ChannelEventSink, ConnectionManager};
use crate::socket::{Connector, WsConnector};
use crate::{ChannelEvent, ChannelSettings, SessionId};

enum ChannelCommand {
    Connect { session: SessionId, url: Url },
    CloseAfterGrace { session: SessionId },
    CloseNow { session: SessionId },
    Shutdown,
}

/// Handle to the background thread that owns the monitoring socket.
///
/// Commands are applied in the order they are sent. Dropping the handle
/// force-closes any open socket.
pub struct ChannelHandle {
    cmd_tx: mpsc::Sender<ChannelCommand>,
    event_rx: mpsc::Receiver<ChannelEvent>,
    worker: Option<thread::JoinHandle<()>>,
}

impl ChannelHandle {
    pub fn new(settings: ChannelSettings) -> Self {
        let connector = Arc::new(WsConnector::new(settings.connect_timeout));
        Self::with_connector(settings, connector)
    }

    pub fn with_connector(settings: ChannelSettings, connector: Arc<dyn Connector>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        let worker = thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
            let sink = Arc::new(ChannelEventSink::new(event_tx));
            let mut manager = ConnectionManager::new(connector, sink, runtime.handle().clone());

            while let Ok(command) = cmd_rx.recv() {
                match command {
                    ChannelCommand::Connect { session, url } => {
                        manager.ensure_connected(session, url);
                    }
                    ChannelCommand::CloseAfterGrace { session } => {
                        manager.close_after(session, settings.grace_delay);
                    }
                    ChannelCommand::CloseNow { session } => manager.close_now(session),
                    ChannelCommand::Shutdown => break,
                }
            }

            if let Some(task) = manager.shutdown() {
                let closed = runtime
                    .block_on(async { tokio::time::timeout(settings.shutdown_timeout, task).await });
                if closed.is_err() {
                    monitor_warn!("socket did not close within {:?}", settings.shutdown_timeout);
                }
            }
        });

        Self {
            cmd_tx,
            event_rx,
            worker: Some(worker),
        }
    }

    pub fn connect(&self, session: SessionId, url: Url) {
        let _ = self.cmd_tx.send(ChannelCommand::Connect { session, url });
    }

    pub fn close_after_grace(&self, session: SessionId) {
        let _ = self.cmd_tx.send(ChannelCommand::CloseAfterGrace { session });
    }

    pub fn close_now(&self, session: SessionId) {
        let _ = self.cmd_tx.send(ChannelCommand::CloseNow { session });
    }

    pub fn try_recv(&self) -> Option<ChannelEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<ChannelEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(ChannelCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
