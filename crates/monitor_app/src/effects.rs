use monitor_core::{ConnectionState, Effect, JobKind, Msg, TerminalOutcome};
use monitor_engine::{ChannelEvent, ChannelHandle};
use monitor_logging::{monitor_debug, monitor_info, monitor_warn};

type StatusCallback = Box<dyn FnMut(ConnectionState)>;
type OutcomeCallback = Box<dyn FnMut(&TerminalOutcome)>;

/// Host notifications. Replacing them never touches the socket: frames are
/// routed through the monitor, and the callbacks are looked up at call time.
#[derive(Default)]
pub struct MonitorCallbacks {
    pub on_connection_status_change: Option<StatusCallback>,
    pub on_training_complete: Option<OutcomeCallback>,
    pub on_prediction_complete: Option<OutcomeCallback>,
}

impl MonitorCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_connection_status_change(
        mut self,
        callback: impl FnMut(ConnectionState) + 'static,
    ) -> Self {
        self.on_connection_status_change = Some(Box::new(callback));
        self
    }

    pub fn on_training_complete(mut self, callback: impl FnMut(&TerminalOutcome) + 'static) -> Self {
        self.on_training_complete = Some(Box::new(callback));
        self
    }

    pub fn on_prediction_complete(
        mut self,
        callback: impl FnMut(&TerminalOutcome) + 'static,
    ) -> Self {
        self.on_prediction_complete = Some(Box::new(callback));
        self
    }
}

/// Executes core effects against the socket thread and the host callbacks.
pub(crate) struct EffectRunner {
    channel: ChannelHandle,
    base_url: String,
    pub(crate) callbacks: MonitorCallbacks,
}

impl EffectRunner {
    pub(crate) fn new(channel: ChannelHandle, base_url: String) -> Self {
        Self {
            channel,
            base_url,
            callbacks: MonitorCallbacks::default(),
        }
    }

    pub(crate) fn channel(&self) -> &ChannelHandle {
        &self.channel
    }

    /// Runs `effects` in order. Returns follow-up messages for failures that
    /// happen before a socket exists.
    pub(crate) fn run(&mut self, effects: Vec<Effect>) -> Vec<Msg> {
        let mut follow_up = Vec::new();
        for effect in effects {
            match effect {
                Effect::Connect { session, endpoint } => {
                    match endpoint.resolve(&self.base_url) {
                        Ok(url) => {
                            monitor_info!("Connect session={} url={}", session, url);
                            self.channel.connect(session, url);
                        }
                        Err(err) => {
                            monitor_warn!("Connect session={} failed: {}", session, err);
                            follow_up.push(Msg::ConnectionFailed {
                                session,
                                message: err.to_string(),
                            });
                            follow_up.push(Msg::ConnectionClosed { session });
                        }
                    }
                }
                Effect::CloseAfterGrace { session } => {
                    monitor_debug!("CloseAfterGrace session={}", session);
                    self.channel.close_after_grace(session);
                }
                Effect::CloseNow { session } => {
                    monitor_debug!("CloseNow session={}", session);
                    self.channel.close_now(session);
                }
                Effect::ConnectionStatusChanged(status) => {
                    if let Some(callback) = self.callbacks.on_connection_status_change.as_mut() {
                        callback(status);
                    }
                }
                Effect::JobFinished { kind, outcome } => {
                    monitor_info!("{:?} finished success={}", kind, outcome.success);
                    let callback = match kind {
                        JobKind::Training => self.callbacks.on_training_complete.as_mut(),
                        JobKind::Prediction => self.callbacks.on_prediction_complete.as_mut(),
                        JobKind::Idle => None,
                    };
                    if let Some(callback) = callback {
                        callback(&outcome);
                    }
                }
            }
        }
        follow_up
    }
}

pub(crate) fn map_event(event: ChannelEvent) -> Msg {
    match event {
        ChannelEvent::Opened { session } => Msg::ConnectionOpened { session },
        ChannelEvent::Frame { session, text } => Msg::Frame {
            session,
            payload: text,
        },
        ChannelEvent::Failed { session, error } => Msg::ConnectionFailed {
            session,
            message: error.to_string(),
        },
        ChannelEvent::Closed { session } => Msg::ConnectionClosed { session },
    }
}
