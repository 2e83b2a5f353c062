use std::collections::VecDeque;
use std::time::Duration;

use monitor_core::{
    update, ConnectionState, FlagConflict, JobKind, JobStage, MonitorState, MonitorViewModel, Msg,
};
use monitor_engine::ChannelHandle;
use monitor_logging::set_session_tag;

use crate::config::MonitorConfig;
use crate::effects::{map_event, EffectRunner, MonitorCallbacks};

/// Host-facing monitor for one job at a time.
///
/// The host reports which job it is running via [`JobMonitor::set_job`] and
/// drives IO with [`JobMonitor::pump`] or [`JobMonitor::wait`]; callbacks run on
/// the calling thread.
pub struct JobMonitor {
    state: MonitorState,
    runner: EffectRunner,
}

impl JobMonitor {
    pub fn new(config: &MonitorConfig) -> Self {
        let state = MonitorState::with_transcript_limit(config.transcript_limit);
        Self::with_channel(config, state, ChannelHandle::new(config.channel_settings()))
    }

    /// Monitor for a model trained earlier, ready to follow a prediction.
    pub fn for_trained_model(config: &MonitorConfig) -> Self {
        let state = MonitorState::for_trained_model(config.transcript_limit);
        Self::with_channel(config, state, ChannelHandle::new(config.channel_settings()))
    }

    pub fn with_channel(config: &MonitorConfig, state: MonitorState, channel: ChannelHandle) -> Self {
        Self {
            state,
            runner: EffectRunner::new(channel, config.server_url.clone()),
        }
    }

    /// Replaces the host callbacks. The open socket, if any, is kept.
    pub fn set_callbacks(&mut self, callbacks: MonitorCallbacks) {
        self.runner.callbacks = callbacks;
    }

    pub fn set_job(&mut self, kind: JobKind) {
        self.dispatch(Msg::JobRequested(kind));
    }

    /// Legacy two-flag form of [`JobMonitor::set_job`].
    pub fn set_flags(&mut self, is_training: bool, is_predicting: bool) -> Result<(), FlagConflict> {
        let kind = JobKind::from_flags(is_training, is_predicting)?;
        self.set_job(kind);
        Ok(())
    }

    /// Applies every pending socket event. Returns whether the view changed
    /// since the last pump.
    pub fn pump(&mut self) -> bool {
        while let Some(event) = self.runner.channel().try_recv() {
            set_session_tag(event.session());
            self.dispatch(map_event(event));
        }
        self.state.consume_dirty()
    }

    /// Blocks up to `timeout` for the next socket event, then pumps.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        if let Some(event) = self.runner.channel().recv_timeout(timeout) {
            set_session_tag(event.session());
            self.dispatch(map_event(event));
        }
        self.pump()
    }

    pub fn view(&self) -> MonitorViewModel {
        self.state.view()
    }

    pub fn stage(&self) -> JobStage {
        self.state.stage()
    }

    pub fn connection(&self) -> ConnectionState {
        self.state.connection()
    }

    /// The last session has ended and its socket is closed.
    pub fn is_settled(&self) -> bool {
        self.state.is_settled()
    }

    fn dispatch(&mut self, msg: Msg) {
        let mut pending = VecDeque::from([msg]);
        while let Some(msg) = pending.pop_front() {
            let state = std::mem::take(&mut self.state);
            let (state, effects) = update(state, msg);
            self.state = state;
            pending.extend(self.runner.run(effects));
        }
    }
}

impl Drop for JobMonitor {
    fn drop(&mut self) {
        self.dispatch(Msg::Unmount);
    }
}
