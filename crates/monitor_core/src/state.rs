use std::collections::VecDeque;

use serde_json::{Map, Value};

use crate::classify::Update;
use crate::view_model::MonitorViewModel;
use crate::{
    ConnectionState, JobKind, JobSession, JobStage, PredictionProgress, SampleCounts, SessionId,
    StageInfo, StageMachine, TerminalOutcome, TrainingLog, ValidationMetrics,
};

pub const DEFAULT_TRANSCRIPT_LIMIT: usize = 500;

/// Tracks which session owns the socket.
///
/// `requested` is set from the moment a connect is issued until the socket
/// reports closed (CONNECTING or OPEN); `established` only while OPEN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ConnectionGuards {
    pub(crate) requested: Option<SessionId>,
    pub(crate) established: Option<SessionId>,
}

/// Aggregate monitor state. Mutated only through [`crate::update`].
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorState {
    stage: StageMachine,
    connection: ConnectionState,
    host_kind: JobKind,
    session: Option<JobSession>,
    last_session_id: SessionId,
    pub(crate) guards: ConnectionGuards,
    progress: f64,
    current_epoch: Option<u32>,
    logs: TrainingLog,
    samples: SampleCounts,
    model_name: Option<String>,
    hyperparameters: Option<Map<String, Value>>,
    stage_info: StageInfo,
    data_split: Option<Map<String, Value>>,
    validation: Option<ValidationMetrics>,
    prediction: PredictionProgress,
    outcome: Option<TerminalOutcome>,
    transcript: VecDeque<String>,
    transcript_limit: usize,
    dirty: bool,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::with_transcript_limit(DEFAULT_TRANSCRIPT_LIMIT)
    }
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transcript_limit(transcript_limit: usize) -> Self {
        Self {
            stage: StageMachine::new(),
            connection: ConnectionState::Disconnected,
            host_kind: JobKind::Idle,
            session: None,
            last_session_id: 0,
            guards: ConnectionGuards::default(),
            progress: 0.0,
            current_epoch: None,
            logs: TrainingLog::new(),
            samples: SampleCounts::default(),
            model_name: None,
            hyperparameters: None,
            stage_info: StageInfo::default(),
            data_split: None,
            validation: None,
            prediction: PredictionProgress::default(),
            outcome: None,
            transcript: VecDeque::new(),
            transcript_limit,
            dirty: false,
        }
    }

    /// State for monitoring jobs of an already trained model: the stage starts
    /// at `Completed`, so only prediction can be started.
    pub fn for_trained_model(transcript_limit: usize) -> Self {
        Self {
            stage: StageMachine::after_training(),
            ..Self::with_transcript_limit(transcript_limit)
        }
    }

    pub fn view(&self) -> MonitorViewModel {
        MonitorViewModel {
            stage: self.stage.stage(),
            connection: self.connection,
            session: self.session.clone(),
            progress: self.progress,
            current_epoch: self.current_epoch,
            logs: self.logs.entries().to_vec(),
            samples: self.samples.clone(),
            model_name: self.model_name.clone(),
            hyperparameters: self.hyperparameters.clone(),
            stage_info: self.stage_info.clone(),
            data_split: self.data_split.clone(),
            validation: self.validation.clone(),
            prediction: self.prediction.clone(),
            outcome: self.outcome.clone(),
            transcript: self.transcript.iter().cloned().collect(),
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn stage(&self) -> JobStage {
        self.stage.stage()
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn session(&self) -> Option<&JobSession> {
        self.session.as_ref()
    }

    /// A session has ended and its socket is gone.
    pub fn is_settled(&self) -> bool {
        self.session.as_ref().is_some_and(|session| !session.active)
            && self.guards.requested.is_none()
    }

    /// True while a socket for `session` is connecting or open.
    pub fn is_connection_requested(&self, session: SessionId) -> bool {
        self.guards.requested == Some(session)
    }

    pub(crate) fn host_kind(&self) -> JobKind {
        self.host_kind
    }

    pub(crate) fn set_host_kind(&mut self, kind: JobKind) {
        self.host_kind = kind;
    }

    pub(crate) fn stage_machine_mut(&mut self) -> &mut StageMachine {
        &mut self.stage
    }

    /// The session if it has not yet reached a terminal outcome or been stopped.
    pub(crate) fn active_session(&self) -> Option<&JobSession> {
        self.session.as_ref().filter(|session| session.active)
    }

    /// Events for any other session come from a socket that is being torn down.
    pub(crate) fn current_session(&self, id: SessionId) -> Option<&JobSession> {
        self.session.as_ref().filter(|session| session.id == id)
    }

    pub(crate) fn deactivate_session(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.active = false;
        }
        self.dirty = true;
    }

    /// Clears everything derived from a previous session and opens a new one.
    pub(crate) fn begin_session(&mut self, kind: JobKind) -> Option<JobSession> {
        let endpoint = kind.endpoint()?;
        self.last_session_id += 1;
        let session = JobSession {
            id: self.last_session_id,
            kind,
            endpoint,
            active: true,
        };
        self.progress = 0.0;
        self.current_epoch = None;
        self.logs.clear();
        self.samples = SampleCounts::default();
        self.model_name = None;
        self.hyperparameters = None;
        self.stage_info = StageInfo::default();
        self.data_split = None;
        self.validation = None;
        self.prediction = PredictionProgress::default();
        self.outcome = None;
        self.transcript.clear();
        self.session = Some(session.clone());
        self.dirty = true;
        Some(session)
    }

    pub(crate) fn set_connection(&mut self, connection: ConnectionState) -> bool {
        if self.connection == connection {
            return false;
        }
        self.connection = connection;
        self.dirty = true;
        true
    }

    pub(crate) fn record_outcome(&mut self, outcome: TerminalOutcome) {
        self.outcome = Some(outcome);
        self.dirty = true;
    }

    pub(crate) fn push_transcript(&mut self, line: String) {
        if self.transcript_limit == 0 {
            return;
        }
        while self.transcript.len() >= self.transcript_limit {
            self.transcript.pop_front();
        }
        self.transcript.push_back(line);
        self.dirty = true;
    }

    /// Applies a non-terminal update for a session of `kind`.
    pub(crate) fn apply(&mut self, kind: JobKind, update: Update) {
        match update {
            Update::Progress { progress, epoch } => match kind {
                JobKind::Prediction => self.prediction.progress = progress,
                _ => {
                    self.progress = progress;
                    if epoch.is_some() {
                        self.current_epoch = epoch;
                    }
                }
            },
            Update::LogEntry(entry) => self.logs.merge(entry),
            Update::SampleCounts(counts) => self.samples.absorb(&counts),
            Update::ModelInfo { name } => self.model_name = Some(name),
            Update::Hyperparameters(params) => self.hyperparameters = Some(params),
            Update::Stage(info) => {
                if kind == JobKind::Prediction {
                    if info.stage.is_some() {
                        self.prediction.stage.clone_from(&info.stage);
                    }
                    if info.message.is_some() {
                        self.prediction.message.clone_from(&info.message);
                    }
                }
                self.stage_info.absorb(&info);
            }
            Update::DataSplit(split) => self.data_split = Some(split),
            Update::ValidationMetrics(metrics) => self.validation = Some(metrics),
            Update::Steps { current, total } => {
                self.prediction.current_step = Some(current);
                self.prediction.total_steps = Some(total);
            }
            Update::Terminal(outcome) => self.record_outcome(outcome),
        }
        self.dirty = true;
    }

    /// Forces the progress display of a session lost mid-flight into a failed state.
    pub(crate) fn mark_connection_lost(&mut self, kind: JobKind, message: &str) {
        match kind {
            JobKind::Prediction => {
                self.prediction.progress = 100.0;
                self.prediction.stage = Some("failed".to_string());
                self.prediction.message = Some(message.to_string());
            }
            _ => {
                self.progress = 100.0;
            }
        }
        self.stage_info.stage = Some("failed".to_string());
        self.stage_info.message = Some(message.to_string());
        self.dirty = true;
    }
}
