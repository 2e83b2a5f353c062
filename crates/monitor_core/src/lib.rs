//! Monitor core: pure job-monitoring state machine and view-model helpers.
mod classify;
mod effect;
mod job;
mod logs;
mod msg;
mod records;
mod stage;
mod state;
mod update;
mod view_model;

pub use classify::{classify, transcript_line, Update};
pub use effect::Effect;
pub use job::{Endpoint, EndpointError, FlagConflict, JobKind, JobSession, SessionId};
pub use logs::{TrainingLog, TrainingLogEntry};
pub use msg::Msg;
pub use records::{
    ConnectionState, PredictionProgress, SampleCounts, StageInfo, TerminalOutcome,
    ValidationMetrics,
};
pub use stage::{JobStage, StageError, StageMachine};
pub use state::{MonitorState, DEFAULT_TRANSCRIPT_LIMIT};
pub use update::update;
pub use view_model::MonitorViewModel;
