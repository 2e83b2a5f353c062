use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    ConnectionState, JobSession, JobStage, PredictionProgress, SampleCounts, StageInfo,
    TerminalOutcome, TrainingLogEntry, ValidationMetrics,
};

/// Snapshot of the monitor handed to rendering layers.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MonitorViewModel {
    pub stage: JobStage,
    pub connection: ConnectionState,
    pub session: Option<JobSession>,
    pub progress: f64,
    pub current_epoch: Option<u32>,
    pub logs: Vec<TrainingLogEntry>,
    pub samples: SampleCounts,
    pub model_name: Option<String>,
    pub hyperparameters: Option<Map<String, Value>>,
    pub stage_info: StageInfo,
    pub data_split: Option<Map<String, Value>>,
    pub validation: Option<ValidationMetrics>,
    pub prediction: PredictionProgress,
    pub outcome: Option<TerminalOutcome>,
    pub transcript: Vec<String>,
    #[serde(skip)]
    pub dirty: bool,
}
