use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Transport state, driven only by socket events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
    Error,
}

/// Sample counts streamed during data preparation. `None` means not yet known.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SampleCounts {
    pub positive: Option<u64>,
    pub unlabeled: Option<u64>,
    pub unlabeled_progress: Option<f64>,
}

impl SampleCounts {
    /// Overwrites only the fields `other` knows about.
    pub fn absorb(&mut self, other: &SampleCounts) {
        if other.positive.is_some() {
            self.positive = other.positive;
        }
        if other.unlabeled.is_some() {
            self.unlabeled = other.unlabeled;
        }
        if other.unlabeled_progress.is_some() {
            self.unlabeled_progress = other.unlabeled_progress;
        }
    }
}

/// Free-form stage labels supplied by the job runner.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StageInfo {
    pub stage: Option<String>,
    pub substage: Option<String>,
    pub message: Option<String>,
}

impl StageInfo {
    pub fn absorb(&mut self, other: &StageInfo) {
        if other.stage.is_some() {
            self.stage.clone_from(&other.stage);
        }
        if other.substage.is_some() {
            self.substage.clone_from(&other.substage);
        }
        if other.message.is_some() {
            self.message.clone_from(&other.message);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub val_accuracy: Option<f64>,
    pub val_precision: Option<f64>,
    pub val_recall: Option<f64>,
    pub val_f1: Option<f64>,
    pub sample_count: Option<u64>,
}

/// Progress of a prediction/evaluation job.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PredictionProgress {
    pub progress: f64,
    pub stage: Option<String>,
    pub message: Option<String>,
    pub current_step: Option<u64>,
    pub total_steps: Option<u64>,
}

/// The success/failure signal that ends a job session.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TerminalOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation_id: Option<String>,
}

impl TerminalOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            stage: Some("failed".to_string()),
            ..Self::default()
        }
    }
}
