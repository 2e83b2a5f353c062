use serde::Serialize;
use thiserror::Error;

use crate::JobKind;

/// Externally observable stage of the monitored job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    #[default]
    Ready,
    Training,
    Predicting,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {action} while {from:?}")]
pub struct StageError {
    pub from: JobStage,
    pub action: &'static str,
}

/// Transition table for the job stage.
///
/// Only the following moves are accepted:
/// `Ready -> Training`, `Completed -> Predicting`, `Training -> Completed | Ready`
/// and `Predicting -> Completed | Ready`. Everything else is rejected so a late
/// terminal message can never overwrite a more recent stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageMachine {
    stage: JobStage,
}

impl StageMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Machine for a model that finished training before this monitor existed.
    pub fn after_training() -> Self {
        Self {
            stage: JobStage::Completed,
        }
    }

    pub fn stage(&self) -> JobStage {
        self.stage
    }

    /// Whether a socket should be open for the current stage.
    pub fn wants_channel(&self) -> bool {
        matches!(self.stage, JobStage::Training | JobStage::Predicting)
    }

    pub fn start(&mut self, kind: JobKind) -> Result<JobStage, StageError> {
        let next = match (self.stage, kind) {
            (JobStage::Ready, JobKind::Training) => JobStage::Training,
            (JobStage::Completed, JobKind::Prediction) => JobStage::Predicting,
            (from, JobKind::Training) => return Err(StageError { from, action: "start training" }),
            (from, JobKind::Prediction) => {
                return Err(StageError { from, action: "start prediction" })
            }
            (from, JobKind::Idle) => return Err(StageError { from, action: "start an idle job" }),
        };
        self.stage = next;
        Ok(next)
    }

    /// Applies a terminal outcome for a job of `kind`.
    pub fn finish(&mut self, kind: JobKind, success: bool) -> Result<JobStage, StageError> {
        let next = match (self.stage, kind, success) {
            (JobStage::Training, JobKind::Training, true) => JobStage::Completed,
            (JobStage::Training, JobKind::Training, false) => JobStage::Ready,
            (JobStage::Predicting, JobKind::Prediction, true) => JobStage::Completed,
            (JobStage::Predicting, JobKind::Prediction, false) => JobStage::Ready,
            (from, _, true) => return Err(StageError { from, action: "complete" }),
            (from, _, false) => return Err(StageError { from, action: "fail" }),
        };
        self.stage = next;
        Ok(next)
    }

    /// Host cancelled a running job. Follows the failure route.
    pub fn cancel(&mut self) -> Result<JobStage, StageError> {
        match self.stage {
            JobStage::Training | JobStage::Predicting => {
                self.stage = JobStage::Ready;
                Ok(JobStage::Ready)
            }
            from => Err(StageError { from, action: "cancel" }),
        }
    }
}
