use serde::Serialize;
use thiserror::Error;
use url::Url;

pub type SessionId = u64;

/// What the host currently wants monitored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    #[default]
    Idle,
    Training,
    Prediction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("host reported training and prediction as running at the same time")]
pub struct FlagConflict;

impl JobKind {
    /// Converts the legacy pair of host flags into a job kind.
    pub fn from_flags(is_training: bool, is_predicting: bool) -> Result<Self, FlagConflict> {
        match (is_training, is_predicting) {
            (true, true) => Err(FlagConflict),
            (true, false) => Ok(JobKind::Training),
            (false, true) => Ok(JobKind::Prediction),
            (false, false) => Ok(JobKind::Idle),
        }
    }

    pub fn endpoint(self) -> Option<Endpoint> {
        match self {
            JobKind::Idle => None,
            JobKind::Training => Some(Endpoint::TrainingProgress),
            JobKind::Prediction => Some(Endpoint::EvaluationProgress),
        }
    }
}

/// Logical progress endpoints exposed by the job runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    TrainingProgress,
    EvaluationProgress,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot resolve endpoint {name} against {base}: {message}")]
pub struct EndpointError {
    pub name: &'static str,
    pub base: String,
    pub message: String,
}

impl Endpoint {
    pub fn name(self) -> &'static str {
        match self {
            Endpoint::TrainingProgress => "training-progress",
            Endpoint::EvaluationProgress => "evaluation-progress",
        }
    }

    /// Joins the endpoint name onto a websocket base URL.
    ///
    /// The base is treated as a directory even without a trailing slash, so
    /// `ws://host/ws` and `ws://host/ws/` both resolve to `ws://host/ws/<name>`.
    pub fn resolve(self, base: &str) -> Result<Url, EndpointError> {
        let fail = |message: String| EndpointError {
            name: self.name(),
            base: base.to_string(),
            message,
        };
        let mut base_url = Url::parse(base).map_err(|err| fail(err.to_string()))?;
        match base_url.scheme() {
            "ws" | "wss" => {}
            other => return Err(fail(format!("unsupported scheme {other}"))),
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        base_url.join(self.name()).map_err(|err| fail(err.to_string()))
    }
}

/// One attempt at either training or prediction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSession {
    pub id: SessionId,
    pub kind: JobKind,
    #[serde(skip)]
    pub endpoint: Endpoint,
    pub active: bool,
}
