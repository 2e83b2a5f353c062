//! Field-presence classification of inbound progress frames.
//!
//! The job runner does not wrap its messages in a single tagged envelope, so
//! a frame is matched against every rule of the active job kind and all
//! matching rules contribute updates. Order within a rule set only affects
//! the order of the returned updates.

use serde_json::{Map, Value};

use crate::{
    JobKind, SampleCounts, StageInfo, TerminalOutcome, TrainingLogEntry, ValidationMetrics,
};

/// A semantic update derived from one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Progress { progress: f64, epoch: Option<u32> },
    LogEntry(TrainingLogEntry),
    SampleCounts(SampleCounts),
    ModelInfo { name: String },
    Hyperparameters(Map<String, Value>),
    Stage(StageInfo),
    DataSplit(Map<String, Value>),
    ValidationMetrics(ValidationMetrics),
    Steps { current: u64, total: u64 },
    Terminal(TerminalOutcome),
}

/// Classifies a frame for a session of `kind`. Non-object frames and idle
/// sessions yield nothing.
pub fn classify(frame: &Value, kind: JobKind) -> Vec<Update> {
    let Some(object) = frame.as_object() else {
        return Vec::new();
    };
    let rules = match kind {
        JobKind::Training => TRAINING_RULES,
        JobKind::Prediction => PREDICTION_RULES,
        JobKind::Idle => return Vec::new(),
    };
    let frame = Frame(object);
    let mut updates = Vec::new();
    for rule in rules {
        if (rule.applies)(&frame) {
            monitor_logging::monitor_trace!("frame matched rule {}", rule.name);
            (rule.emit)(&frame, &mut updates);
        }
    }
    updates
}

/// The line recorded in the raw transcript for a frame.
pub fn transcript_line(frame: &Value) -> String {
    match frame.get("message").and_then(Value::as_str) {
        Some(message) => message.to_string(),
        None => frame.to_string(),
    }
}

struct Rule {
    name: &'static str,
    applies: fn(&Frame<'_>) -> bool,
    emit: fn(&Frame<'_>, &mut Vec<Update>),
}

const TRAINING_RULES: &[Rule] = &[
    Rule {
        name: "progress",
        applies: |f| f.has("progress"),
        emit: emit_training_progress,
    },
    Rule {
        name: "legacy_training_progress",
        applies: |f| f.type_is("training_progress") && f.has("loss") && f.has("epoch"),
        emit: |f, out| out.extend(log_entry(f).map(Update::LogEntry)),
    },
    Rule {
        name: "sample_count",
        applies: |f| {
            f.type_is("sample_count") || f.has("p_sample_count") || f.has("u_sample_count")
        },
        emit: |f, out| out.push(Update::SampleCounts(sample_counts(f))),
    },
    Rule {
        name: "model_info",
        applies: |f| f.type_is("model_info"),
        emit: |f, out| {
            if let Some(name) = f.string("model_name") {
                out.push(Update::ModelInfo { name });
            }
        },
    },
    Rule {
        name: "hyperparameters",
        applies: |f| f.object("hyperparameters").is_some(),
        emit: |f, out| out.extend(f.object("hyperparameters").cloned().map(Update::Hyperparameters)),
    },
    Rule {
        name: "stage",
        applies: |f| f.has("stage") || f.has("substage"),
        emit: |f, out| out.push(Update::Stage(stage_info(f))),
    },
    Rule {
        name: "data_split_info",
        applies: |f| f.type_is("data_split_info") || f.has("data_split_info"),
        emit: |f, out| {
            let split = f.object("data_split_info").or_else(|| f.object("split_info"));
            out.extend(split.cloned().map(Update::DataSplit));
        },
    },
    Rule {
        name: "validation_metrics",
        applies: |f| f.type_is("validation_metrics"),
        emit: |f, out| out.push(Update::ValidationMetrics(validation_metrics(f))),
    },
    Rule {
        name: "training_failed",
        applies: |f| f.type_is("training_failed"),
        emit: |f, out| out.push(Update::Terminal(failure(f))),
    },
    Rule {
        name: "training_completed",
        applies: |f| {
            !f.type_is("training_failed")
                && (f.type_is("training_completed")
                    || f.progress_done()
                    || f.message_contains("training completed successfully"))
        },
        emit: |f, out| out.push(Update::Terminal(success(f))),
    },
];

const PREDICTION_FAILURE_TYPES: &[&str] = &["evaluation_failed", "prediction_failed"];

const PREDICTION_RULES: &[Rule] = &[
    Rule {
        name: "progress",
        applies: |f| f.has("progress"),
        emit: |f, out| {
            if let Some(progress) = f.number("progress") {
                out.push(Update::Progress {
                    progress,
                    epoch: None,
                });
            }
        },
    },
    Rule {
        name: "steps",
        applies: |f| f.has("current_step") && f.has("total_steps"),
        emit: |f, out| {
            if let (Some(current), Some(total)) = (f.unsigned("current_step"), f.unsigned("total_steps")) {
                out.push(Update::Steps { current, total });
            }
        },
    },
    Rule {
        name: "stage",
        applies: |f| f.has("stage") || f.has("substage"),
        emit: |f, out| out.push(Update::Stage(stage_info(f))),
    },
    Rule {
        name: "prediction_failed",
        applies: |f| PREDICTION_FAILURE_TYPES.iter().any(|t| f.type_is(t)),
        emit: |f, out| out.push(Update::Terminal(failure(f))),
    },
    Rule {
        name: "prediction_completed",
        applies: |f| {
            !PREDICTION_FAILURE_TYPES.iter().any(|t| f.type_is(t))
                && (f.type_is("evaluation_completed")
                    || f.type_is("prediction_completed")
                    || f.progress_done()
                    || f.message_contains("evaluation completed successfully")
                    || f.message_contains("prediction completed successfully"))
        },
        emit: |f, out| out.push(Update::Terminal(success(f))),
    },
];

fn emit_training_progress(f: &Frame<'_>, out: &mut Vec<Update>) {
    let Some(progress) = f.number("progress") else {
        return;
    };
    match log_entry(f) {
        Some(entry) => {
            out.push(Update::Progress {
                progress,
                epoch: Some(entry.epoch),
            });
            out.push(Update::LogEntry(entry));
        }
        None => out.push(Update::Progress {
            progress,
            epoch: None,
        }),
    }
}

fn log_entry(f: &Frame<'_>) -> Option<TrainingLogEntry> {
    let epoch = u32::try_from(f.unsigned("epoch")?).ok()?;
    let loss = f.number("loss")?;
    Some(TrainingLogEntry {
        epoch,
        loss,
        accuracy: f.number("accuracy"),
    })
}

fn sample_counts(f: &Frame<'_>) -> SampleCounts {
    SampleCounts {
        positive: f.unsigned("p_sample_count").or_else(|| f.unsigned("p_samples")),
        unlabeled: f.unsigned("u_sample_count").or_else(|| f.unsigned("u_samples")),
        unlabeled_progress: f.number("u_progress"),
    }
}

fn stage_info(f: &Frame<'_>) -> StageInfo {
    StageInfo {
        stage: f.string("stage"),
        substage: f.string("substage"),
        message: f.string("message"),
    }
}

fn validation_metrics(f: &Frame<'_>) -> ValidationMetrics {
    let metrics = f.object("metrics");
    let metric = |name: &str| metrics.and_then(|m| m.get(name)).and_then(Value::as_f64);
    ValidationMetrics {
        val_accuracy: metric("val_accuracy"),
        val_precision: metric("val_precision"),
        val_recall: metric("val_recall"),
        val_f1: metric("val_f1"),
        sample_count: f.unsigned("sample_count").or_else(|| {
            metrics
                .and_then(|m| m.get("sample_count"))
                .and_then(Value::as_u64)
        }),
    }
}

fn success(f: &Frame<'_>) -> TerminalOutcome {
    TerminalOutcome {
        success: true,
        error: None,
        model_id: f.string("model_id"),
        stage: f.string("stage"),
        message: f.string("message"),
        metrics: f.object("metrics").cloned(),
        sample_count: f.unsigned("sample_count"),
        model_path: f.string("model_path"),
        evaluation_id: f.string("evaluation_id"),
    }
}

fn failure(f: &Frame<'_>) -> TerminalOutcome {
    TerminalOutcome {
        success: false,
        error: f
            .string("error")
            .or_else(|| f.string("message"))
            .or_else(|| Some("job failed".to_string())),
        stage: f.string("stage").or_else(|| Some("failed".to_string())),
        message: f.string("message"),
        ..TerminalOutcome::default()
    }
}

/// Typed field access over a JSON object. `null` counts as absent.
struct Frame<'a>(&'a Map<String, Value>);

impl Frame<'_> {
    fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|value| !value.is_null())
    }

    fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn type_is(&self, expected: &str) -> bool {
        self.get("type").and_then(Value::as_str) == Some(expected)
    }

    fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    /// Accepts integers and integral floats such as `3.0`.
    fn unsigned(&self, name: &str) -> Option<u64> {
        let value = self.get(name)?;
        value.as_u64().or_else(|| {
            value
                .as_f64()
                .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= u64::MAX as f64)
                .map(|n| n as u64)
        })
    }

    /// Strings, plus numbers rendered as strings (ids are sent both ways).
    fn string(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        }
    }

    fn object(&self, name: &str) -> Option<&Map<String, Value>> {
        self.get(name).and_then(Value::as_object)
    }

    fn progress_done(&self) -> bool {
        self.number("progress").is_some_and(|p| p >= 100.0)
    }

    /// Case-insensitive; `needle` must be lowercase.
    fn message_contains(&self, needle: &str) -> bool {
        self.get("message")
            .and_then(Value::as_str)
            .is_some_and(|message| message.to_lowercase().contains(needle))
    }
}
