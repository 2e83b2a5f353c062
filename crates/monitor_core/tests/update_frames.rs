use std::sync::Once;

use monitor_core::{
    classify, update, Effect, JobKind, JobStage, MonitorState, Msg, SessionId, TrainingLogEntry,
    Update,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(monitor_logging::initialize_for_tests);
}

fn start(state: MonitorState, kind: JobKind) -> (MonitorState, SessionId) {
    let (state, effects) = update(state, Msg::JobRequested(kind));
    let session = effects
        .iter()
        .find_map(|effect| match effect {
            Effect::Connect { session, .. } => Some(*session),
            _ => None,
        })
        .expect("connect effect");
    let (state, _) = update(state, Msg::ConnectionOpened { session });
    (state, session)
}

fn send(state: MonitorState, session: SessionId, payload: serde_json::Value) -> (MonitorState, Vec<Effect>) {
    update(
        state,
        Msg::Frame {
            session,
            payload: payload.to_string(),
        },
    )
}

fn entry(epoch: u32, loss: f64) -> TrainingLogEntry {
    TrainingLogEntry {
        epoch,
        loss,
        accuracy: None,
    }
}

#[test]
fn one_frame_can_carry_several_updates() {
    let frame = json!({"progress": 50, "hyperparameters": {"lr": 0.01, "epochs": 20}});
    let updates = classify(&frame, JobKind::Training);

    assert!(updates.contains(&Update::Progress {
        progress: 50.0,
        epoch: None
    }));
    assert!(updates
        .iter()
        .any(|u| matches!(u, Update::Hyperparameters(params) if params["lr"] == json!(0.01))));
}

#[test]
fn prediction_frames_ignore_training_rules() {
    let frame = json!({"progress": 20, "epoch": 1, "loss": 0.4, "p_sample_count": 3});
    let updates = classify(&frame, JobKind::Prediction);

    assert_eq!(
        updates,
        vec![Update::Progress {
            progress: 20.0,
            epoch: None
        }]
    );
    assert!(classify(&frame, JobKind::Idle).is_empty());
}

#[test]
fn epochs_are_deduplicated_latest_wins() {
    init_logging();
    let (state, session) = start(MonitorState::new(), JobKind::Training);
    let (state, _) = send(state, session, json!({"progress": 10, "epoch": 1, "loss": 0.9}));
    let (state, _) = send(state, session, json!({"progress": 20, "epoch": 2, "loss": 0.5}));
    let (state, _) = send(state, session, json!({"progress": 15, "epoch": 1, "loss": 0.7}));

    let view = state.view();
    assert_eq!(view.logs, vec![entry(1, 0.7), entry(2, 0.5)]);
    // Latest progress is authoritative even when it goes backwards.
    assert_eq!(view.progress, 15.0);
    assert_eq!(view.current_epoch, Some(1));
}

#[test]
fn legacy_progress_envelope_appends_log_without_progress_field() {
    init_logging();
    let (state, session) = start(MonitorState::new(), JobKind::Training);
    let (state, _) = send(
        state,
        session,
        json!({"type": "training_progress", "epoch": 3, "loss": 0.25, "accuracy": 0.91}),
    );

    let view = state.view();
    assert_eq!(
        view.logs,
        vec![TrainingLogEntry {
            epoch: 3,
            loss: 0.25,
            accuracy: Some(0.91)
        }]
    );
    assert_eq!(view.progress, 0.0);
}

#[test]
fn streamed_sample_counts_keep_unknown_fields_unknown() {
    init_logging();
    let (state, session) = start(MonitorState::new(), JobKind::Training);
    let (state, _) = send(state, session, json!({"type": "sample_count", "p_samples": 120}));
    assert_eq!(state.view().samples.positive, Some(120));
    assert_eq!(state.view().samples.unlabeled, None);

    let (state, _) = send(state, session, json!({"u_sample_count": 900, "u_progress": 45.5}));
    let samples = state.view().samples;
    assert_eq!(samples.positive, Some(120));
    assert_eq!(samples.unlabeled, Some(900));
    assert_eq!(samples.unlabeled_progress, Some(45.5));
}

#[test]
fn stage_model_split_and_validation_are_stored() {
    init_logging();
    let (state, session) = start(MonitorState::new(), JobKind::Training);
    let (state, _) = send(
        state,
        session,
        json!({"stage": "loading data", "substage": "generating U samples", "message": "working"}),
    );
    let (state, _) = send(state, session, json!({"type": "model_info", "model_name": "pu-bagging"}));
    let (state, _) = send(
        state,
        session,
        json!({"type": "data_split_info", "split_info": {"train": 800, "val": 200}}),
    );
    let (state, _) = send(
        state,
        session,
        json!({"type": "validation_metrics", "metrics": {"val_accuracy": 0.9, "val_precision": 0.8, "val_recall": 0.7, "val_f1": 0.75}, "sample_count": 200}),
    );
    let (state, _) = send(
        state,
        session,
        json!({"type": "validation_metrics", "metrics": {"val_accuracy": 0.95}, "sample_count": 210}),
    );

    let view = state.view();
    assert_eq!(view.stage_info.stage.as_deref(), Some("loading data"));
    assert_eq!(view.stage_info.substage.as_deref(), Some("generating U samples"));
    assert_eq!(view.model_name.as_deref(), Some("pu-bagging"));
    assert_eq!(view.data_split.unwrap()["train"], json!(800));
    let validation = view.validation.unwrap();
    assert_eq!(validation.val_accuracy, Some(0.95));
    assert_eq!(validation.val_f1, None);
    assert_eq!(validation.sample_count, Some(210));
}

#[test]
fn malformed_frames_are_dropped() {
    init_logging();
    let (state, session) = start(MonitorState::new(), JobKind::Training);
    let (mut state, _) = update(state, Msg::ConnectionOpened { session });
    state.consume_dirty();

    let (mut state, effects) = update(
        state,
        Msg::Frame {
            session,
            payload: "{not json".to_string(),
        },
    );
    assert!(effects.is_empty());
    assert!(!state.consume_dirty());
    assert!(state.view().transcript.is_empty());
}

#[test]
fn every_frame_lands_in_the_transcript() {
    init_logging();
    let (state, session) = start(MonitorState::new(), JobKind::Training);
    let (state, _) = send(state, session, json!({"message": "Loading dataset"}));
    let (state, _) = send(state, session, json!({"unknown": true}));

    assert_eq!(
        state.view().transcript,
        vec!["Loading dataset".to_string(), r#"{"unknown":true}"#.to_string()]
    );
}

#[test]
fn transcript_is_bounded() {
    init_logging();
    let (state, session) = start(MonitorState::with_transcript_limit(2), JobKind::Training);
    let (state, _) = send(state, session, json!({"message": "one"}));
    let (state, _) = send(state, session, json!({"message": "two"}));
    let (state, _) = send(state, session, json!({"message": "three"}));

    assert_eq!(state.view().transcript, vec!["two", "three"]);
}

#[test]
fn completion_message_text_finishes_training() {
    init_logging();
    let (state, session) = start(MonitorState::new(), JobKind::Training);
    let (state, effects) = send(
        state,
        session,
        json!({"message": "Training completed successfully", "model_id": 42}),
    );

    assert_eq!(state.stage(), JobStage::Completed);
    let outcome = state.view().outcome.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.model_id.as_deref(), Some("42"));
    assert!(effects.contains(&Effect::CloseAfterGrace { session }));
}

#[test]
fn terminal_fires_once_and_late_frames_still_apply() {
    init_logging();
    let (state, session) = start(MonitorState::new(), JobKind::Training);
    let (state, first) = send(state, session, json!({"type": "training_completed", "progress": 100}));
    // Arrives inside the grace window.
    let (state, second) = send(
        state,
        session,
        json!({"type": "training_completed", "stage": "saved", "model_path": "/m/1"}),
    );

    let finished = |effects: &[Effect]| {
        effects
            .iter()
            .filter(|e| matches!(e, Effect::JobFinished { .. }))
            .count()
    };
    assert_eq!(finished(&first), 1);
    assert_eq!(finished(&second), 0);
    assert!(!second.contains(&Effect::CloseAfterGrace { session }));
    let view = state.view();
    assert_eq!(view.stage_info.stage.as_deref(), Some("saved"));
    assert_eq!(view.outcome.unwrap().model_path, None);
}

#[test]
fn late_completion_after_failure_is_ignored() {
    init_logging();
    let (state, session) = start(MonitorState::new(), JobKind::Training);
    let (state, _) = send(state, session, json!({"type": "training_failed", "error": "diverged"}));
    let (state, effects) = send(state, session, json!({"type": "training_completed"}));

    assert_eq!(state.stage(), JobStage::Ready);
    assert!(effects.is_empty());
    let outcome = state.view().outcome.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("diverged"));
}

#[test]
fn prediction_completion_carries_metrics() {
    init_logging();
    let (state, training) = start(MonitorState::new(), JobKind::Training);
    let (state, _) = send(state, training, json!({"type": "training_completed"}));
    let (state, _) = update(state, Msg::ConnectionClosed { session: training });
    let (state, session) = start(state, JobKind::Prediction);

    let (state, _) = send(
        state,
        session,
        json!({"type": "prediction_progress", "progress": 40, "current_step": 2, "total_steps": 5, "stage": "scoring", "message": "Scoring candidates"}),
    );
    let prediction = state.view().prediction;
    assert_eq!(prediction.progress, 40.0);
    assert_eq!(prediction.current_step, Some(2));
    assert_eq!(prediction.total_steps, Some(5));
    assert_eq!(prediction.message.as_deref(), Some("Scoring candidates"));

    let (state, effects) = send(
        state,
        session,
        json!({"type": "evaluation_completed", "evaluation_id": "e-7", "sample_count": 512, "metrics": {"auc": 0.93}}),
    );
    assert_eq!(state.stage(), JobStage::Completed);
    let outcome = effects
        .iter()
        .find_map(|effect| match effect {
            Effect::JobFinished {
                kind: JobKind::Prediction,
                outcome,
            } => Some(outcome.clone()),
            _ => None,
        })
        .expect("prediction finished");
    assert!(outcome.success);
    assert_eq!(outcome.evaluation_id.as_deref(), Some("e-7"));
    assert_eq!(outcome.sample_count, Some(512));
    assert_eq!(outcome.metrics.unwrap()["auc"], json!(0.93));
}

#[test]
fn prediction_failure_returns_to_ready() {
    init_logging();
    let (state, training) = start(MonitorState::new(), JobKind::Training);
    let (state, _) = send(state, training, json!({"progress": 100}));
    let (state, _) = update(state, Msg::ConnectionClosed { session: training });
    let (state, session) = start(state, JobKind::Prediction);

    let (state, _) = send(
        state,
        session,
        json!({"type": "prediction_failed", "error": "model file missing"}),
    );
    assert_eq!(state.stage(), JobStage::Ready);
    assert_eq!(
        state.view().outcome.unwrap().error.as_deref(),
        Some("model file missing")
    );
}

#[test]
fn end_to_end_training_scenario() {
    init_logging();
    let (state, session) = start(MonitorState::new(), JobKind::Training);
    let (state, effects) = send(state, session, json!({"progress": 10, "epoch": 1, "loss": 1.2}));
    assert!(effects.is_empty());

    let (state, effects) = send(
        state,
        session,
        json!({"progress": 100, "type": "training_completed", "model_id": "m1"}),
    );

    let view = state.view();
    assert_eq!(view.stage, JobStage::Completed);
    assert_eq!(view.logs, vec![entry(1, 1.2)]);
    assert_eq!(effects.len(), 2);
    match &effects[0] {
        Effect::JobFinished { kind, outcome } => {
            assert_eq!(*kind, JobKind::Training);
            assert!(outcome.success);
            assert_eq!(outcome.model_id.as_deref(), Some("m1"));
        }
        other => panic!("unexpected effect {other:?}"),
    }
    assert_eq!(effects[1], Effect::CloseAfterGrace { session });
}
