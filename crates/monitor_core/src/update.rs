use monitor_logging::{monitor_debug, monitor_info, monitor_warn};
use serde_json::Value;

use crate::classify::{classify, transcript_line, Update};
use crate::{ConnectionState, Effect, JobKind, MonitorState, Msg, SessionId, TerminalOutcome};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: MonitorState, msg: Msg) -> (MonitorState, Vec<Effect>) {
    let mut effects = Vec::new();
    match msg {
        Msg::JobRequested(kind) => {
            if kind == state.host_kind() {
                return (state, effects);
            }
            state.set_host_kind(kind);

            if let Some(active) = state.active_session().cloned() {
                monitor_info!("stopping {:?} session {} on host request", active.kind, active.id);
                if let Err(err) = state.stage_machine_mut().cancel() {
                    monitor_warn!("stop request ignored by stage machine: {}", err);
                }
                state.deactivate_session();
                if state.is_connection_requested(active.id) {
                    effects.push(Effect::CloseNow { session: active.id });
                }
            }

            if kind != JobKind::Idle {
                start_session(&mut state, kind, &mut effects);
            }
        }
        Msg::Frame { session, payload } => {
            let Some(kind) = state.current_session(session).map(|s| s.kind) else {
                monitor_debug!("dropping frame from stale session {}", session);
                return (state, effects);
            };
            let frame: Value = match serde_json::from_str(&payload) {
                Ok(frame) => frame,
                Err(err) => {
                    monitor_warn!("dropping malformed frame ({}): {:.120}", err, payload);
                    return (state, effects);
                }
            };
            state.push_transcript(transcript_line(&frame));
            for update in classify(&frame, kind) {
                match update {
                    Update::Terminal(outcome) => {
                        finish_session(&mut state, session, kind, outcome, &mut effects);
                    }
                    other => state.apply(kind, other),
                }
            }
        }
        Msg::ConnectionOpened { session } => {
            if state.is_connection_requested(session) {
                state.guards.established = Some(session);
                if state.set_connection(ConnectionState::Connected) {
                    effects.push(Effect::ConnectionStatusChanged(ConnectionState::Connected));
                }
                monitor_info!("socket open for session {}", session);
            }
        }
        Msg::ConnectionFailed { session, message } => {
            if state.is_connection_requested(session) {
                monitor_warn!("socket error on session {}: {}", session, message);
                if state.set_connection(ConnectionState::Error) {
                    effects.push(Effect::ConnectionStatusChanged(ConnectionState::Error));
                }
            }
        }
        Msg::ConnectionClosed { session } => {
            if state.guards.established == Some(session) {
                state.guards.established = None;
                if state.set_connection(ConnectionState::Disconnected) {
                    effects.push(Effect::ConnectionStatusChanged(ConnectionState::Disconnected));
                }
            }
            if !state.is_connection_requested(session) {
                monitor_debug!("close of superseded socket {}", session);
                return (state, effects);
            }
            state.guards.requested = None;
            if state.set_connection(ConnectionState::Disconnected) {
                effects.push(Effect::ConnectionStatusChanged(ConnectionState::Disconnected));
            }
            monitor_info!("socket closed for session {}", session);

            let lost = state
                .active_session()
                .filter(|active| active.id == session)
                .map(|active| active.kind);
            if let Some(kind) = lost {
                let message = match kind {
                    JobKind::Prediction => "Connection lost during prediction",
                    _ => "Connection lost during training",
                };
                monitor_warn!("{}", message);
                state.mark_connection_lost(kind, message);
                let outcome = TerminalOutcome::failed(message);
                finish_session(&mut state, session, kind, outcome, &mut effects);
            }
        }
        Msg::Unmount => {
            if let Some(session) = state.guards.requested.take() {
                effects.push(Effect::CloseNow { session });
            }
            state.set_host_kind(JobKind::Idle);
            if state.active_session().is_some() {
                if let Err(err) = state.stage_machine_mut().cancel() {
                    monitor_warn!("unmount ignored by stage machine: {}", err);
                }
                state.deactivate_session();
            }
        }
        Msg::NoOp => {}
    }
    (state, effects)
}

fn start_session(state: &mut MonitorState, kind: JobKind, effects: &mut Vec<Effect>) {
    if let Err(err) = state.stage_machine_mut().start(kind) {
        monitor_warn!("not starting {:?} session: {}", kind, err);
        return;
    }
    let Some(session) = state.begin_session(kind) else {
        return;
    };
    monitor_info!("starting {:?} session {}", kind, session.id);

    // A socket still draining from the previous session must go first.
    if let Some(previous) = state.guards.requested.filter(|id| *id != session.id) {
        effects.push(Effect::CloseNow { session: previous });
    }
    ensure_connected(state, session.id, session.endpoint, effects);
}

fn ensure_connected(
    state: &mut MonitorState,
    session: SessionId,
    endpoint: crate::Endpoint,
    effects: &mut Vec<Effect>,
) {
    if state.is_connection_requested(session) {
        return;
    }
    state.guards.requested = Some(session);
    state.guards.established = None;
    effects.push(Effect::Connect { session, endpoint });
}

fn finish_session(
    state: &mut MonitorState,
    session: SessionId,
    kind: JobKind,
    outcome: TerminalOutcome,
    effects: &mut Vec<Effect>,
) {
    if let Err(err) = state.stage_machine_mut().finish(kind, outcome.success) {
        monitor_warn!("ignoring terminal message: {}", err);
        return;
    }
    monitor_info!(
        "{:?} session {} finished (success={})",
        kind,
        session,
        outcome.success
    );
    state.deactivate_session();
    state.record_outcome(outcome.clone());
    effects.push(Effect::JobFinished { kind, outcome });
    if state.is_connection_requested(session) {
        effects.push(Effect::CloseAfterGrace { session });
    }
}
