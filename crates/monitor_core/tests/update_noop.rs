use monitor_core::{update, JobKind, MonitorState, Msg};

#[test]
fn update_is_noop() {
    let state = MonitorState::new();
    let (next, effects) = update(state.clone(), Msg::NoOp);

    assert_eq!(state, next);
    assert!(effects.is_empty());
}

#[test]
fn idle_request_on_idle_monitor_is_noop() {
    let state = MonitorState::new();
    let (next, effects) = update(state.clone(), Msg::JobRequested(JobKind::Idle));

    assert_eq!(state, next);
    assert!(effects.is_empty());
}
