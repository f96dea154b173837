use super::*;

fn row(state: char, cpu: f64, tty: &str) -> ProcessRow {
    ProcessRow { pid: 1, ppid: 0, comm: "pi".into(), state, cpu, tty: tty.into(), args: "pi".into() }
}

#[test]
fn telemetry_modern_enum_working_maps_running() {
    let state = TelemetryState { activity: Some("working".into()), ..Default::default() };
    assert_eq!(activity_from_telemetry(Some(&state)), Activity::Running);
}

#[test]
fn telemetry_modern_enum_waiting_input() {
    let state = TelemetryState { activity: Some("waiting_input".into()), ..Default::default() };
    assert_eq!(activity_from_telemetry(Some(&state)), Activity::WaitingInput);
}

#[test]
fn telemetry_legacy_waiting_for_input_true() {
    let state = TelemetryState { waiting_for_input: Some(true), ..Default::default() };
    assert_eq!(activity_from_telemetry(Some(&state)), Activity::WaitingInput);
}

#[test]
fn telemetry_legacy_busy_true_maps_running() {
    let state = TelemetryState { busy: Some(true), ..Default::default() };
    assert_eq!(activity_from_telemetry(Some(&state)), Activity::Running);
}

#[test]
fn telemetry_legacy_is_idle_false_maps_running() {
    let state = TelemetryState { is_idle: Some(false), ..Default::default() };
    assert_eq!(activity_from_telemetry(Some(&state)), Activity::Running);
}

#[test]
fn telemetry_legacy_is_idle_true_maps_unknown() {
    let state = TelemetryState { is_idle: Some(true), ..Default::default() };
    assert_eq!(activity_from_telemetry(Some(&state)), Activity::Unknown);
}

#[test]
fn telemetry_absent_maps_unknown() {
    assert_eq!(activity_from_telemetry(None), Activity::Unknown);
}

#[test]
fn process_running_state_is_high_confidence() {
    assert_eq!(activity_from_process(&row('R', 0.0, "??")), (Activity::Running, Confidence::High));
}

#[test]
fn process_high_cpu_is_medium_confidence_running() {
    assert_eq!(activity_from_process(&row('S', 1.0, "??")), (Activity::Running, Confidence::Medium));
}

#[test]
fn process_sleeping_with_tty_is_waiting_input() {
    assert_eq!(activity_from_process(&row('S', 0.0, "ttys001")), (Activity::WaitingInput, Confidence::Medium));
}

#[test]
fn process_sleeping_without_tty_is_unknown_low() {
    assert_eq!(activity_from_process(&row('S', 0.0, "??")), (Activity::Unknown, Confidence::Low));
}
