use super::*;

#[test]
fn run_ok_returns_false_for_missing_binary() {
    assert!(!run_ok("definitely-not-a-real-binary-xyz", &["--help"]));
}

#[test]
fn run_ok_true_for_successful_command() {
    assert!(run_ok("true", &[]));
}

#[test]
fn run_ok_false_for_failing_command() {
    assert!(!run_ok("false", &[]));
}

#[test]
fn focus_by_tty_is_unsupported_on_this_platform() {
    let adapter = SystemTerminalAdapter;
    assert!(!adapter.focus_by_tty("ttys003"));
}

#[test]
fn run_terminal_script_is_unsupported_on_this_platform() {
    let adapter = SystemTerminalAdapter;
    assert!(!adapter.run_terminal_script("hello", "ttys003", "iTerm2"));
}
