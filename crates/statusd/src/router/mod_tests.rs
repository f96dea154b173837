use clap::Parser;

use super::*;
use crate::router::terminal::TerminalAdapter;

struct MockAdapter {
    script_ok: bool,
    keystroke_ok: bool,
}

impl TerminalAdapter for MockAdapter {
    fn focus_by_pid(&self, _terminal_pid: u32, _hints: &[String]) -> bool {
        true
    }
    fn focus_by_tty(&self, _tty: &str) -> bool {
        true
    }
    fn focus_by_title(&self, _hint: &str) -> bool {
        true
    }
    fn open_shell(&self, _command: Option<&str>, _cwd: Option<&str>) -> bool {
        true
    }
    fn run_terminal_script(&self, _text: &str, _tty: &str, _app: &str) -> bool {
        self.script_ok
    }
    fn inject_keystrokes(
        &self,
        _text: &str,
        _app: &str,
        _hints: &[String],
        _app_pid: Option<u32>,
        _tty: Option<&str>,
    ) -> bool {
        self.keystroke_ok
    }
}

fn ctx(mux: Option<&str>, tty: &str, terminal_app: Option<&str>) -> RouteContext {
    RouteContext {
        pid: 1,
        message: "hello".to_owned(),
        mux: mux.map(str::to_owned),
        mux_session: mux.map(|_| "agent-foo".to_owned()),
        tty: tty.to_owned(),
        terminal_app: terminal_app.map(str::to_owned),
        terminal_ancestor_pid: Some(2),
        client_pid: None,
        bridge_dir: std::env::temp_dir().join("statusd-router-test-nonexistent"),
        bridge_registry_stale_ms: 10_000,
        bridge_ack_timeout: Duration::from_millis(50),
        bridge_retries: 1,
        bridge_retry_backoff: Duration::from_millis(10),
    }
}

#[test]
fn mux_strategy_skips_without_mux() {
    let c = ctx(None, "ttys001", None);
    let adapter = MockAdapter { script_ok: false, keystroke_ok: false };
    assert!(matches!(MuxStrategy.attempt(&c, &adapter), StrategyOutcome::Skip));
}

#[test]
fn terminal_script_skips_without_app() {
    let c = ctx(None, "ttys001", None);
    let adapter = MockAdapter { script_ok: true, keystroke_ok: true };
    assert!(matches!(TerminalScriptStrategy.attempt(&c, &adapter), StrategyOutcome::Skip));
}

#[test]
fn terminal_script_delivers_when_adapter_succeeds() {
    let c = ctx(None, "ttys001", Some("iTerm2"));
    let adapter = MockAdapter { script_ok: true, keystroke_ok: false };
    assert!(matches!(TerminalScriptStrategy.attempt(&c, &adapter), StrategyOutcome::Delivered { .. }));
}

#[test]
fn tty_input_skips_when_tty_detached() {
    let c = ctx(None, "??", None);
    let adapter = MockAdapter { script_ok: false, keystroke_ok: false };
    assert!(matches!(TtyInputStrategy.attempt(&c, &adapter), StrategyOutcome::Skip));
}

#[test]
fn keystroke_skips_without_terminal_app() {
    let c = ctx(None, "ttys001", None);
    let adapter = MockAdapter { script_ok: false, keystroke_ok: true };
    assert!(matches!(KeystrokeStrategy.attempt(&c, &adapter), StrategyOutcome::Skip));
}

#[test]
fn keystroke_delivers_when_adapter_succeeds() {
    let c = ctx(None, "ttys001", Some("iTerm2"));
    let adapter = MockAdapter { script_ok: false, keystroke_ok: true };
    assert!(matches!(KeystrokeStrategy.attempt(&c, &adapter), StrategyOutcome::Delivered { .. }));
}

#[test]
fn bridge_strategy_skips_when_not_registered() {
    let c = ctx(None, "ttys001", None);
    let adapter = MockAdapter { script_ok: false, keystroke_ok: false };
    assert!(matches!(BridgeStrategy.attempt(&c, &adapter), StrategyOutcome::Skip));
}

#[test]
fn send_rejects_empty_message() {
    let config = Config::parse_from(["statusd"]);
    let adapter = terminal::SystemTerminalAdapter;
    let result = send(&config, &adapter, 999_999, "   ");
    assert!(!result.ok);
    assert_eq!(result.error.as_deref(), Some("message must not be empty"));
}

#[test]
fn send_reports_pid_not_found() {
    let config = Config::parse_from(["statusd"]);
    let adapter = terminal::SystemTerminalAdapter;
    // PID 1 is never comm=="pi" in a test sandbox.
    let result = send(&config, &adapter, 1, "hello");
    assert!(!result.ok);
    assert_eq!(result.error.as_deref(), Some("pid not found"));
}
