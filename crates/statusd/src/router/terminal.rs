// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal/focus adapter (§6.3) — the external collaborator the core treats
//! as best-effort booleans. Out of scope per §1 ("the platform-specific
//! terminal focus/automation ... adds no systems-design value"); this module
//! is a thin Linux adapter over `xdotool`/`wmctrl` so the rest of the router
//! has something real to call, not a stub that always fails.

use std::process::Command;
use std::time::Duration;

const FOCUS_TIMEOUT: Duration = Duration::from_millis(1200);

/// The operations an external terminal/window-manager collaborator exposes
/// to the core (§6.3). None of these propagate errors to callers — every
/// outcome is collapsed to a boolean.
pub trait TerminalAdapter: Send + Sync {
    fn focus_by_pid(&self, terminal_pid: u32, hints: &[String]) -> bool;
    fn focus_by_tty(&self, tty: &str) -> bool;
    fn focus_by_title(&self, hint: &str) -> bool;
    fn open_shell(&self, command: Option<&str>, cwd: Option<&str>) -> bool;
    fn run_terminal_script(&self, text: &str, tty: &str, app: &str) -> bool;
    fn inject_keystrokes(
        &self,
        text: &str,
        app: &str,
        hints: &[String],
        app_pid: Option<u32>,
        tty: Option<&str>,
    ) -> bool;
}

/// Best-effort Linux implementation shelling out to `xdotool`/`wmctrl` when
/// present. Every method degrades to `false` rather than erroring — callers
/// treat this the same as any other failed transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTerminalAdapter;

impl TerminalAdapter for SystemTerminalAdapter {
    fn focus_by_pid(&self, terminal_pid: u32, hints: &[String]) -> bool {
        if run_ok("xdotool", &["search", "--pid", &terminal_pid.to_string(), "windowactivate"]) {
            return true;
        }
        hints.iter().any(|hint| self.focus_by_title(hint))
    }

    fn focus_by_tty(&self, tty: &str) -> bool {
        // No portable tty→window mapping exists without an app-specific
        // helper (e.g. iTerm2's AppleScript dictionary); this daemon targets
        // Linux window managers, where that mapping does not exist at all.
        let _ = tty;
        false
    }

    fn focus_by_title(&self, hint: &str) -> bool {
        run_ok("xdotool", &["search", "--name", hint, "windowactivate"])
    }

    fn open_shell(&self, command: Option<&str>, cwd: Option<&str>) -> bool {
        let mut cmd = Command::new("x-terminal-emulator");
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }
        if let Some(command) = command {
            cmd.args(["-e", command]);
        }
        cmd.stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .is_ok()
    }

    fn run_terminal_script(&self, text: &str, tty: &str, app: &str) -> bool {
        // No generic pane-scripting facility exists outside app-specific
        // automation dictionaries (iTerm2/AppleScript); without one, this
        // transport has nothing real to do on this platform.
        let _ = (text, tty, app);
        false
    }

    fn inject_keystrokes(
        &self,
        text: &str,
        app: &str,
        hints: &[String],
        app_pid: Option<u32>,
        tty: Option<&str>,
    ) -> bool {
        let _ = (app, tty);
        let focused = app_pid.map(|pid| self.focus_by_pid(pid, hints)).unwrap_or(false)
            || hints.iter().any(|hint| self.focus_by_title(hint));
        if !focused {
            return false;
        }
        if !run_ok("xdotool", &["type", "--clearmodifiers", text]) {
            return false;
        }
        run_ok("xdotool", &["key", "Return"])
    }
}

fn run_ok(cmd: &str, args: &[&str]) -> bool {
    use std::io::ErrorKind;

    let mut child = match Command::new(cmd)
        .args(args)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) if e.kind() == ErrorKind::NotFound => return false,
        Err(_) => return false,
    };

    let start = std::time::Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return status.success(),
            Ok(None) => {
                if start.elapsed() >= FOCUS_TIMEOUT {
                    let _ = child.kill();
                    return false;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(_) => return false,
        }
    }
}

#[cfg(test)]
#[path = "terminal_tests.rs"]
mod tests;
