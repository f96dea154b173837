// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Primary mux injection (§4.7 step 2): issue the mux-specific "write
//! characters" command followed by a carriage-return command.

use std::process::Command;
use std::time::{Duration, Instant};

/// Per-command timeout, per §4.7/§5.
const MUX_COMMAND_TIMEOUT: Duration = Duration::from_millis(1200);

/// Send `text` followed by Enter to a mux session/pane. Returns whether both
/// the write-chars and carriage-return commands succeeded.
pub fn send_to_mux(mux: &str, session: Option<&str>, text: &str) -> bool {
    match mux {
        "tmux" => send_tmux(session, text),
        "screen" => send_screen(session, text),
        "zellij" => send_zellij(session, text),
        _ => false,
    }
}

fn send_tmux(session: Option<&str>, text: &str) -> bool {
    let Some(session) = session else { return false };
    run_ok("tmux", &["send-keys", "-t", session, "-l", text])
        && run_ok("tmux", &["send-keys", "-t", session, "Enter"])
}

fn send_screen(session: Option<&str>, text: &str) -> bool {
    let Some(session) = session else { return false };
    run_ok("screen", &["-S", session, "-X", "stuff", text])
        && run_ok("screen", &["-S", session, "-X", "stuff", "\r"])
}

fn send_zellij(session: Option<&str>, text: &str) -> bool {
    let base: Vec<String> = match session {
        Some(session) => vec!["--session".to_owned(), session.to_owned()],
        None => vec![],
    };
    let mut write_chars = base.clone();
    write_chars.extend(["action".to_owned(), "write-chars".to_owned(), text.to_owned()]);
    let mut write_enter = base;
    write_enter.extend(["action".to_owned(), "write".to_owned(), "13".to_owned()]);

    run_ok_owned("zellij", &write_chars) && run_ok_owned("zellij", &write_enter)
}

fn run_ok(cmd: &str, args: &[&str]) -> bool {
    run_child(Command::new(cmd).args(args))
}

fn run_ok_owned(cmd: &str, args: &[String]) -> bool {
    run_child(Command::new(cmd).args(args))
}

fn run_child(cmd: &mut Command) -> bool {
    let mut child = match cmd
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(_) => return false,
    };

    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return status.success(),
            Ok(None) => {
                if start.elapsed() >= MUX_COMMAND_TIMEOUT {
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
#[path = "mux_command_tests.rs"]
mod tests;
