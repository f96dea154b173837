// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime preview: a last-resort textual snapshot of an agent's current
//! visible output, extracted from the terminal multiplexer's screen buffer
//! (glossary "Runtime preview"). Used by the `latest <pid>` socket request
//! when no telemetry or session file is available.
//!
//! Dumps the mux pane via a `capture-pane`-style external command and cleans
//! the result with the same text-cleaning rules as the session file parser
//! (C4) — this is deliberately not a live virtual-terminal emulator (see
//! DESIGN.md on dropping `avt`).

use std::process::Command;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::session_file::{cap_text, clean_text};

/// Mux/terminal command timeout, per §5 resource bounds.
const COMMAND_TIMEOUT: Duration = Duration::from_millis(1200);

/// Per-PID cache TTL, per §5 "runtime preview with 4s TTL".
const CACHE_TTL: Duration = Duration::from_secs(4);

struct CacheEntry {
    text: String,
    at: Instant,
}

/// Small per-scanner cache so repeated `latest` polls don't re-shell out
/// every tick. Capacity matches the session-file cache's LRU-cap guidance
/// but a simple map is sufficient here given the short TTL does the bulk of
/// the work of keeping it bounded.
#[derive(Default)]
pub struct PreviewCache {
    entries: Mutex<std::collections::HashMap<u32, CacheEntry>>,
}

impl PreviewCache {
    pub fn get_or_capture(&self, mux: &str, session: Option<&str>, pid: u32) -> Option<(String, Option<i64>)> {
        {
            let guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = guard.get(&pid) {
                if entry.at.elapsed() < CACHE_TTL {
                    return Some((entry.text.clone(), None));
                }
            }
        }
        let (text, ts) = capture(mux, session, pid)?;
        let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        guard.insert(pid, CacheEntry { text: text.clone(), at: Instant::now() });
        Some((text, ts))
    }
}

/// Capture the pane/window content for `mux`/`session` and clean it with the
/// same rules C4 applies to session-transcript text. No timestamp is known
/// for a live capture, so the second element is always `None`.
pub fn capture(mux: &str, session: Option<&str>, pid: u32) -> Option<(String, Option<i64>)> {
    let raw = match mux {
        "tmux" => capture_tmux(session, pid),
        "screen" => capture_screen(session),
        "zellij" => capture_zellij(session),
        _ => None,
    }?;
    let cleaned = clean_text(&raw);
    if cleaned.is_empty() {
        return None;
    }
    Some((cap_text(&cleaned), None))
}

fn capture_tmux(session: Option<&str>, pid: u32) -> Option<String> {
    let target = session.map(str::to_owned).unwrap_or_else(|| pid.to_string());
    run_with_timeout("tmux", &["capture-pane", "-p", "-t", &target])
}

fn capture_screen(session: Option<&str>) -> Option<String> {
    // `screen` has no direct stdout capture-pane equivalent; `hardcopy` writes
    // to a file, which is out of scope for this best-effort preview path.
    let _ = session;
    None
}

fn capture_zellij(session: Option<&str>) -> Option<String> {
    let mut args = vec!["action", "dump-screen", "/dev/stdout"];
    if let Some(session) = session {
        return run_with_timeout("zellij", &["--session", session, "action", "dump-screen", "/dev/stdout"]);
    }
    run_with_timeout("zellij", &args.split_off(0))
}

fn run_with_timeout(cmd: &str, args: &[&str]) -> Option<String> {
    use std::io::Read;

    let mut child = Command::new(cmd)
        .args(args)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::null())
        .spawn()
        .ok()?;
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    return None;
                }
                let mut buf = String::new();
                if let Some(mut stdout) = child.stdout.take() {
                    let _ = stdout.read_to_string(&mut buf);
                }
                return Some(buf);
            }
            Ok(None) => {
                if start.elapsed() >= COMMAND_TIMEOUT {
                    let _ = child.kill();
                    return None;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(_) => return None,
        }
    }
}

#[cfg(test)]
#[path = "runtime_preview_tests.rs"]
mod tests;
