// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mux/Terminal Inference (C5): classify an agent's containing multiplexer
//! and session name by ancestor walk, locate the mux client PID, and detect
//! the host terminal application.

use std::collections::{HashMap, HashSet};

use crate::agent::ProcessRow;

const MAX_ANCESTOR_HOPS: u32 = 20;

const MUX_MARKERS: &[&str] = &["zellij", "tmux", "screen"];

const TERMINAL_MARKERS: &[&str] =
    &["iTerm2", "Terminal", "alacritty", "kitty", "wezterm", "gnome-terminal", "konsole", "foot"];

/// Walk ancestors of `pid` up to `MAX_ANCESTOR_HOPS`, calling `visit` on each
/// ancestor's row. Explicit `visited` set guards against PID-reuse cycles —
/// this is never modeled as recursion per the design notes.
fn walk_ancestors<'a>(pid: u32, by_pid: &'a HashMap<u32, ProcessRow>, mut visit: impl FnMut(&'a ProcessRow) -> bool) {
    let mut visited = HashSet::new();
    let mut current = pid;
    for _ in 0..MAX_ANCESTOR_HOPS {
        let Some(row) = by_pid.get(&current) else { break };
        if !visited.insert(current) {
            break;
        }
        if !visit(row) {
            return;
        }
        if row.ppid == 0 || row.ppid == current {
            break;
        }
        current = row.ppid;
    }
}

/// Result of classifying an agent's containing multiplexer.
#[derive(Debug, Clone, Default)]
pub struct MuxClassification {
    pub mux: Option<String>,
    pub mux_session: Option<String>,
}

/// First ancestor whose argv contains a mux marker wins; partial/unknown
/// session names return a bare mux tag with no session.
pub fn classify_mux(pid: u32, by_pid: &HashMap<u32, ProcessRow>) -> MuxClassification {
    let mut result = MuxClassification::default();
    walk_ancestors(pid, by_pid, |row| {
        for marker in MUX_MARKERS {
            if argv_mentions(&row.args, marker) {
                result.mux = Some((*marker).to_owned());
                result.mux_session = extract_session_name(&row.args, marker);
                return false;
            }
        }
        true
    });
    result
}

fn argv_mentions(args: &str, marker: &str) -> bool {
    args.split_whitespace().next().map(|first| first.ends_with(marker)).unwrap_or(false)
        || args.contains(marker)
}

/// Extract a session name from argv flags per mux convention:
/// `-s`/`--session` (zellij), `-L`/`-S` or `-t`/`--target` (tmux/screen).
fn extract_session_name(args: &str, marker: &str) -> Option<String> {
    let tokens: Vec<&str> = args.split_whitespace().collect();
    let flags: &[&str] = match marker {
        "zellij" => &["-s", "--session"],
        "tmux" => &["-L", "-S", "-t", "--target"],
        "screen" => &["-S"],
        _ => &[],
    };
    for (i, tok) in tokens.iter().enumerate() {
        if flags.contains(tok) {
            return tokens.get(i + 1).map(|s| s.to_string());
        }
        if let Some((flag, value)) = tok.split_once('=') {
            if flags.contains(&flag) {
                return Some(value.to_owned());
            }
        }
    }
    None
}

/// Scan the process list for a process whose argv contains the mux binary
/// name (excluding its server flag) AND either the session string or shares
/// the agent's TTY.
pub fn find_mux_client_pid(
    by_pid: &HashMap<u32, ProcessRow>,
    mux: &str,
    session: Option<&str>,
    agent_tty: &str,
) -> Option<u32> {
    by_pid
        .values()
        .filter(|row| row.args.contains(mux) && !row.args.contains("--server") && !row.args.contains("-D"))
        .find(|row| {
            let matches_session = session.map(|s| row.args.contains(s)).unwrap_or(false);
            let matches_tty = agent_tty != "??" && row.tty == agent_tty;
            matches_session || matches_tty
        })
        .map(|row| row.pid)
}

/// Walk ancestors of `pid` looking for a known terminal executable name in
/// `comm` or `args`. Returns `(app_name, ancestor_pid)`.
pub fn detect_terminal_app(pid: u32, by_pid: &HashMap<u32, ProcessRow>) -> (Option<String>, Option<u32>) {
    let mut found = (None, None);
    walk_ancestors(pid, by_pid, |row| {
        for marker in TERMINAL_MARKERS {
            if row.comm.contains(marker) || row.args.contains(marker) {
                found = (Some((*marker).to_owned()), Some(row.pid));
                return false;
            }
        }
        true
    });
    found
}

#[cfg(test)]
#[path = "mux_tests.rs"]
mod tests;
