// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process Table Reader (C1): a single platform query producing `ProcessRow`s.
//! Rows with malformed numeric fields are dropped silently; empty output is a
//! legal, non-error result. No retries.

use std::fs;
use std::path::Path;

use crate::agent::ProcessRow;

/// Enumerate every process visible to this user via `/proc`.
pub fn read_process_table() -> Vec<ProcessRow> {
    let Ok(entries) = fs::read_dir("/proc") else {
        return Vec::new();
    };

    let mut rows = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(pid_str) = name.to_str() else { continue };
        let Ok(pid) = pid_str.parse::<u32>() else { continue };
        if let Some(row) = read_one(pid) {
            rows.push(row);
        }
    }
    rows
}

fn read_one(pid: u32) -> Option<ProcessRow> {
    let proc_dir = Path::new("/proc").join(pid.to_string());
    let stat = fs::read_to_string(proc_dir.join("stat")).ok()?;
    let (comm, rest) = split_stat(&stat)?;
    let fields: Vec<&str> = rest.split_whitespace().collect();
    // `rest` starts at field 3 (state); ppid is field 4, utime field 14, stime
    // field 15, starttime field 22 — all 1-indexed in `man proc`, here 0-indexed
    // from `state`.
    let state = fields.first()?.chars().next().unwrap_or('?');
    let ppid: u32 = fields.get(1)?.parse().ok()?;
    let utime: u64 = fields.get(11)?.parse().unwrap_or(0);
    let stime: u64 = fields.get(12)?.parse().unwrap_or(0);
    let starttime: u64 = fields.get(19)?.parse().unwrap_or(0);

    let cpu = estimate_cpu_percent(utime, stime, starttime);
    let tty = controlling_tty(&proc_dir);
    let args = read_cmdline(&proc_dir, &comm);

    Some(ProcessRow { pid, ppid, comm, state, tty, cpu, args })
}

/// `stat` format is `pid (comm) state ppid ...`; `comm` may itself contain
/// spaces or parens, so split on the *last* `)` rather than tokenizing naively.
fn split_stat(stat: &str) -> Option<(String, &str)> {
    let open = stat.find('(')?;
    let close = stat.rfind(')')?;
    if close <= open {
        return None;
    }
    let comm = stat[open + 1..close].to_owned();
    Some((comm, stat[close + 1..].trim_start()))
}

fn clock_ticks_per_sec() -> u64 {
    100 // _SC_CLK_TCK is 100 on every Linux platform this daemon targets
}

fn system_uptime_secs() -> f64 {
    fs::read_to_string("/proc/uptime")
        .ok()
        .and_then(|s| s.split_whitespace().next().map(str::to_owned))
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0)
}

/// Approximate instantaneous CPU% the way `ps` does for a one-shot sample:
/// total scheduled time over the process's wall-clock lifetime so far.
fn estimate_cpu_percent(utime: u64, stime: u64, starttime: u64) -> f64 {
    let ticks = clock_ticks_per_sec() as f64;
    let total_time = (utime + stime) as f64 / ticks;
    let elapsed = system_uptime_secs() - (starttime as f64 / ticks);
    if elapsed <= 0.0 {
        return 0.0;
    }
    ((total_time / elapsed) * 100.0).max(0.0)
}

/// Controlling TTY device leaf name, `"??"` if detached or unreadable.
fn controlling_tty(proc_dir: &Path) -> String {
    for fd in ["0", "1", "2"] {
        if let Ok(target) = fs::read_link(proc_dir.join("fd").join(fd)) {
            if let Some(name) = target.to_str().and_then(|s| s.strip_prefix("/dev/")) {
                if name.starts_with("tty") || name.starts_with("pts/") {
                    return name.to_owned();
                }
            }
        }
    }
    "??".to_owned()
}

fn read_cmdline(proc_dir: &Path, comm: &str) -> String {
    match fs::read(proc_dir.join("cmdline")) {
        Ok(bytes) if !bytes.is_empty() => bytes
            .split(|&b| b == 0)
            .filter(|s| !s.is_empty())
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .collect::<Vec<_>>()
            .join(" "),
        _ => comm.to_owned(),
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
