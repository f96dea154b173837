// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Telemetry Reader (C3): read per-instance JSON files from a known
//! directory, filtered by liveness and staleness, with a CLI-fallback path
//! when zero valid files are found.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use nix::sys::signal::kill;
use nix::unistd::Pid;

use crate::agent::TelemetryInstance;
use crate::config::runtime_dir;

/// Fallback CLI timeout, per §4.3.
const FALLBACK_TIMEOUT: Duration = Duration::from_millis(1200);

pub fn default_telemetry_dir() -> PathBuf {
    runtime_dir().unwrap_or_else(|| PathBuf::from("/tmp")).join("telemetry").join("instances")
}

/// Read every valid telemetry instance from `dir`, falling back to the
/// `pi-telemetry-snapshot` CLI if no files parse.
pub fn read_telemetry(dir: &Path, stale_ms: u64) -> Vec<TelemetryInstance> {
    let instances = read_directory(dir, stale_ms);
    if !instances.is_empty() {
        return instances;
    }
    read_fallback_cli(stale_ms)
}

fn read_directory(dir: &Path, stale_ms: u64) -> Vec<TelemetryInstance> {
    let Ok(entries) = std::fs::read_dir(dir) else { return Vec::new() };
    let now_ms = now_ms();

    let mut out = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Ok(raw) = std::fs::read_to_string(&path) else { continue };
        let Ok(instance) = serde_json::from_str::<TelemetryInstance>(&raw) else { continue };
        if is_valid(&instance, now_ms, stale_ms) {
            out.push(instance);
        }
    }
    out
}

fn is_valid(instance: &TelemetryInstance, now_ms: f64, stale_ms: u64) -> bool {
    if instance.process.pid <= 0 {
        return false;
    }
    if !is_alive(instance.process.pid as u32) {
        return false;
    }
    now_ms - instance.process.updated_at <= stale_ms as f64
}

fn is_alive(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

fn now_ms() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as f64
}

#[derive(Debug, serde::Deserialize)]
struct FallbackSnapshot {
    #[serde(default)]
    instances: Vec<TelemetryInstance>,
}

fn read_fallback_cli(stale_ms: u64) -> Vec<TelemetryInstance> {
    let output = run_with_timeout("pi-telemetry-snapshot", FALLBACK_TIMEOUT);
    let Some(output) = output else { return Vec::new() };
    let Ok(snapshot) = serde_json::from_slice::<FallbackSnapshot>(&output) else { return Vec::new() };
    let now_ms = now_ms();
    snapshot.instances.into_iter().filter(|i| is_valid(i, now_ms, stale_ms)).collect()
}

/// Run `cmd` to completion, but give up and return `None` once `timeout`
/// elapses — there is no portable async `Command` in std, so this polls
/// `try_wait` from a helper thread join with a bounded wait.
fn run_with_timeout(cmd: &str, timeout: Duration) -> Option<Vec<u8>> {
    use std::io::Read;

    let mut child =
        Command::new(cmd).stdout(std::process::Stdio::piped()).stderr(std::process::Stdio::null()).spawn().ok()?;
    let start = std::time::Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(_)) => {
                let mut buf = Vec::new();
                if let Some(mut stdout) = child.stdout.take() {
                    let _ = stdout.read_to_end(&mut buf);
                }
                return Some(buf);
            }
            Ok(None) => {
                if start.elapsed() >= timeout {
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
#[path = "telemetry_tests.rs"]
mod tests;
