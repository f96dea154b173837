// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File bridge contract (§6.2): a filesystem-based, acknowledged message
//! queue between the daemon and each agent, used when the mux route is
//! unavailable.

use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::sys::signal::kill;
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::runtime_dir;

pub fn default_bridge_dir() -> PathBuf {
    runtime_dir().unwrap_or_else(|| PathBuf::from("/tmp")).join("statusbridge")
}

/// A message queued through the file bridge (§3.3).
#[derive(Debug, Clone, Serialize)]
pub struct BridgeEnvelope {
    pub v: u32,
    pub id: String,
    pub pid: u32,
    pub text: String,
    pub source: &'static str,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: String,
    pub delivery: DeliveryHint,
    pub meta: EnvelopeMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryHint {
    pub mode: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeMeta {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub attempt: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeAck {
    pub status: String,
    #[serde(rename = "resolvedMode")]
    pub resolved_mode: Option<String>,
    pub error: Option<String>,
}

impl BridgeAck {
    pub fn is_delivered(&self) -> bool {
        self.status == "delivered"
    }

    /// `rate_limited`/`bridge_rate_limited`/`pi_rate_limited` are retryable;
    /// every other failure fails fast to prevent double delivery.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self.error.as_deref(),
            Some("rate_limited") | Some("bridge_rate_limited") | Some("pi_rate_limited")
        )
    }
}

/// ISO-8601 ms-precision UTC timestamp, per §3.3.
fn iso_from_ms(ms: u64) -> String {
    let secs = (ms / 1000) as i64;
    let nanos = ((ms % 1000) * 1_000_000) as u32;
    chrono::DateTime::from_timestamp(secs, nanos)
        .unwrap_or_default()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

fn now_ms() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// A bridge registry is live only if `updatedAt` is within the stale window
/// AND the PID passes a signal-0 liveness probe.
pub fn is_registered(bridge_dir: &Path, pid: u32, stale_ms: u64) -> bool {
    let path = bridge_dir.join("registry").join(format!("{pid}.json"));
    let Ok(raw) = std::fs::read_to_string(&path) else { return false };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) else { return false };
    let Some(registered_pid) = value.get("pid").and_then(serde_json::Value::as_u64) else { return false };
    if registered_pid as u32 != pid {
        return false;
    }
    let Some(updated_at) = value.get("updatedAt").and_then(serde_json::Value::as_f64) else { return false };
    if now_ms().saturating_sub(updated_at as u64) > stale_ms {
        return false;
    }
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Enqueue an envelope via temp-write + atomic rename, then poll for an ack.
pub struct BridgeSendOutcome {
    pub ack: BridgeAck,
}

#[derive(Debug)]
pub enum BridgeError {
    Timeout,
    Io(std::io::Error),
}

pub fn send_once(
    bridge_dir: &Path,
    pid: u32,
    text: &str,
    attempt: u32,
    ack_timeout: Duration,
    poll_interval: Duration,
) -> Result<BridgeSendOutcome, BridgeError> {
    let id = Uuid::new_v4().to_string();
    let created_at_ms = now_ms();

    let envelope = BridgeEnvelope {
        v: 1,
        id: id.clone(),
        pid,
        text: text.to_owned(),
        source: "statusbar",
        created_at: iso_from_ms(created_at_ms),
        expires_at: iso_from_ms(created_at_ms + 60_000),
        delivery: DeliveryHint { mode: "interrupt" },
        meta: EnvelopeMeta { request_id: Uuid::new_v4().to_string(), attempt },
    };

    let inbox_dir = bridge_dir.join("inbox").join(pid.to_string());
    std::fs::create_dir_all(&inbox_dir).map_err(BridgeError::Io)?;
    write_atomic(&inbox_dir.join(format!("{id}.json")), &envelope).map_err(BridgeError::Io)?;

    let acks_dir = bridge_dir.join("acks").join(pid.to_string());
    let ack_path = acks_dir.join(format!("{id}.json"));

    let deadline = std::time::Instant::now() + ack_timeout;
    loop {
        if let Ok(raw) = std::fs::read_to_string(&ack_path) {
            if let Ok(ack) = serde_json::from_str::<BridgeAck>(&raw) {
                return Ok(BridgeSendOutcome { ack });
            }
        }
        if std::time::Instant::now() >= deadline {
            return Err(BridgeError::Timeout);
        }
        std::thread::sleep(poll_interval);
    }
}

fn write_atomic(path: &Path, envelope: &BridgeEnvelope) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    use std::io::Write;
    serde_json::to_writer(&mut tmp, envelope)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
