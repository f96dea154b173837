// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical record types: `ProcessRow`, `TelemetryInstance`, `Agent`, `Summary`,
//! `ScanResult`. The source dictionaries are dynamically typed end to end; this
//! module is the explicit boundary where that gets pinned into tagged records
//! (per the design notes on "dynamic dictionaries everywhere").

use serde::{Deserialize, Serialize};

/// One row from the process-table enumeration (C1).
#[derive(Debug, Clone)]
pub struct ProcessRow {
    pub pid: u32,
    pub ppid: u32,
    pub comm: String,
    pub state: char,
    pub tty: String,
    pub cpu: f64,
    pub args: String,
}

/// One instance parsed from a telemetry JSON file (C3), already liveness- and
/// staleness-filtered.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryInstance {
    pub process: TelemetryProcess,
    #[serde(default)]
    pub state: Option<TelemetryState>,
    #[serde(default)]
    pub model: Option<TelemetryModel>,
    #[serde(default)]
    pub context: Option<TelemetryContext>,
    #[serde(default)]
    pub session: Option<TelemetrySession>,
    #[serde(default)]
    pub routing: Option<TelemetryRouting>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryProcess {
    pub pid: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: f64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TelemetryState {
    /// Modern enum form: `"working"` | `"waiting_input"`.
    pub activity: Option<String>,
    /// Legacy boolean-triple form, retained per the design notes until producers migrate.
    #[serde(rename = "waitingForInput")]
    pub waiting_for_input: Option<bool>,
    pub busy: Option<bool>,
    #[serde(rename = "isIdle")]
    pub is_idle: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryModel {
    pub provider: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryContext {
    pub percent: Option<f64>,
    pub pressure: Option<String>,
    #[serde(rename = "closeToLimit")]
    pub close_to_limit: Option<bool>,
    #[serde(rename = "nearLimit")]
    pub near_limit: Option<bool>,
    pub tokens: Option<u64>,
    pub window: Option<u64>,
    #[serde(rename = "remainingTokens")]
    pub remaining_tokens: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySession {
    pub id: Option<String>,
    pub name: Option<String>,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryRouting {
    pub mux: Option<String>,
    #[serde(rename = "muxSession")]
    pub mux_session: Option<String>,
}

/// `activity` classification shared by both the process-fallback and telemetry paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Running,
    WaitingInput,
    Unknown,
}

impl Activity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::WaitingInput => "waiting_input",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Canonical per-agent entity, keyed by `pid`.
#[derive(Debug, Clone, Serialize)]
pub struct Agent {
    pub pid: u32,
    pub ppid: u32,
    pub state: char,
    pub tty: String,
    pub cpu: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,

    pub activity: Activity,
    pub confidence: Confidence,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mux: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mux_session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_pid: Option<u32>,
    pub attached_window: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_app: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub telemetry_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_pressure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_close_to_limit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_near_limit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_remaining_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_file: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_message_full: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_message_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_message_at: Option<i64>,

    pub has_telemetry: bool,
    pub has_bridge: bool,
}

impl Agent {
    /// `latest_message` is always the tail-truncated, whitespace-collapsed
    /// projection of `latest_message_full` — callers must maintain this
    /// invariant rather than setting the two fields independently.
    pub fn set_latest_message_full(&mut self, full: Option<String>) {
        self.latest_message = full.as_deref().map(collapse_and_truncate);
        self.latest_message_full = full;
    }
}

/// Collapse internal whitespace runs to single spaces and truncate the tail to
/// 420 chars, ellipsizing from the front so the most recent text survives.
pub fn collapse_and_truncate(full: &str) -> String {
    let collapsed: String = full.split_whitespace().collect::<Vec<_>>().join(" ");
    const LIMIT: usize = 420;
    if collapsed.chars().count() <= LIMIT {
        return collapsed;
    }
    let tail: String = collapsed.chars().rev().take(LIMIT - 1).collect::<Vec<_>>().into_iter().rev().collect();
    format!("…{tail}")
}

/// Aggregate summary over an agent set.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub total: usize,
    pub running: usize,
    pub waiting_input: usize,
    pub unknown: usize,
    pub color: &'static str,
    pub label: &'static str,
}

impl Summary {
    pub fn compute(agents: &[Agent]) -> Self {
        let total = agents.len();
        let running = agents.iter().filter(|a| a.activity == Activity::Running).count();
        let waiting_input = agents.iter().filter(|a| a.activity == Activity::WaitingInput).count();
        let unknown = agents.iter().filter(|a| a.activity == Activity::Unknown).count();

        let (color, label) = if total == 0 {
            ("gray", "No Pi agents")
        } else if waiting_input == 0 && unknown == 0 {
            ("red", "All agents running")
        } else if waiting_input == total && unknown == 0 {
            ("green", "All agents waiting for input")
        } else {
            ("yellow", "Some agents waiting for input")
        };

        Self { total, running, waiting_input, unknown, color, label }
    }
}

/// Source that produced a scan's agent set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanSource {
    PiTelemetry,
    ProcessFallback,
}

impl ScanSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PiTelemetry => "pi-telemetry",
            Self::ProcessFallback => "process-fallback",
        }
    }
}

/// Full scan result returned by the Scanner (C6) and exposed verbatim by `status`.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub ok: bool,
    pub timestamp: u64,
    pub agents: Vec<Agent>,
    pub summary: Summary,
    pub version: u32,
    pub source: &'static str,
}

impl ScanResult {
    pub fn new(mut agents: Vec<Agent>, source: ScanSource) -> Self {
        agents.sort_by_key(|a| a.pid);
        let summary = Summary::compute(&agents);
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self { ok: true, timestamp, agents, summary, version: 2, source: source.as_str() }
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
