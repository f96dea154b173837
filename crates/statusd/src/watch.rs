// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watch Engine (C9): fingerprint-based change detection, both whole-fleet
//! and per-agent, built on periodic scans every 400-600 ms (randomized to
//! avoid thundering-herd alignment across concurrent watchers per §5).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::fingerprint::{self, NormalizedAgent};
use crate::scanner::Scanner;

/// Clamp a caller-supplied `timeout_ms` to [250ms, 60s], per §4.8/§8.
pub fn clamp_timeout_ms(timeout_ms: i64) -> u64 {
    timeout_ms.clamp(250, 60_000) as u64
}

/// Default long-poll timeout when the caller supplies none, per §4.8.
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;

const POLL_MIN_MS: u64 = 400;
const POLL_MAX_MS: u64 = 600;

/// A normalized scan snapshot: the raw scan result plus per-agent
/// fingerprints/message-ids and the whole-fleet fingerprint (C11).
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub ok: bool,
    pub timestamp: u64,
    pub agents: Vec<NormalizedAgent>,
    pub summary: crate::agent::Summary,
    pub version: u32,
    pub source: &'static str,
    pub fingerprint: String,
}

fn snapshot_from(result: crate::agent::ScanResult) -> Snapshot {
    let (agents, fleet_fp) = fingerprint::normalize(result.agents);
    Snapshot {
        ok: result.ok,
        timestamp: result.timestamp,
        agents,
        summary: result.summary,
        version: result.version,
        source: result.source,
        fingerprint: fleet_fp,
    }
}

/// Run one scan and normalize it into a `Snapshot`, fingerprint included.
/// Shared by the socket `status` command and the HTTP `/status` handler so
/// both transports agree on the same normalized shape (§4.8/§4.10).
pub async fn snapshot(scanner: &Arc<Scanner>) -> Snapshot {
    scan_snapshot(scanner).await
}

async fn scan_snapshot(scanner: &Arc<Scanner>) -> Snapshot {
    let scanner = Arc::clone(scanner);
    let result = tokio::task::spawn_blocking(move || scanner.scan())
        .await
        .unwrap_or_else(|_| crate::agent::ScanResult::new(Vec::new(), crate::agent::ScanSource::ProcessFallback));
    snapshot_from(result)
}

/// Per-PID minimal change record included in a global-watch diff payload.
#[derive(Debug, Clone, Serialize)]
pub struct AgentChange {
    pub pid: u32,
    pub change: &'static str,
    pub activity: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_message_id: Option<String>,
    pub fingerprint: String,
}

fn diff(previous: &Snapshot, current: &Snapshot) -> Vec<AgentChange> {
    let prev_by_pid: HashMap<u32, &NormalizedAgent> = previous.agents.iter().map(|a| (a.agent.pid, a)).collect();
    let mut changes = Vec::new();

    for agent in &current.agents {
        match prev_by_pid.get(&agent.agent.pid) {
            None => changes.push(AgentChange {
                pid: agent.agent.pid,
                change: "agent_added",
                activity: agent.agent.activity.as_str(),
                latest_message_id: agent.latest_message_id.clone(),
                fingerprint: agent.fingerprint.clone(),
            }),
            Some(prev) if prev.fingerprint != agent.fingerprint => changes.push(AgentChange {
                pid: agent.agent.pid,
                change: classify_agent_change(prev, agent),
                activity: agent.agent.activity.as_str(),
                latest_message_id: agent.latest_message_id.clone(),
                fingerprint: agent.fingerprint.clone(),
            }),
            Some(_) => {}
        }
    }

    let current_pids: std::collections::HashSet<u32> = current.agents.iter().map(|a| a.agent.pid).collect();
    for prev in &previous.agents {
        if !current_pids.contains(&prev.agent.pid) {
            changes.push(AgentChange {
                pid: prev.agent.pid,
                change: "agent_gone",
                activity: prev.agent.activity.as_str(),
                latest_message_id: None,
                fingerprint: String::new(),
            });
        }
    }

    changes
}

/// Classify a single agent's transition per §4.9: message change takes
/// priority over activity change, which takes priority over a generic
/// "updated" classification.
fn classify_agent_change(prev: &NormalizedAgent, current: &NormalizedAgent) -> &'static str {
    if prev.latest_message_id != current.latest_message_id {
        "message_updated"
    } else if prev.agent.activity != current.agent.activity {
        "activity_changed"
    } else {
        "agent_updated"
    }
}

/// Outcome of a global (whole-fleet) watch call.
pub struct GlobalWatchOutcome {
    pub event: &'static str,
    pub snapshot: Snapshot,
    pub changes: Vec<AgentChange>,
}

/// Global long-poll (§4.9): if the caller's fingerprint differs from a fresh
/// snapshot, return immediately; otherwise poll until a change is observed
/// or `timeout_ms` elapses.
///
/// `initial_event` selects what to report when no prior fingerprint was
/// supplied: HTTP wants `"snapshot"`; the socket's direct `watch` form wants
/// a change event on first contact, callers pass `"status_changed"` there.
pub async fn watch_global(
    scanner: &Arc<Scanner>,
    timeout_ms: u64,
    supplied_fingerprint: Option<&str>,
    initial_event: &'static str,
) -> GlobalWatchOutcome {
    let first = scan_snapshot(scanner).await;

    let Some(supplied) = supplied_fingerprint else {
        return GlobalWatchOutcome { event: initial_event, snapshot: first, changes: vec![] };
    };

    if supplied != first.fingerprint {
        return GlobalWatchOutcome {
            event: "status_changed",
            changes: vec![],
            snapshot: first,
        };
    }

    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    let mut previous = first;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return GlobalWatchOutcome { event: "timeout", snapshot: previous, changes: vec![] };
        }
        tokio::time::sleep(poll_interval().min(remaining)).await;

        let current = scan_snapshot(scanner).await;
        if current.fingerprint != previous.fingerprint {
            let changes = diff(&previous, &current);
            return GlobalWatchOutcome { event: "status_changed", snapshot: current, changes };
        }
        previous = current;
    }
}

/// Outcome of a per-agent watch call.
pub enum PerAgentOutcome {
    NotFound,
    Event { event: &'static str, agent: Option<NormalizedAgent> },
}

/// Per-agent watch (§4.9). If `pid` is missing at the first scan, returns
/// `NotFound`. A supplied fingerprint that doesn't match the current one
/// yields `out_of_sync` immediately; otherwise polls until the agent
/// changes, vanishes, or the deadline elapses.
pub async fn watch_agent(
    scanner: &Arc<Scanner>,
    pid: u32,
    timeout_ms: u64,
    supplied_fingerprint: Option<&str>,
) -> PerAgentOutcome {
    let Some(mut previous) = find_agent(scanner, pid).await else { return PerAgentOutcome::NotFound };

    if let Some(supplied) = supplied_fingerprint {
        if supplied != previous.fingerprint {
            return PerAgentOutcome::Event { event: "out_of_sync", agent: Some(previous) };
        }
    } else {
        return PerAgentOutcome::Event { event: "agent_updated", agent: Some(previous) };
    }

    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return PerAgentOutcome::Event { event: "timeout", agent: Some(previous) };
        }
        tokio::time::sleep(poll_interval().min(remaining)).await;

        match find_agent(scanner, pid).await {
            None => return PerAgentOutcome::Event { event: "agent_gone", agent: None },
            Some(current) => {
                if current.fingerprint != previous.fingerprint {
                    let event = classify_agent_change(&previous, &current);
                    return PerAgentOutcome::Event { event, agent: Some(current) };
                }
                previous = current;
            }
        }
    }
}

async fn find_agent(scanner: &Arc<Scanner>, pid: u32) -> Option<NormalizedAgent> {
    let snapshot = scan_snapshot(scanner).await;
    snapshot.agents.into_iter().find(|a| a.agent.pid == pid)
}

/// Fetch a single agent's current normalized snapshot without entering the
/// poll loop, for the SSE handshake's first frame.
pub async fn current_agent(scanner: &Arc<Scanner>, pid: u32) -> Option<NormalizedAgent> {
    find_agent(scanner, pid).await
}

/// Randomized poll interval within [400ms, 600ms], per §5.
fn poll_interval() -> Duration {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().subsec_nanos();
    let span = POLL_MAX_MS - POLL_MIN_MS;
    Duration::from_millis(POLL_MIN_MS + (nanos as u64 % (span + 1)))
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
