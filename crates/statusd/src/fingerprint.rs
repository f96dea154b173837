// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status Normalizer (C11): per-message stable IDs and content fingerprints.
//! Pure functions — no I/O, no server state.

use sha1::{Digest, Sha1};

use crate::agent::Agent;

/// First 16 hex chars of SHA-1 of `"{pid}|{latest_message_at}|{latest_message_full}"`.
/// Absent when there is no message text and no timestamp.
pub fn latest_message_id(agent: &Agent) -> Option<String> {
    let (at, full) = match (agent.latest_message_at, &agent.latest_message_full) {
        (Some(at), Some(full)) => (at, full.as_str()),
        _ => return None,
    };
    let input = format!("{}|{}|{}", agent.pid, at, full);
    Some(sha1_hex(input.as_bytes())[..16].to_owned())
}

/// Compact tuple used for both per-agent and whole-fleet fingerprints.
#[derive(Debug, Clone, serde::Serialize)]
struct FingerprintTuple<'a> {
    pid: u32,
    activity: &'static str,
    latest_message_id: Option<&'a str>,
}

/// Per-agent fingerprint: SHA-1 hex of the compact `{pid, activity, latest_message_id}`.
pub fn agent_fingerprint(agent: &Agent, message_id: Option<&str>) -> String {
    let tuple = FingerprintTuple { pid: agent.pid, activity: agent.activity.as_str(), latest_message_id: message_id };
    let bytes = serde_json::to_vec(&tuple).unwrap_or_default();
    sha1_hex(&bytes)
}

/// Whole-fleet fingerprint: SHA-1 hex of the sorted-by-pid list of compact tuples.
pub fn fleet_fingerprint(agents: &[Agent], message_ids: &[Option<String>]) -> String {
    let mut pairs: Vec<(&Agent, Option<&str>)> =
        agents.iter().zip(message_ids.iter().map(|m| m.as_deref())).collect();
    pairs.sort_by_key(|(a, _)| a.pid);
    let tuples: Vec<FingerprintTuple> = pairs
        .into_iter()
        .map(|(a, mid)| FingerprintTuple { pid: a.pid, activity: a.activity.as_str(), latest_message_id: mid })
        .collect();
    let bytes = serde_json::to_vec(&tuples).unwrap_or_default();
    sha1_hex(&bytes)
}

fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// A scan result agent, augmented with `latest_message_id` and `fingerprint` —
/// the shape `/status` returns over HTTP (normalize is idempotent: applying it
/// twice to the same agent set yields the same augmented output).
#[derive(Debug, Clone, serde::Serialize)]
pub struct NormalizedAgent {
    #[serde(flatten)]
    pub agent: Agent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_message_id: Option<String>,
    pub fingerprint: String,
}

pub fn normalize(agents: Vec<Agent>) -> (Vec<NormalizedAgent>, String) {
    let message_ids: Vec<Option<String>> = agents.iter().map(latest_message_id).collect();
    let fleet_fp = fleet_fingerprint(&agents, &message_ids);
    let normalized = agents
        .into_iter()
        .zip(message_ids)
        .map(|(agent, mid)| {
            let fingerprint = agent_fingerprint(&agent, mid.as_deref());
            NormalizedAgent { agent, latest_message_id: mid, fingerprint }
        })
        .collect();
    (normalized, fleet_fp)
}

#[cfg(test)]
#[path = "fingerprint_tests.rs"]
mod tests;
