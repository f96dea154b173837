// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity inference rules from §3.1: telemetry state (modern enum + legacy
//! boolean triple, both retained per the design notes) and process-fallback
//! heuristics.

use crate::agent::{Activity, Confidence, ProcessRow, TelemetryState};

/// Map a telemetry `state` object to an activity. Modern `activity` enum
/// takes priority; the legacy boolean triple (`waitingForInput`/`busy`/
/// `isIdle`) is consulted only when the enum is absent.
pub fn activity_from_telemetry(state: Option<&TelemetryState>) -> Activity {
    let Some(state) = state else { return Activity::Unknown };

    if let Some(activity) = state.activity.as_deref() {
        return match activity {
            "working" => Activity::Running,
            "waiting_input" => Activity::WaitingInput,
            _ => Activity::Unknown,
        };
    }

    if state.waiting_for_input == Some(true) {
        return Activity::WaitingInput;
    }
    if state.busy == Some(true) || state.is_idle == Some(false) {
        return Activity::Running;
    }
    Activity::Unknown
}

/// Process-fallback activity inference when no telemetry is available.
pub fn activity_from_process(row: &ProcessRow) -> (Activity, Confidence) {
    if row.state.to_ascii_uppercase() == 'R' {
        return (Activity::Running, Confidence::High);
    }
    if row.cpu >= 1.0 {
        return (Activity::Running, Confidence::Medium);
    }
    if row.state.to_ascii_uppercase() == 'S' && row.tty != "??" {
        return (Activity::WaitingInput, Confidence::Medium);
    }
    (Activity::Unknown, Confidence::Low)
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
