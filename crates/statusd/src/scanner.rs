// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scanner / Fusion Core (C6): composes C1–C5 into a canonical `Agent` record
//! set and computes the fleet summary.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::activity::{activity_from_process, activity_from_telemetry};
use crate::agent::{
    Activity, Agent, Confidence, ProcessRow, ScanResult, ScanSource, TelemetryInstance,
};
use crate::config::Config;
use crate::cwd;
use crate::mux::{classify_mux, detect_terminal_app, find_mux_client_pid, MuxClassification};
use crate::process::read_process_table;
use crate::runtime_preview::PreviewCache;
use crate::session_file::SessionFileCache;
use crate::telemetry::read_telemetry;

/// The process name this daemon watches for, per §4.1/§4.6.
const AGENT_COMM: &str = "pi";

/// Shared, per-scanner-instance state: caches and config, cloned behind an
/// `Arc` by every handler task (§5 "no process-wide mutable singletons").
pub struct Scanner {
    pub config: Arc<Config>,
    session_cache: SessionFileCache,
    preview_cache: PreviewCache,
}

impl Scanner {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config, session_cache: SessionFileCache::default(), preview_cache: PreviewCache::default() }
    }

    /// Run one full scan: C1 → C3 → fuse → C2/C5 enrichment → sort → summarize.
    pub fn scan(&self) -> ScanResult {
        let rows = read_process_table();
        let by_pid: HashMap<u32, ProcessRow> = rows.iter().map(|r| (r.pid, r.clone())).collect();

        let telemetry_dir =
            self.config.telemetry_dir.clone().unwrap_or_else(crate::telemetry::default_telemetry_dir);
        let telemetry = read_telemetry(&telemetry_dir, self.config.telemetry_stale_ms);

        if telemetry.is_empty() {
            let agents = self.agents_from_processes(&rows, &by_pid);
            return ScanResult::new(agents, ScanSource::ProcessFallback);
        }

        let agents = self.merge(&rows, &by_pid, &telemetry);
        ScanResult::new(agents, ScanSource::PiTelemetry)
    }

    /// Telemetry non-empty: union by PID, telemetry overriding process-fallback.
    fn merge(
        &self,
        rows: &[ProcessRow],
        by_pid: &HashMap<u32, ProcessRow>,
        telemetry: &[TelemetryInstance],
    ) -> Vec<Agent> {
        let mut by_telemetry_pid: HashMap<u32, &TelemetryInstance> = HashMap::new();
        for inst in telemetry {
            if inst.process.pid > 0 {
                by_telemetry_pid.insert(inst.process.pid as u32, inst);
            }
        }

        let mut out = Vec::with_capacity(rows.len().max(telemetry.len()));
        let mut seen = std::collections::HashSet::new();

        for inst in telemetry {
            if inst.process.pid <= 0 {
                continue;
            }
            let pid = inst.process.pid as u32;
            if !seen.insert(pid) {
                continue;
            }
            out.push(self.build_telemetry_agent(pid, inst, by_pid.get(&pid), by_pid));
        }

        for row in rows {
            if row.comm != AGENT_COMM || seen.contains(&row.pid) {
                continue;
            }
            seen.insert(row.pid);
            out.push(self.build_process_agent(row, by_pid));
        }

        out
    }

    fn agents_from_processes(&self, rows: &[ProcessRow], by_pid: &HashMap<u32, ProcessRow>) -> Vec<Agent> {
        rows.iter().filter(|r| r.comm == AGENT_COMM).map(|row| self.build_process_agent(row, by_pid)).collect()
    }

    fn build_process_agent(&self, row: &ProcessRow, by_pid: &HashMap<u32, ProcessRow>) -> Agent {
        let (activity, confidence) = activity_from_process(row);
        let mux_class = classify_mux(row.pid, by_pid);
        let client_pid = mux_class
            .mux
            .as_deref()
            .and_then(|mux| find_mux_client_pid(by_pid, mux, mux_class.mux_session.as_deref(), &row.tty));
        let (terminal_app, _) = detect_terminal_app(row.pid, by_pid);
        let cwd = cwd::resolve(row.pid).map(|p| p.to_string_lossy().into_owned());

        Agent {
            pid: row.pid,
            ppid: row.ppid,
            state: row.state,
            tty: row.tty.clone(),
            cpu: row.cpu,
            cwd,
            activity,
            confidence,
            mux: mux_class.mux,
            mux_session: mux_class.mux_session,
            client_pid,
            attached_window: client_pid.is_some(),
            terminal_app,
            telemetry_source: None,
            model_provider: None,
            model_id: None,
            model_name: None,
            session_id: None,
            session_name: None,
            context_percent: None,
            context_pressure: None,
            context_close_to_limit: None,
            context_near_limit: None,
            context_tokens: None,
            context_window: None,
            context_remaining_tokens: None,
            session_file: None,
            latest_message: None,
            latest_message_full: None,
            latest_message_html: None,
            latest_message_at: None,
            has_telemetry: false,
            has_bridge: crate::router::bridge::is_registered(
                &self.bridge_dir(),
                row.pid,
                self.config.clamped_bridge_registry_stale_ms(),
            ),
        }
    }

    fn build_telemetry_agent(
        &self,
        pid: u32,
        inst: &TelemetryInstance,
        row: Option<&ProcessRow>,
        by_pid: &HashMap<u32, ProcessRow>,
    ) -> Agent {
        let activity = activity_from_telemetry(inst.state.as_ref());
        let mux_class = if let Some(routing) = &inst.routing {
            MuxClassification { mux: routing.mux.clone(), mux_session: routing.mux_session.clone() }
        } else {
            classify_mux(pid, by_pid)
        };
        let tty = row.map(|r| r.tty.clone()).unwrap_or_else(|| "??".to_owned());
        let client_pid = mux_class
            .mux
            .as_deref()
            .and_then(|mux| find_mux_client_pid(by_pid, mux, mux_class.mux_session.as_deref(), &tty));
        let (terminal_app, _) = detect_terminal_app(pid, by_pid);
        let cwd = cwd::resolve(pid).map(|p| p.to_string_lossy().into_owned());

        let (latest_message_full, latest_message_at) = inst
            .session
            .as_ref()
            .and_then(|s| s.file.as_ref())
            .map(|f| self.session_cache.get_or_parse(&PathBuf::from(f)))
            .unwrap_or((None, None));

        let mut agent = Agent {
            pid,
            ppid: row.map(|r| r.ppid).unwrap_or(0),
            state: row.map(|r| r.state).unwrap_or('?'),
            tty,
            cpu: row.map(|r| r.cpu).unwrap_or(0.0),
            cwd,
            activity,
            confidence: Confidence::High,
            mux: mux_class.mux,
            mux_session: mux_class.mux_session,
            client_pid,
            attached_window: client_pid.is_some(),
            terminal_app,
            telemetry_source: Some("pi-telemetry".to_owned()),
            model_provider: inst.model.as_ref().and_then(|m| m.provider.clone()),
            model_id: inst.model.as_ref().and_then(|m| m.id.clone()),
            model_name: inst.model.as_ref().and_then(|m| m.name.clone()),
            session_id: inst.session.as_ref().and_then(|s| s.id.clone()),
            session_name: inst.session.as_ref().and_then(|s| s.name.clone()),
            context_percent: inst.context.as_ref().and_then(|c| c.percent),
            context_pressure: inst.context.as_ref().and_then(|c| c.pressure.clone()),
            context_close_to_limit: inst.context.as_ref().and_then(|c| c.close_to_limit),
            context_near_limit: inst.context.as_ref().and_then(|c| c.near_limit),
            context_tokens: inst.context.as_ref().and_then(|c| c.tokens),
            context_window: inst.context.as_ref().and_then(|c| c.window),
            context_remaining_tokens: inst.context.as_ref().and_then(|c| c.remaining_tokens),
            session_file: inst.session.as_ref().and_then(|s| s.file.clone()),
            latest_message: None,
            latest_message_full: None,
            latest_message_html: None,
            latest_message_at,
            has_telemetry: true,
            has_bridge: crate::router::bridge::is_registered(
                &self.bridge_dir(),
                pid,
                self.config.clamped_bridge_registry_stale_ms(),
            ),
        };
        agent.set_latest_message_full(latest_message_full);
        agent.latest_message_html = agent.latest_message_full.as_deref().map(render_html);
        agent
    }

    fn bridge_dir(&self) -> PathBuf {
        self.config.bridge_dir.clone().unwrap_or_else(crate::router::bridge::default_bridge_dir)
    }

    /// Re-derive a single agent's latest message for the `latest <pid>` socket
    /// request, independent of a full scan (§4.8).
    pub fn latest_message_for(&self, pid: u32) -> Option<(Option<String>, Option<i64>)> {
        let rows = read_process_table();
        let by_pid: HashMap<u32, ProcessRow> = rows.iter().map(|r| (r.pid, r.clone())).collect();
        let row = by_pid.get(&pid)?;
        if row.comm != AGENT_COMM {
            return None;
        }

        let telemetry_dir =
            self.config.telemetry_dir.clone().unwrap_or_else(crate::telemetry::default_telemetry_dir);
        let telemetry = read_telemetry(&telemetry_dir, self.config.telemetry_stale_ms);
        if let Some(inst) = telemetry.iter().find(|i| i.process.pid as u32 == pid) {
            if let Some(file) = inst.session.as_ref().and_then(|s| s.file.as_ref()) {
                let (text, ts) = self.session_cache.get_or_parse(&PathBuf::from(file));
                if text.is_some() {
                    return Some((text, ts));
                }
            }
        }

        let mux_class = classify_mux(pid, &by_pid);
        if let Some(mux) = &mux_class.mux {
            if let Some((text, ts)) = self.preview_cache.get_or_capture(mux, mux_class.mux_session.as_deref(), pid) {
                return Some((Some(text), ts));
            }
        }

        Some((None, None))
    }
}

/// Minimal wrapped HTML rendering of a message, per §3.1 `latest_message_html`.
fn render_html(full: &str) -> String {
    let escaped = full
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;");
    format!("<pre style=\"white-space:pre-wrap;word-break:break-word\">{escaped}</pre>")
}

#[cfg(test)]
#[path = "scanner_tests.rs"]
mod tests;
