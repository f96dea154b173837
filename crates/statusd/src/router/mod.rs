// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message Router (C7): precedence-ordered delivery — mux command ▷ bridge
//! (file+ack) ▷ terminal-scripting ▷ TTY input ▷ synthetic keystrokes.
//!
//! Implemented as the "pipeline of strategies" the design notes call for: a
//! fixed, ordered list of `RouteStrategy` objects, each returning a
//! `StrategyOutcome`. Only the bridge stage can emit `Retryable`, and only it
//! decides — based on whether the agent sits inside a known multiplexer —
//! whether a rate-limit exhaustion should fall through to the terminal-level
//! strategies or fail fast (§4.7 step 4, an Open Question the spec resolves
//! explicitly and this implementation preserves unchanged).

pub mod bridge;
pub mod mux_command;
pub mod terminal;
pub mod tty_input;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::agent::ProcessRow;
use crate::config::Config;
use crate::mux::{classify_mux, detect_terminal_app, find_mux_client_pid};
use crate::process::read_process_table;
use crate::telemetry::read_telemetry;
use crate::router::terminal::TerminalAdapter;

/// Everything a strategy needs to attempt delivery for one `send` call.
pub struct RouteContext {
    pub pid: u32,
    pub message: String,
    pub mux: Option<String>,
    pub mux_session: Option<String>,
    pub tty: String,
    pub terminal_app: Option<String>,
    pub terminal_ancestor_pid: Option<u32>,
    pub client_pid: Option<u32>,
    pub bridge_dir: std::path::PathBuf,
    pub bridge_registry_stale_ms: u64,
    pub bridge_ack_timeout: Duration,
    pub bridge_retries: u32,
    pub bridge_retry_backoff: Duration,
}

/// Outcome of one strategy's attempt, per the design notes' pipeline model.
pub enum StrategyOutcome {
    Delivered { mode: &'static str, detail: serde_json::Value },
    Skip,
    Retryable,
    Fatal(String),
}

pub trait RouteStrategy {
    fn name(&self) -> &'static str;
    fn attempt(&self, ctx: &RouteContext, adapter: &dyn TerminalAdapter) -> StrategyOutcome;
}

/// Stage 2: primary mux injection.
struct MuxStrategy;
impl RouteStrategy for MuxStrategy {
    fn name(&self) -> &'static str {
        "mux"
    }
    fn attempt(&self, ctx: &RouteContext, _adapter: &dyn TerminalAdapter) -> StrategyOutcome {
        let Some(mux) = ctx.mux.as_deref() else { return StrategyOutcome::Skip };
        if !matches!(mux, "tmux" | "screen" | "zellij") {
            return StrategyOutcome::Skip;
        }
        if mux_command::send_to_mux(mux, ctx.mux_session.as_deref(), &ctx.message) {
            let mode = match mux {
                "tmux" => "tmux",
                "screen" => "screen",
                _ => "zellij",
            };
            StrategyOutcome::Delivered { mode, detail: serde_json::json!({ "mux_session": ctx.mux_session }) }
        } else {
            StrategyOutcome::Skip
        }
    }
}

/// Stage 3/4: file bridge with ack polling + rate-limit retry. On
/// rate-limit exhaustion, the known-multiplexer case fails fast rather than
/// falling through to the terminal-level strategies (§4.7 step 4): raw TTY
/// injection would race with the mux's own input handling.
struct BridgeStrategy;
impl RouteStrategy for BridgeStrategy {
    fn name(&self) -> &'static str {
        "pi-bridge"
    }
    fn attempt(&self, ctx: &RouteContext, _adapter: &dyn TerminalAdapter) -> StrategyOutcome {
        if !bridge::is_registered(&ctx.bridge_dir, ctx.pid, ctx.bridge_registry_stale_ms) {
            return StrategyOutcome::Skip;
        }

        let mut last_rate_limited = false;
        for attempt in 1..=ctx.bridge_retries {
            let outcome = bridge::send_once(
                &ctx.bridge_dir,
                ctx.pid,
                &ctx.message,
                attempt,
                ctx.bridge_ack_timeout,
                Duration::from_millis(50),
            );
            match outcome {
                Ok(result) if result.ack.is_delivered() => {
                    return StrategyOutcome::Delivered {
                        mode: "pi-bridge",
                        detail: serde_json::json!({ "attempt": attempt }),
                    };
                }
                Ok(result) if result.ack.is_rate_limited() => {
                    last_rate_limited = true;
                    if attempt < ctx.bridge_retries {
                        std::thread::sleep(ctx.bridge_retry_backoff);
                    }
                    continue;
                }
                Ok(result) => {
                    return StrategyOutcome::Fatal(
                        result.ack.error.unwrap_or_else(|| "bridge delivery failed".to_owned()),
                    );
                }
                Err(bridge::BridgeError::Timeout) => {
                    return StrategyOutcome::Fatal("bridge ack timed out".to_owned());
                }
                Err(bridge::BridgeError::Io(e)) => {
                    return StrategyOutcome::Fatal(format!("bridge io error: {e}"));
                }
            }
        }

        if last_rate_limited && ctx.mux.is_some() {
            return StrategyOutcome::Fatal("bridge rate-limited and mux routing precludes raw fallback".to_owned());
        }
        StrategyOutcome::Retryable
    }
}

/// Stage 5: terminal scripting.
struct TerminalScriptStrategy;
impl RouteStrategy for TerminalScriptStrategy {
    fn name(&self) -> &'static str {
        "terminal-script"
    }
    fn attempt(&self, ctx: &RouteContext, adapter: &dyn TerminalAdapter) -> StrategyOutcome {
        let (Some(app), true) = (ctx.terminal_app.as_deref(), ctx.tty != "??") else {
            return StrategyOutcome::Skip;
        };
        if adapter.run_terminal_script(&ctx.message, &ctx.tty, app) {
            StrategyOutcome::Delivered { mode: "terminal-script", detail: serde_json::json!({}) }
        } else {
            StrategyOutcome::Skip
        }
    }
}

/// Stage 6: direct TTY input injection.
struct TtyInputStrategy;
impl RouteStrategy for TtyInputStrategy {
    fn name(&self) -> &'static str {
        "tty-input"
    }
    fn attempt(&self, ctx: &RouteContext, _adapter: &dyn TerminalAdapter) -> StrategyOutcome {
        if ctx.tty == "??" {
            return StrategyOutcome::Skip;
        }
        if tty_input::inject(&ctx.tty, &ctx.message) {
            StrategyOutcome::Delivered { mode: "tty-input", detail: serde_json::json!({}) }
        } else {
            StrategyOutcome::Skip
        }
    }
}

/// Stage 7: synthetic keystrokes via window-manager automation.
struct KeystrokeStrategy;
impl RouteStrategy for KeystrokeStrategy {
    fn name(&self) -> &'static str {
        "ui-keystroke"
    }
    fn attempt(&self, ctx: &RouteContext, adapter: &dyn TerminalAdapter) -> StrategyOutcome {
        let Some(app) = ctx.terminal_app.as_deref() else { return StrategyOutcome::Skip };
        let hints: Vec<String> = ctx.mux_session.iter().cloned().collect();
        let tty = (ctx.tty != "??").then_some(ctx.tty.as_str());
        if adapter.inject_keystrokes(&ctx.message, app, &hints, ctx.terminal_ancestor_pid, tty) {
            StrategyOutcome::Delivered { mode: "ui-keystroke", detail: serde_json::json!({}) }
        } else {
            StrategyOutcome::Skip
        }
    }
}

/// The structured result `send()` returns (§4.7/§7): on failure it names
/// every transport attempted plus the routing facts that aid debugging.
#[derive(Debug, Serialize)]
pub struct SendResult {
    pub ok: bool,
    pub pid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mux: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mux_session: Option<String>,
    pub tty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_app: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attempted: Vec<String>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

/// Build routing context for `pid` from a fresh process/telemetry snapshot.
/// Returns `Err` if `pid` does not map to a live `pi` process (§4.7
/// preconditions).
fn build_context(config: &Config, pid: u32, message: &str) -> Result<RouteContext, String> {
    let rows = read_process_table();
    let by_pid: HashMap<u32, ProcessRow> = rows.iter().map(|r| (r.pid, r.clone())).collect();
    let row = by_pid.get(&pid).filter(|r| r.comm == "pi").ok_or_else(|| "pid not found".to_owned())?;

    let mut mux_class = classify_mux(pid, &by_pid);

    let telemetry_dir =
        config.telemetry_dir.clone().unwrap_or_else(crate::telemetry::default_telemetry_dir);
    let telemetry = read_telemetry(&telemetry_dir, config.telemetry_stale_ms);
    if let Some(inst) = telemetry.iter().find(|i| i.process.pid as u32 == pid) {
        if let Some(routing) = &inst.routing {
            if routing.mux.is_some() {
                mux_class.mux = routing.mux.clone();
            }
            if routing.mux_session.is_some() {
                mux_class.mux_session = routing.mux_session.clone();
            }
        }
    }

    let client_pid = mux_class
        .mux
        .as_deref()
        .and_then(|mux| find_mux_client_pid(&by_pid, mux, mux_class.mux_session.as_deref(), &row.tty));
    let (terminal_app, terminal_ancestor_pid) = detect_terminal_app(pid, &by_pid);

    let bridge_dir = config.bridge_dir.clone().unwrap_or_else(bridge::default_bridge_dir);

    Ok(RouteContext {
        pid,
        message: message.to_owned(),
        mux: mux_class.mux,
        mux_session: mux_class.mux_session,
        tty: row.tty.clone(),
        terminal_app,
        terminal_ancestor_pid,
        client_pid,
        bridge_dir,
        bridge_registry_stale_ms: config.clamped_bridge_registry_stale_ms(),
        bridge_ack_timeout: Duration::from_millis(config.bridge_ack_timeout_ms),
        bridge_retries: config.clamped_bridge_send_retries(),
        bridge_retry_backoff: Duration::from_millis(config.clamped_bridge_send_retry_backoff_ms()),
    })
}

fn pipeline() -> Vec<Box<dyn RouteStrategy>> {
    vec![
        Box::new(MuxStrategy),
        Box::new(BridgeStrategy),
        Box::new(TerminalScriptStrategy),
        Box::new(TtyInputStrategy),
        Box::new(KeystrokeStrategy),
    ]
}

/// Public entry point: `send(pid, message)` (§4.7). Preconditions: message
/// non-empty after trim; pid maps to a live `pi` process. Strategies run in
/// the fixed order above; the first success returns.
pub fn send(config: &Config, adapter: &dyn TerminalAdapter, pid: u32, message: &str) -> SendResult {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return SendResult {
            ok: false,
            pid,
            delivery: None,
            mux: None,
            mux_session: None,
            tty: "??".to_owned(),
            terminal_app: None,
            error: Some("message must not be empty".to_owned()),
            attempted: vec![],
            detail: None,
        };
    }

    let ctx = match build_context(config, pid, trimmed) {
        Ok(ctx) => ctx,
        Err(e) => {
            return SendResult {
                ok: false,
                pid,
                delivery: None,
                mux: None,
                mux_session: None,
                tty: "??".to_owned(),
                terminal_app: None,
                error: Some(e),
                attempted: vec![],
                detail: None,
            };
        }
    };

    let mut attempted = Vec::new();
    for strategy in pipeline() {
        match strategy.attempt(&ctx, adapter) {
            StrategyOutcome::Delivered { mode, detail } => {
                return SendResult {
                    ok: true,
                    pid,
                    delivery: Some(mode.to_owned()),
                    mux: ctx.mux,
                    mux_session: ctx.mux_session,
                    tty: ctx.tty,
                    terminal_app: ctx.terminal_app,
                    error: None,
                    attempted,
                    detail: Some(detail),
                };
            }
            StrategyOutcome::Skip | StrategyOutcome::Retryable => {
                attempted.push(strategy.name().to_owned());
            }
            StrategyOutcome::Fatal(err) => {
                attempted.push(strategy.name().to_owned());
                return SendResult {
                    ok: false,
                    pid,
                    delivery: None,
                    mux: ctx.mux,
                    mux_session: ctx.mux_session,
                    tty: ctx.tty,
                    terminal_app: ctx.terminal_app,
                    error: Some(err),
                    attempted,
                    detail: None,
                };
            }
        }
    }

    SendResult {
        ok: false,
        pid,
        delivery: None,
        mux: ctx.mux,
        mux_session: ctx.mux_session,
        tty: ctx.tty,
        terminal_app: ctx.terminal_app,
        error: Some(format!("no transport could deliver the message (tried: {})", attempted.join(", "))),
        attempted,
        detail: None,
    }
}

#[allow(unused)]
fn default_adapter() -> Arc<dyn TerminalAdapter> {
    Arc::new(terminal::SystemTerminalAdapter)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
