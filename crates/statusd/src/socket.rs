// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local Socket Server (C8): one JSON request/response per accepted
//! connection over a private UNIX socket, mode `0600` (§4.8/§6.1).

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use crate::config::Config;
use crate::error::{ErrorBody, ErrorCode};
use crate::mux::{classify_mux, detect_terminal_app};
use crate::process::read_process_table;
use crate::router::terminal::{SystemTerminalAdapter, TerminalAdapter};
use crate::scanner::Scanner;
use crate::watch;

/// Read buffer cap for one request line (§5 "read buffer per socket request 4 KiB initial").
const REQUEST_BUF_CAP: usize = 4096;
const BACKLOG: u32 = 32;

/// Bind the control socket at `path`, removing any stale file left behind by
/// a prior crashed instance, and set permissions to owner-only `0600`.
pub fn bind(path: &Path) -> std::io::Result<UnixListener> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    let listener = UnixListener::bind(path)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(listener)
}

/// Accept loop: each connection is handled on its own task; a panic or error
/// inside one connection never brings down the accept loop (§4.8/§5).
pub async fn serve(listener: UnixListener, scanner: Arc<Scanner>, config: Arc<Config>) {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let scanner = Arc::clone(&scanner);
                let config = Arc::clone(&config);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, scanner, config).await {
                        tracing::debug!(error = %e, "socket connection closed with error");
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "socket accept failed");
            }
        }
    }
}

async fn handle_connection(
    stream: UnixStream,
    scanner: Arc<Scanner>,
    config: Arc<Config>,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let mut line = String::new();
    let mut limited = (&mut reader).take(REQUEST_BUF_CAP as u64);
    limited.read_line(&mut line).await?;

    let response = dispatch(line.trim_end_matches(['\n', '\r']), &scanner, &config).await;
    let mut body = serde_json::to_vec(&response).unwrap_or_else(|_| b"{\"ok\":false}".to_vec());
    body.push(b'\n');
    writer.write_all(&body).await?;
    writer.shutdown().await?;
    Ok(())
}

/// Parse and execute one request line, returning its JSON response body.
/// Never panics: every branch that can fail produces `{ok:false, error:...}`.
async fn dispatch(line: &str, scanner: &Arc<Scanner>, config: &Arc<Config>) -> Value {
    let trimmed = line.trim();
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim();

    match command {
        "" | "status" => status_response(scanner).await,
        "ping" => ping_response(),
        "jump" => jump_response(config, rest),
        "latest" => latest_response(scanner, rest).await,
        "send" => send_response(config, rest).await,
        "watch" => watch_response(scanner, rest).await,
        other => error_json(ErrorCode::NotFound, format!("unknown request: {other}")),
    }
}

/// Build the `{ok:false, error, code}` body for a failing socket response,
/// sharing the taxonomy HTTP handlers use (§7).
fn error_json(code: ErrorCode, message: impl Into<String>) -> Value {
    serde_json::to_value(ErrorBody::new(code, message)).unwrap_or_else(|_| json!({ "ok": false }))
}

/// Normalized snapshot (fingerprint included), matching the HTTP `/status`
/// shape so socket and HTTP clients agree on what to feed back into `watch`.
async fn status_response(scanner: &Arc<Scanner>) -> Value {
    let snapshot = watch::snapshot(scanner).await;
    serde_json::to_value(snapshot).unwrap_or_else(|_| error_json(ErrorCode::Internal, "internal error"))
}

fn ping_response() -> Value {
    let timestamp =
        std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_secs();
    json!({ "ok": true, "pong": true, "timestamp": timestamp })
}

/// `jump <pid>`: best-effort window focus via the terminal adapter (§6.3/§6.6).
fn jump_response(config: &Config, rest: &str) -> Value {
    let Ok(pid) = rest.trim().parse::<u32>() else {
        return error_json(ErrorCode::Input, "usage: jump <pid>");
    };
    let rows = read_process_table();
    let by_pid: HashMap<u32, crate::agent::ProcessRow> = rows.iter().map(|r| (r.pid, r.clone())).collect();
    let Some(row) = by_pid.get(&pid).filter(|r| r.comm == "pi") else {
        return error_json(ErrorCode::NotFound, "pid not found");
    };

    let mux_class = classify_mux(pid, &by_pid);
    let (_, terminal_ancestor_pid) = detect_terminal_app(pid, &by_pid);
    let adapter = SystemTerminalAdapter;
    let hints: Vec<String> = mux_class.mux_session.iter().cloned().collect();

    let focused = terminal_ancestor_pid
        .map(|ancestor| adapter.focus_by_pid(ancestor, &hints))
        .unwrap_or(false)
        || (row.tty != "??" && adapter.focus_by_tty(&row.tty));

    json!({ "ok": focused, "pid": pid, "tty": row.tty })
}

async fn latest_response(scanner: &Arc<Scanner>, rest: &str) -> Value {
    let Ok(pid) = rest.trim().parse::<u32>() else {
        return error_json(ErrorCode::Input, "usage: latest <pid>");
    };
    let scanner = Arc::clone(scanner);
    let result = tokio::task::spawn_blocking(move || scanner.latest_message_for(pid)).await.unwrap_or(None);
    match result {
        None => error_json(ErrorCode::NotFound, "pid not found"),
        Some((text, at)) => json!({ "ok": true, "pid": pid, "latest_message": text, "latest_message_at": at }),
    }
}

async fn send_response(config: &Arc<Config>, rest: &str) -> Value {
    let mut parts = rest.splitn(2, char::is_whitespace);
    let Some(pid_str) = parts.next().filter(|s| !s.is_empty()) else {
        return error_json(ErrorCode::Input, "usage: send <pid> <message>");
    };
    let Ok(pid) = pid_str.parse::<u32>() else {
        return error_json(ErrorCode::Input, "usage: send <pid> <message>");
    };
    let message = parts.next().unwrap_or("").to_owned();

    let config = Arc::clone(config);
    let result = tokio::task::spawn_blocking(move || {
        let adapter = SystemTerminalAdapter;
        crate::router::send(&config, &adapter, pid, &message)
    })
    .await;
    match result {
        Ok(send_result) => {
            serde_json::to_value(send_result).unwrap_or_else(|_| error_json(ErrorCode::Internal, "internal error"))
        }
        Err(_) => error_json(ErrorCode::Internal, "internal error"),
    }
}

async fn watch_response(scanner: &Arc<Scanner>, rest: &str) -> Value {
    let mut parts = rest.split_whitespace();
    let timeout_ms = parts
        .next()
        .and_then(|s| s.parse::<i64>().ok())
        .map(watch::clamp_timeout_ms)
        .unwrap_or(watch::DEFAULT_TIMEOUT_MS);
    let fingerprint = parts.next().map(str::to_owned);

    let outcome = watch::watch_global(scanner, timeout_ms, fingerprint.as_deref(), "status_changed").await;
    json!({
        "ok": true,
        "event": outcome.event,
        "scan": outcome.snapshot,
        "changes": outcome.changes,
    })
}

/// The default socket-path resolution the server binds to, separated out so
/// `main` and tests can agree without re-deriving runtime-dir logic.
pub fn default_socket_path(config: &Config) -> PathBuf {
    config.socket_path()
}

#[cfg(test)]
#[path = "socket_tests.rs"]
mod tests;
