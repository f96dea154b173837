// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP Gateway (C10): dual HTTP/HTTPS listeners, auth chain, send
//! rate-limiting, and the long-poll/SSE watch endpoints.

pub mod auth;
pub mod rate_limit;
pub mod tls;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Path as AxumPath, Query, State};
use axum::http::HeaderMap;
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::cidr::AllowList;
use crate::config::Config;
use crate::error::ErrorCode;
use crate::scanner::Scanner;
use crate::watch;
use rate_limit::RateLimiter;

/// Shared, read-only-after-startup state handed to every handler (§5).
pub struct AppState {
    pub scanner: Arc<Scanner>,
    pub config: Arc<Config>,
    pub allow_list: AllowList,
    pub rate_limiter: RateLimiter,
    pub https_enabled: bool,
    pub cert_sha256: Option<String>,
}

impl AppState {
    pub fn new(scanner: Arc<Scanner>, config: Arc<Config>) -> Self {
        let allow_list = AllowList::parse(&config.http_allow_cidrs);
        let cert_sha256 = config
            .https_cert_path
            .as_deref()
            .and_then(|p| tls::cert_sha256_hex(p).ok());
        let https_enabled = config.https_enabled;
        Self { scanner, config, allow_list, rate_limiter: RateLimiter::default(), https_enabled, cert_sha256 }
    }
}

/// Build the axum `Router` with every §4.10 endpoint, wrapped in the
/// authorization middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        .route("/tls", get(tls_info))
        .route("/status", get(status))
        .route("/watch", get(watch_global))
        .route("/watch/{pid}", get(watch_agent))
        .route("/send", post(send))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), auth_middleware))
        .with_state(state)
}

async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    req: axum::extract::Request,
    next: Next,
) -> Response {
    let authorized = auth::authorize(
        addr.ip(),
        &headers,
        &state.allow_list,
        state.config.allow_loopback_unauth,
        state.config.http_token.as_deref(),
    );
    if !authorized {
        return ErrorCode::Auth.response("unauthorized").into_response();
    }
    next.run(req).await
}

async fn banner() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true, "service": "statusd", "api_version": 3 }))
}

async fn health() -> impl IntoResponse {
    let timestamp =
        std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_secs();
    Json(serde_json::json!({ "ok": true, "pong": true, "timestamp": timestamp }))
}

async fn tls_info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "ok": true,
        "https_enabled": state.https_enabled,
        "https_port": state.config.https_port,
        "cert_sha256": state.cert_sha256,
    }))
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(watch::snapshot(&state.scanner).await)
}

#[derive(Debug, Deserialize)]
struct WatchQuery {
    timeout_ms: Option<i64>,
    fingerprint: Option<String>,
}

async fn watch_global(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WatchQuery>,
) -> impl IntoResponse {
    let timeout_ms = query.timeout_ms.map(watch::clamp_timeout_ms).unwrap_or(watch::DEFAULT_TIMEOUT_MS);
    let outcome = watch::watch_global(&state.scanner, timeout_ms, query.fingerprint.as_deref(), "snapshot").await;
    Json(serde_json::json!({
        "ok": true,
        "event": outcome.event,
        "scan": outcome.snapshot,
        "changes": outcome.changes,
    }))
}

/// `GET /watch/<pid>`: SSE when `Accept: text/event-stream`, else a plain
/// long-poll JSON response mirroring the socket's per-agent semantics.
async fn watch_agent(
    State(state): State<Arc<AppState>>,
    AxumPath(pid): AxumPath<u32>,
    Query(query): Query<WatchQuery>,
    headers: HeaderMap,
) -> Response {
    let wants_sse =
        headers.get(axum::http::header::ACCEPT).and_then(|v| v.to_str().ok()).is_some_and(|v| v.contains("text/event-stream"));

    if wants_sse {
        let last_event_id = headers.get("last-event-id").and_then(|v| v.to_str().ok()).map(str::to_owned);
        return watch_agent_sse(state, pid, last_event_id).await.into_response();
    }

    let timeout_ms = query.timeout_ms.map(watch::clamp_timeout_ms).unwrap_or(watch::DEFAULT_TIMEOUT_MS);
    match watch::watch_agent(&state.scanner, pid, timeout_ms, query.fingerprint.as_deref()).await {
        watch::PerAgentOutcome::NotFound => ErrorCode::NotFound.response("pid not found").into_response(),
        watch::PerAgentOutcome::Event { event, agent } => {
            Json(serde_json::json!({ "ok": true, "event": event, "agent": agent })).into_response()
        }
    }
}

async fn watch_agent_sse(
    state: Arc<AppState>,
    pid: u32,
    last_event_id: Option<String>,
) -> Sse<ReceiverStream<Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel(8);

    tokio::spawn(async move {
        let Some(initial) = watch::current_agent(&state.scanner, pid).await else {
            let event = Event::default()
                .event("error")
                .data(serde_json::json!({ "ok": false, "error": "pid not found" }).to_string());
            let _ = tx.send(Ok(event)).await;
            return;
        };

        let initial_id = format!("{pid}:{}", initial.fingerprint);
        let suppress_initial = last_event_id.as_deref() == Some(initial_id.as_str());
        if !suppress_initial {
            let event_name = if last_event_id.is_some() { "out_of_sync" } else { "snapshot" };
            let event = Event::default()
                .event(event_name)
                .id(initial_id.clone())
                .data(serde_json::to_string(&initial).unwrap_or_default());
            if tx.send(Ok(event)).await.is_err() {
                return;
            }
        }

        let mut fingerprint = initial.fingerprint;
        loop {
            let outcome = watch::watch_agent(&state.scanner, pid, 30_000, Some(fingerprint.as_str())).await;
            let (event_name, agent) = match outcome {
                watch::PerAgentOutcome::NotFound => ("agent_gone", None),
                watch::PerAgentOutcome::Event { event, agent } => (event, agent),
            };
            if event_name == "timeout" {
                continue;
            }
            let id = match &agent {
                Some(a) => format!("{pid}:{}", a.fingerprint),
                None => format!("{pid}:gone"),
            };
            let data = agent
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .ok()
                .flatten()
                .unwrap_or_else(|| serde_json::json!({ "pid": pid }).to_string());
            let event = Event::default().event(event_name).id(id).data(data);
            if tx.send(Ok(event)).await.is_err() || event_name == "agent_gone" {
                return;
            }
            if let Some(a) = agent {
                fingerprint = a.fingerprint;
            }
        }
    });

    Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keepalive"))
}

#[derive(Debug, Deserialize)]
struct SendRequest {
    pid: i64,
    message: String,
}

const MAX_SEND_BODY_BYTES: usize = 100_000;
const MAX_SEND_MESSAGE_CHARS: usize = 4000;

async fn send(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    if body.is_empty() || body.len() > MAX_SEND_BODY_BYTES {
        return ErrorCode::Input.response("body must be 1..100000 bytes").into_response();
    }
    if let Some(len) = headers.get(axum::http::header::CONTENT_LENGTH).and_then(|v| v.to_str().ok()).and_then(|v| v.parse::<usize>().ok()) {
        if len == 0 || len > MAX_SEND_BODY_BYTES {
            return ErrorCode::Input.response("body must be 1..100000 bytes").into_response();
        }
    }

    let req: SendRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(_) => return ErrorCode::Input.response("malformed json body").into_response(),
    };
    if req.pid <= 0 {
        return ErrorCode::Input.response("pid must be a positive integer").into_response();
    }

    let normalized = req.message.replace('\n', " ").split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() || normalized.chars().count() > MAX_SEND_MESSAGE_CHARS {
        return ErrorCode::Input.response("message must be non-empty and at most 4000 characters").into_response();
    }

    if !state.rate_limiter.check(addr.ip(), state.config.clamped_send_rate_per_10s()) {
        return ErrorCode::Rate.response("send rate limit exceeded").into_response();
    }

    let pid = req.pid as u32;
    let config = Arc::clone(&state.config);
    let result = tokio::task::spawn_blocking(move || {
        let adapter = crate::router::terminal::SystemTerminalAdapter;
        crate::router::send(&config, &adapter, pid, &normalized)
    })
    .await;

    match result {
        Ok(send_result) => Json(send_result).into_response(),
        Err(_) => ErrorCode::Internal.response("internal error").into_response(),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
