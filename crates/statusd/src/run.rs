// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server entry point: wires the socket server (C8), HTTP gateway, and
//! optional HTTPS listener (C10) onto a shared `Scanner`, and drives them
//! until a shutdown signal arrives. Mirrors the teacher's `run::prepare`/
//! `run::run` split between "start every configured listener" and "wait for
//! SIGTERM/SIGINT", adapted from a single multi-transport session server to
//! this daemon's fixed trio of listeners.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::http::AppState;
use crate::scanner::Scanner;

/// Priority: `--log-level`/`STATUSD_LOG_LEVEL` > `RUST_LOG` > default `info`,
/// matching the teacher's `init_tracing` chain (§6.7).
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let level = config.log_level.as_deref();
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

/// Start the socket server, HTTP gateway, and (if enabled) HTTPS listener,
/// then block until a shutdown signal is observed.
pub async fn run(mut config: Config) -> anyhow::Result<()> {
    let file = config.load_file().unwrap_or_default();
    config.apply_file(&file);
    init_tracing(&config);
    config.validate()?;

    let config = Arc::new(config);
    let scanner = Arc::new(Scanner::new(Arc::clone(&config)));
    let shutdown = CancellationToken::new();

    spawn_socket_server(Arc::clone(&config), Arc::clone(&scanner), shutdown.clone()).await?;

    let app_state = Arc::new(AppState::new(Arc::clone(&scanner), Arc::clone(&config)));
    spawn_http_server(Arc::clone(&config), Arc::clone(&app_state), shutdown.clone()).await?;

    if config.https_enabled {
        spawn_https_server(Arc::clone(&config), app_state, shutdown.clone()).await?;
    }

    spawn_signal_handler(shutdown.clone());

    shutdown.cancelled().await;
    info!("statusd shutting down");
    Ok(())
}

async fn spawn_socket_server(
    config: Arc<Config>,
    scanner: Arc<Scanner>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let path = config.socket_path();
    let listener = crate::socket::bind(&path)?;
    info!(path = %path.display(), "control socket listening");
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown.cancelled() => {}
            () = crate::socket::serve(listener, scanner, config) => {}
        }
    });
    Ok(())
}

async fn spawn_http_server(
    config: Arc<Config>,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.http_host, config.http_port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "http gateway listening");
    let router = crate::http::build_router(state).into_make_service_with_connect_info::<SocketAddr>();
    tokio::spawn(async move {
        let result = axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await;
        if let Err(e) = result {
            error!(error = %e, "http server error");
        }
    });
    Ok(())
}

async fn spawn_https_server(
    config: Arc<Config>,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let (Some(cert_path), Some(key_path)) = (config.https_cert_path.clone(), config.https_key_path.clone()) else {
        anyhow::bail!("--https-enabled requires --https-cert-path and --https-key-path");
    };
    let tls_config = crate::http::tls::load_server_config(&cert_path, &key_path)?;
    let addr: SocketAddr = format!("{}:{}", config.https_host, config.https_port).parse()?;
    info!(%addr, "https gateway listening");
    let router = crate::http::build_router(state);
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown.cancelled() => {}
            result = crate::http::tls::serve(addr, tls_config, router) => {
                if let Err(e) = result {
                    error!(error = %e, "https server error");
                }
            }
        }
    });
    Ok(())
}

/// First SIGTERM/SIGINT triggers graceful shutdown; a second forces an
/// immediate exit, matching the teacher's two-stage signal handler.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async { if let Some(s) = sigterm.as_mut() { s.recv().await } else { std::future::pending().await } } => {
                info!("received SIGTERM");
            }
            _ = async { if let Some(s) = sigint.as_mut() { s.recv().await } else { std::future::pending().await } } => {
                info!("received SIGINT");
            }
        }
        shutdown.cancel();

        tokio::select! {
            _ = async { if let Some(s) = sigterm.as_mut() { s.recv().await } else { std::future::pending().await } } => {
                info!("received SIGTERM again, forcing exit");
            }
            _ = async { if let Some(s) = sigint.as_mut() { s.recv().await } else { std::future::pending().await } } => {
                info!("received SIGINT again, forcing exit");
            }
        }
        std::process::exit(130);
    });
}
