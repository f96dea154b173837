// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `statusd` binary and exercise
//! its control socket and HTTP gateway against an empty synthetic process
//! table (no real "pi" agents running in CI).

use std::time::Duration;

use serial_test::serial;
use statusd_specs::{socket_request, StatusdProcess};

const TIMEOUT: Duration = Duration::from_secs(10);

// -- Control socket -------------------------------------------------------

#[tokio::test]
#[serial]
async fn socket_ping() -> anyhow::Result<()> {
    let daemon = StatusdProcess::start()?;
    daemon.wait_healthy(TIMEOUT).await?;

    let socket_path = daemon.socket_path().ok_or_else(|| anyhow::anyhow!("no socket path"))?;
    let resp = socket_request(socket_path, "ping").await?;

    assert_eq!(resp["ok"], true);
    assert_eq!(resp["pong"], true);
    Ok(())
}

#[tokio::test]
#[serial]
async fn socket_status_with_no_agents() -> anyhow::Result<()> {
    let daemon = StatusdProcess::start()?;
    daemon.wait_healthy(TIMEOUT).await?;

    let socket_path = daemon.socket_path().ok_or_else(|| anyhow::anyhow!("no socket path"))?;
    let resp = socket_request(socket_path, "status").await?;

    assert_eq!(resp["ok"], true);
    assert!(resp["agents"].as_array().is_some_and(Vec::is_empty));
    assert!(resp["fingerprint"].is_string());
    Ok(())
}

#[tokio::test]
#[serial]
async fn socket_unknown_command_is_rejected() -> anyhow::Result<()> {
    let daemon = StatusdProcess::start()?;
    daemon.wait_healthy(TIMEOUT).await?;

    let socket_path = daemon.socket_path().ok_or_else(|| anyhow::anyhow!("no socket path"))?;
    let resp = socket_request(socket_path, "frobnicate").await?;

    assert_eq!(resp["ok"], false);
    Ok(())
}

#[tokio::test]
#[serial]
async fn socket_jump_rejects_missing_pid() -> anyhow::Result<()> {
    let daemon = StatusdProcess::start()?;
    daemon.wait_healthy(TIMEOUT).await?;

    let socket_path = daemon.socket_path().ok_or_else(|| anyhow::anyhow!("no socket path"))?;
    let resp = socket_request(socket_path, "jump 999999999").await?;

    assert_eq!(resp["ok"], false);
    Ok(())
}

#[tokio::test]
#[serial]
async fn socket_watch_times_out_without_changes() -> anyhow::Result<()> {
    let daemon = StatusdProcess::start()?;
    daemon.wait_healthy(TIMEOUT).await?;

    let socket_path = daemon.socket_path().ok_or_else(|| anyhow::anyhow!("no socket path"))?;
    let status = socket_request(socket_path, "status").await?;
    let fingerprint = status["fingerprint"].as_str().unwrap_or_default();

    let resp =
        socket_request(socket_path, &format!("watch 250 {fingerprint}")).await?;
    assert_eq!(resp["ok"], true);
    assert_eq!(resp["event"], "timeout");
    Ok(())
}

// -- HTTP gateway -----------------------------------------------------------

#[tokio::test]
#[serial]
async fn http_health() -> anyhow::Result<()> {
    let daemon = StatusdProcess::start()?;
    daemon.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value =
        reqwest::get(format!("{}/health", daemon.base_url())).await?.json().await?;
    assert_eq!(resp["ok"], true);
    assert_eq!(resp["pong"], true);
    Ok(())
}

#[tokio::test]
#[serial]
async fn http_banner() -> anyhow::Result<()> {
    let daemon = StatusdProcess::start()?;
    daemon.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value = reqwest::get(daemon.base_url()).await?.json().await?;
    assert_eq!(resp["ok"], true);
    assert_eq!(resp["service"], "statusd");
    Ok(())
}

#[tokio::test]
#[serial]
async fn http_status_with_no_agents() -> anyhow::Result<()> {
    let daemon = StatusdProcess::start()?;
    daemon.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value =
        reqwest::get(format!("{}/status", daemon.base_url())).await?.json().await?;
    assert_eq!(resp["ok"], true);
    assert!(resp["agents"].as_array().is_some_and(Vec::is_empty));
    Ok(())
}

#[tokio::test]
#[serial]
async fn http_send_rejects_empty_message() -> anyhow::Result<()> {
    let daemon = StatusdProcess::start()?;
    daemon.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/send", daemon.base_url()))
        .json(&serde_json::json!({ "pid": 1, "message": "   " }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 400);
    Ok(())
}

#[tokio::test]
#[serial]
async fn http_send_rejects_non_positive_pid() -> anyhow::Result<()> {
    let daemon = StatusdProcess::start()?;
    daemon.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/send", daemon.base_url()))
        .json(&serde_json::json!({ "pid": 0, "message": "hello" }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 400);
    Ok(())
}

#[tokio::test]
#[serial]
async fn http_watch_times_out_without_changes() -> anyhow::Result<()> {
    let daemon = StatusdProcess::start()?;
    daemon.wait_healthy(TIMEOUT).await?;

    let status: serde_json::Value =
        reqwest::get(format!("{}/status", daemon.base_url())).await?.json().await?;
    let fingerprint = status["fingerprint"].as_str().unwrap_or_default();

    let resp: serde_json::Value = reqwest::get(format!(
        "{}/watch?timeout_ms=250&fingerprint={fingerprint}",
        daemon.base_url()
    ))
    .await?
    .json()
    .await?;
    assert_eq!(resp["ok"], true);
    assert_eq!(resp["event"], "timeout");
    Ok(())
}

#[tokio::test]
#[serial]
async fn http_watch_agent_reports_not_found() -> anyhow::Result<()> {
    let daemon = StatusdProcess::start()?;
    daemon.wait_healthy(TIMEOUT).await?;

    let resp = reqwest::get(format!("{}/watch/999999999?timeout_ms=250", daemon.base_url())).await?;
    assert_eq!(resp.status().as_u16(), 404);
    Ok(())
}

#[tokio::test]
#[serial]
async fn http_token_auth_rejects_missing_bearer() -> anyhow::Result<()> {
    let daemon =
        StatusdProcess::build().http_token("secret-token").require_auth_for_loopback().spawn()?;
    daemon.wait_healthy(TIMEOUT).await?;

    let resp = reqwest::get(format!("{}/status", daemon.base_url())).await?;
    assert_eq!(resp.status().as_u16(), 401);
    Ok(())
}

#[tokio::test]
#[serial]
async fn http_token_auth_accepts_correct_bearer() -> anyhow::Result<()> {
    let daemon =
        StatusdProcess::build().http_token("secret-token").require_auth_for_loopback().spawn()?;
    daemon.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("{}/status", daemon.base_url()))
        .bearer_auth("secret-token")
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 200);
    Ok(())
}
