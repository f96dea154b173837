// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `statusd` binary as a subprocess, pointed at a synthetic
//! telemetry/bridge directory pair, and exercises it over its control socket
//! and HTTP gateway.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// Resolve the path to the compiled `statusd` binary.
pub fn statusd_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("statusd")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Send one line to the control socket and return the parsed JSON response.
pub async fn socket_request(socket_path: &Path, request: &str) -> anyhow::Result<serde_json::Value> {
    let stream = UnixStream::connect(socket_path).await?;
    let (reader, mut writer) = stream.into_split();
    writer.write_all(format!("{request}\n").as_bytes()).await?;
    writer.shutdown().await?;

    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    reader.read_line(&mut line).await?;
    Ok(serde_json::from_str(line.trim_end())?)
}

/// A running `statusd` process that is killed on drop.
pub struct StatusdProcess {
    child: Child,
    http_port: Option<u16>,
    socket_path: Option<PathBuf>,
    _state_dir: tempfile::TempDir,
}

/// Builder for configuring which surfaces a [`StatusdProcess`] enables and
/// which synthetic process/telemetry fixtures it should read from.
pub struct StatusdBuilder {
    http: bool,
    socket: bool,
    http_token: Option<String>,
    allow_cidrs: Option<String>,
    allow_loopback_unauth: bool,
}

impl Default for StatusdBuilder {
    fn default() -> Self {
        Self { http: true, socket: true, http_token: None, allow_cidrs: None, allow_loopback_unauth: true }
    }
}

impl StatusdBuilder {
    /// Disable the HTTP gateway.
    pub fn no_http(mut self) -> Self {
        self.http = false;
        self
    }

    /// Disable the control socket.
    pub fn no_socket(mut self) -> Self {
        self.socket = false;
        self
    }

    /// Require a bearer token for non-loopback HTTP clients.
    pub fn http_token(mut self, token: &str) -> Self {
        self.http_token = Some(token.to_owned());
        self
    }

    /// Restrict the HTTP gateway to the given comma-separated CIDR list.
    pub fn allow_cidrs(mut self, cidrs: &str) -> Self {
        self.allow_cidrs = Some(cidrs.to_owned());
        self
    }

    /// Require the bearer token even for loopback clients.
    pub fn require_auth_for_loopback(mut self) -> Self {
        self.allow_loopback_unauth = false;
        self
    }

    /// Spawn `statusd` with the configured surfaces, reading telemetry and
    /// bridge state from fresh, empty directories under a temp root.
    pub fn spawn(self) -> anyhow::Result<StatusdProcess> {
        let binary = statusd_binary();
        anyhow::ensure!(binary.exists(), "statusd binary not found at {}", binary.display());

        let state_dir = tempfile::tempdir()?;
        let telemetry_dir = state_dir.path().join("telemetry");
        let bridge_dir = state_dir.path().join("bridge");
        std::fs::create_dir_all(&telemetry_dir)?;
        std::fs::create_dir_all(&bridge_dir)?;

        let http_port = if self.http { Some(free_port()?) } else { None };
        let socket_path = if self.socket { Some(state_dir.path().join("statusd.sock")) } else { None };

        let mut cmd = Command::new(&binary);
        cmd.env("PI_TELEMETRY_DIR", &telemetry_dir)
            .env("PI_BRIDGE_DIR", &bridge_dir)
            .env("STATUSD_LOG_FORMAT", "text")
            .env("STATUSD_LOG_LEVEL", "warn");

        if let Some(port) = http_port {
            cmd.env("PI_STATUSD_HTTP_HOST", "127.0.0.1").env("PI_STATUSD_HTTP_PORT", port.to_string());
        } else {
            cmd.env("PI_STATUSD_HTTP_PORT", free_port()?.to_string());
        }
        if let Some(ref path) = socket_path {
            cmd.env("STATUSD_SOCKET", path);
        } else {
            cmd.env("STATUSD_SOCKET", state_dir.path().join("unused.sock"));
        }
        if let Some(ref token) = self.http_token {
            cmd.env("PI_STATUSD_HTTP_TOKEN", token);
        }
        if let Some(ref cidrs) = self.allow_cidrs {
            cmd.env("PI_STATUSD_HTTP_ALLOW_CIDRS", cidrs);
        }
        cmd.env("PI_STATUSD_ALLOW_LOOPBACK_UNAUTH", self.allow_loopback_unauth.to_string());

        let child = cmd.stdout(Stdio::null()).stderr(Stdio::null()).spawn()?;

        Ok(StatusdProcess { child, http_port, socket_path, _state_dir: state_dir })
    }
}

impl StatusdProcess {
    /// Create a builder for custom surface configuration.
    pub fn build() -> StatusdBuilder {
        StatusdBuilder::default()
    }

    /// Spawn `statusd` with both the socket and HTTP gateway enabled.
    pub fn start() -> anyhow::Result<Self> {
        Self::build().spawn()
    }

    /// The HTTP gateway port, if enabled.
    pub fn http_port(&self) -> Option<u16> {
        self.http_port
    }

    /// The control socket path, if enabled.
    pub fn socket_path(&self) -> Option<&Path> {
        self.socket_path.as_deref()
    }

    /// Base URL for HTTP requests.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.http_port.unwrap_or(0))
    }

    /// Poll `/health` (or the socket's `ping`) until the daemon responds.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("statusd did not become healthy within {timeout:?}");
            }

            if let Some(path) = &self.socket_path {
                if socket_request(path, "ping").await.is_ok() {
                    return Ok(());
                }
            } else if let Some(port) = self.http_port {
                let url = format!("http://127.0.0.1:{port}/health");
                if let Ok(resp) = reqwest::get(&url).await {
                    if resp.status().is_success() {
                        return Ok(());
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for StatusdProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
