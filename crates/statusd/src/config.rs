// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

/// Local per-user status daemon for "pi" coding-agent processes.
#[derive(Debug, Parser)]
#[command(name = "statusd", version, about)]
pub struct Config {
    /// Path to the local control-plane UNIX socket.
    #[arg(long, env = "STATUSD_SOCKET")]
    pub socket: Option<PathBuf>,

    /// Optional JSON config file layered beneath flags/env (lowest precedence).
    #[arg(long, env = "PI_STATUSD_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// HTTP host to bind.
    #[arg(long, env = "PI_STATUSD_HTTP_HOST", default_value = "0.0.0.0")]
    pub http_host: String,

    /// HTTP port to bind.
    #[arg(long, env = "PI_STATUSD_HTTP_PORT", default_value = "8787")]
    pub http_port: u16,

    /// Bearer token required for non-loopback HTTP clients.
    #[arg(long, env = "PI_STATUSD_HTTP_TOKEN")]
    pub http_token: Option<String>,

    /// Comma-separated CIDR allow-list; empty = allow all.
    #[arg(long, env = "PI_STATUSD_HTTP_ALLOW_CIDRS", default_value = "")]
    pub http_allow_cidrs: String,

    /// Enable the HTTPS listener.
    #[arg(long, env = "PI_STATUSD_HTTPS_ENABLED", default_value = "false")]
    pub https_enabled: bool,

    /// HTTPS host to bind.
    #[arg(long, env = "PI_STATUSD_HTTPS_HOST", default_value = "0.0.0.0")]
    pub https_host: String,

    /// HTTPS port to bind.
    #[arg(long, env = "PI_STATUSD_HTTPS_PORT", default_value = "8788")]
    pub https_port: u16,

    /// Path to the TLS certificate (PEM) for the HTTPS listener.
    #[arg(long, env = "PI_STATUSD_HTTPS_CERT_PATH")]
    pub https_cert_path: Option<PathBuf>,

    /// Path to the TLS private key (PEM) for the HTTPS listener.
    #[arg(long, env = "PI_STATUSD_HTTPS_KEY_PATH")]
    pub https_key_path: Option<PathBuf>,

    /// Authorize unauthenticated loopback clients.
    #[arg(long, env = "PI_STATUSD_ALLOW_LOOPBACK_UNAUTH", default_value = "true")]
    pub allow_loopback_unauth: bool,

    /// `/send` rate limit per 10s window, per client IP (clamped 1..200).
    #[arg(long, env = "PI_STATUSD_SEND_RATE_PER_10S", default_value = "12")]
    pub send_rate_per_10s: u32,

    /// Telemetry directory override.
    #[arg(long, env = "PI_TELEMETRY_DIR")]
    pub telemetry_dir: Option<PathBuf>,

    /// Telemetry staleness window in ms.
    #[arg(long, env = "PI_TELEMETRY_STALE_MS", default_value = "10000")]
    pub telemetry_stale_ms: u64,

    /// File bridge base directory override.
    #[arg(long, env = "PI_BRIDGE_DIR")]
    pub bridge_dir: Option<PathBuf>,

    /// Bridge registry liveness window in ms (clamp >= 1000).
    #[arg(long, env = "PI_BRIDGE_REGISTRY_STALE_MS", default_value = "10000")]
    pub bridge_registry_stale_ms: u64,

    /// Per-attempt bridge ack wait in ms.
    #[arg(long, env = "PI_BRIDGE_ACK_TIMEOUT_MS", default_value = "1200")]
    pub bridge_ack_timeout_ms: u64,

    /// Max bridge send attempts (clamp 1..8).
    #[arg(long, env = "PI_BRIDGE_SEND_RETRIES", default_value = "3")]
    pub bridge_send_retries: u32,

    /// Bridge retry backoff in ms (clamp 100..3000).
    #[arg(long, env = "PI_BRIDGE_SEND_RETRY_BACKOFF_MS", default_value = "450")]
    pub bridge_send_retry_backoff_ms: u64,

    /// Log format (json or text).
    #[arg(long, env = "STATUSD_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "STATUSD_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// One-shot CLI operations, as opposed to running the server (§6.6/§6.10).
#[derive(Debug, Clone, clap::Subcommand)]
pub enum Command {
    /// Print the current scan as JSON and exit.
    Status,
    /// Proxy a single `ping` request to a running daemon.
    Ping,
    /// Proxy a single `send` request to a running daemon.
    Send { pid: u32, message: Vec<String> },
    /// Proxy a single `jump` request to a running daemon.
    Jump { pid: u32 },
}

/// Lower-precedence config-file layer: CLI flag > env var > file value > default.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub token: Option<String>,
    pub allow_cidrs: Option<Vec<String>>,
    pub https_enabled: Option<bool>,
    pub https_host: Option<String>,
    pub https_port: Option<u16>,
    pub https_cert_path: Option<String>,
    pub https_key_path: Option<String>,
    pub allow_loopback_unauth: Option<bool>,
    pub send_rate_per_10s: Option<u32>,
}

impl Config {
    /// Validate clamps and mutual-exclusion invariants after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.https_enabled && (self.https_cert_path.is_none() || self.https_key_path.is_none()) {
            anyhow::bail!("--https-enabled requires --https-cert-path and --https-key-path");
        }
        if self.bridge_send_retries == 0 {
            anyhow::bail!("--bridge-send-retries must be at least 1");
        }
        Ok(())
    }

    pub fn clamped_send_rate_per_10s(&self) -> u32 {
        self.send_rate_per_10s.clamp(1, 200)
    }

    pub fn clamped_bridge_send_retries(&self) -> u32 {
        self.bridge_send_retries.clamp(1, 8)
    }

    pub fn clamped_bridge_send_retry_backoff_ms(&self) -> u64 {
        self.bridge_send_retry_backoff_ms.clamp(100, 3000)
    }

    pub fn clamped_bridge_registry_stale_ms(&self) -> u64 {
        self.bridge_registry_stale_ms.max(1000)
    }

    /// Resolve the UNIX control-plane socket path: `--socket`/`STATUSD_SOCKET`
    /// if set, else `<runtime_dir>/statusd.sock` (§4.8).
    pub fn socket_path(&self) -> PathBuf {
        self.socket.clone().unwrap_or_else(|| {
            runtime_dir().unwrap_or_else(|| PathBuf::from("/tmp/statusd")).join("statusd.sock")
        })
    }

    /// Load the config-file layer, if one is configured and present. Missing
    /// files are not an error — they simply leave every field at its default.
    pub fn load_file(&self) -> anyhow::Result<ConfigFile> {
        let Some(path) = self.config_file.as_ref().or(default_config_path().as_ref()) else {
            return Ok(ConfigFile::default());
        };
        if !path.exists() {
            return Ok(ConfigFile::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Layer the config-file fields beneath whatever the CLI flags/env vars
    /// already produced: precedence is CLI flag > env var > file value >
    /// built-in default (§6.5). Since clap bakes a field's default in at
    /// parse time, a field is only eligible for the file layer when it still
    /// equals that default *and* its env var is unset — a flag or env var
    /// explicitly set to the default value is indistinguishable from "unset"
    /// here, which is the one acceptable imprecision in this scheme.
    pub fn apply_file(&mut self, file: &ConfigFile) {
        let env_unset = |name: &str| std::env::var_os(name).is_none();

        if self.http_host == "0.0.0.0" && env_unset("PI_STATUSD_HTTP_HOST") {
            if let Some(host) = &file.host {
                self.http_host = host.clone();
            }
        }
        if self.http_port == 8787 && env_unset("PI_STATUSD_HTTP_PORT") {
            if let Some(port) = file.port {
                self.http_port = port;
            }
        }
        if self.http_token.is_none() && env_unset("PI_STATUSD_HTTP_TOKEN") {
            if let Some(token) = &file.token {
                self.http_token = Some(token.clone());
            }
        }
        if self.http_allow_cidrs.is_empty() && env_unset("PI_STATUSD_HTTP_ALLOW_CIDRS") {
            if let Some(cidrs) = &file.allow_cidrs {
                self.http_allow_cidrs = cidrs.join(",");
            }
        }
        if !self.https_enabled && env_unset("PI_STATUSD_HTTPS_ENABLED") {
            if let Some(enabled) = file.https_enabled {
                self.https_enabled = enabled;
            }
        }
        if self.https_host == "0.0.0.0" && env_unset("PI_STATUSD_HTTPS_HOST") {
            if let Some(host) = &file.https_host {
                self.https_host = host.clone();
            }
        }
        if self.https_port == 8788 && env_unset("PI_STATUSD_HTTPS_PORT") {
            if let Some(port) = file.https_port {
                self.https_port = port;
            }
        }
        if self.https_cert_path.is_none() && env_unset("PI_STATUSD_HTTPS_CERT_PATH") {
            if let Some(path) = &file.https_cert_path {
                self.https_cert_path = Some(PathBuf::from(path));
            }
        }
        if self.https_key_path.is_none() && env_unset("PI_STATUSD_HTTPS_KEY_PATH") {
            if let Some(path) = &file.https_key_path {
                self.https_key_path = Some(PathBuf::from(path));
            }
        }
        if self.allow_loopback_unauth && env_unset("PI_STATUSD_ALLOW_LOOPBACK_UNAUTH") {
            if let Some(allow) = file.allow_loopback_unauth {
                self.allow_loopback_unauth = allow;
            }
        }
        if self.send_rate_per_10s == 12 && env_unset("PI_STATUSD_SEND_RATE_PER_10S") {
            if let Some(rate) = file.send_rate_per_10s {
                self.send_rate_per_10s = rate;
            }
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    runtime_dir().map(|dir| dir.join("statusd-http.json"))
}

/// The per-user runtime directory: `$XDG_RUNTIME_DIR` if set, else `~/.pi/agent`.
pub fn runtime_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        if !dir.is_empty() {
            return Some(PathBuf::from(dir).join("statusd"));
        }
    }
    std::env::var("HOME").ok().map(|home| PathBuf::from(home).join(".pi").join("agent"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
