// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use statusd::config::{Command, Config};

#[tokio::main]
async fn main() {
    let config = Config::parse();

    match &config.command {
        Some(Command::Status) => {
            std::process::exit(statusd::client::run(&config.socket_path(), "status").await);
        }
        Some(Command::Ping) => {
            std::process::exit(statusd::client::run(&config.socket_path(), "ping").await);
        }
        Some(Command::Send { pid, message }) => {
            let message = message.join(" ");
            let request = format!("send {pid} {message}");
            std::process::exit(statusd::client::run(&config.socket_path(), &request).await);
        }
        Some(Command::Jump { pid }) => {
            let request = format!("jump {pid}");
            std::process::exit(statusd::client::run(&config.socket_path(), &request).await);
        }
        None => {
            if let Err(e) = statusd::run::run(config).await {
                error!("fatal: {e:#}");
                std::process::exit(1);
            }
        }
    }
}
