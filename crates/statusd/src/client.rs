// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot CLI client: connects to a running daemon's control socket,
//! writes a single request line, prints the JSON response, and exits
//! (§6.6/§6.10). Mirrors the request/response shape `socket::dispatch`
//! implements on the server side.

use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// Send `request` as a single line to the socket at `path`, print whatever
/// single-line JSON response comes back, and return a process exit code.
pub async fn run(path: &Path, request: &str) -> i32 {
    let stream = match UnixStream::connect(path).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("error: failed to connect to {}: {e}", path.display());
            return 1;
        }
    };

    let (reader, mut writer) = stream.into_split();
    let mut line = format!("{request}\n");
    if let Err(e) = writer.write_all(line.as_bytes()).await {
        eprintln!("error: failed to write request: {e}");
        return 1;
    }
    if let Err(e) = writer.shutdown().await {
        eprintln!("error: failed to shut down write half: {e}");
        return 1;
    }

    line.clear();
    let mut reader = BufReader::new(reader);
    match reader.read_line(&mut line).await {
        Ok(0) => {
            eprintln!("error: daemon closed the connection without a response");
            1
        }
        Ok(_) => {
            let trimmed = line.trim_end();
            println!("{trimmed}");
            let ok = serde_json::from_str::<serde_json::Value>(trimmed)
                .ok()
                .and_then(|v| v.get("ok").and_then(serde_json::Value::as_bool))
                .unwrap_or(false);
            if ok {
                0
            } else {
                1
            }
        }
        Err(e) => {
            eprintln!("error: failed to read response: {e}");
            1
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
