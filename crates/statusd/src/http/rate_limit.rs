// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-client-IP sliding-window rate limiter for `POST /send` (§4.10/§5).

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(10);

/// Deque of request timestamps per IP, pruned to the trailing 10 s window on
/// every check. Guarded by a single mutex: handlers are per-connection
/// threads/tasks, not a hot path worth lock-sharding (§5).
#[derive(Default)]
pub struct RateLimiter {
    hits: Mutex<HashMap<IpAddr, Vec<Instant>>>,
}

impl RateLimiter {
    /// Record one request from `ip` and report whether it stays within
    /// `limit` requests per rolling 10 s window.
    pub fn check(&self, ip: IpAddr, limit: u32) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());
        let entry = hits.entry(ip).or_default();
        entry.retain(|t| now.duration_since(*t) < WINDOW);
        if entry.len() >= limit as usize {
            return false;
        }
        entry.push(now);
        true
    }
}

#[cfg(test)]
#[path = "rate_limit_tests.rs"]
mod tests;
