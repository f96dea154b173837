// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authorization chain for the HTTP gateway (§4.10): CIDR allow-list, then
//! loopback exemption, then bearer token.

use std::net::IpAddr;

use axum::http::HeaderMap;

use crate::cidr::AllowList;

/// Constant-time string comparison, avoiding a timing side-channel on token
/// comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

fn extract_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(header) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        if let Some(token) = header.strip_prefix("Bearer ") {
            return Some(token);
        }
    }
    headers.get("x-statusd-token").and_then(|v| v.to_str().ok())
}

/// Evaluate the §4.10 authorization chain for one request.
///
/// (a) `ip` must match `allow_list` (empty list = allow all);
/// (b) loopback + `allow_loopback_unauth` authorizes unconditionally;
/// (c) otherwise a non-empty configured `token` must match the request's
///     `Authorization: Bearer` or `X-Statusd-Token` header.
pub fn authorize(
    ip: IpAddr,
    headers: &HeaderMap,
    allow_list: &AllowList,
    allow_loopback_unauth: bool,
    token: Option<&str>,
) -> bool {
    if !allow_list.allows(&ip) {
        return false;
    }
    if ip.is_loopback() && allow_loopback_unauth {
        return true;
    }
    let Some(expected) = token.filter(|t| !t.is_empty()) else { return false };
    match extract_token(headers) {
        Some(supplied) => constant_time_eq(supplied, expected),
        None => false,
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
