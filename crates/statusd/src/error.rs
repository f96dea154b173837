// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unified error taxonomy shared by the socket server and the HTTP gateway.

use std::fmt;

/// Error categories a handler may surface, independent of transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed PID, JSON, oversize body, empty message.
    Input,
    /// Unauthorized or outside the CIDR allow-list.
    Auth,
    /// HTTP send rate exceeded.
    Rate,
    /// Socket daemon unreachable or returned an empty response.
    Upstream,
    /// Unknown endpoint or missing PID.
    NotFound,
    /// Message could not be delivered by any transport.
    Delivery,
    /// Malformed JSON in a bridge ack, telemetry file, or session file.
    Parse,
    /// Unexpected internal failure.
    Internal,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Input => 400,
            Self::Auth => 401,
            Self::Rate => 429,
            Self::Upstream => 502,
            Self::NotFound => 404,
            Self::Delivery => 200, // delivery failures are reported as ok:false, not an HTTP error
            Self::Parse => 400,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Auth => "auth",
            Self::Rate => "rate",
            Self::Upstream => "upstream",
            Self::NotFound => "not_found",
            Self::Delivery => "delivery",
            Self::Parse => "parse",
            Self::Internal => "internal",
        }
    }

    /// Build the `(StatusCode, Json<ErrorBody>)` pair a handler returns for
    /// this code, so the HTTP status and the body's `code` field can never
    /// drift apart.
    pub fn response(self, message: impl Into<String>) -> (axum::http::StatusCode, axum::Json<ErrorBody>) {
        let status =
            axum::http::StatusCode::from_u16(self.http_status()).unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        (status, axum::Json(ErrorBody::new(self, message)))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The `{ok:false, error:string, code:string}` body every failing response
/// carries, both over the socket and over HTTP.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: String,
    pub code: &'static str,
}

impl ErrorBody {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { ok: false, error: message.into(), code: code.as_str() }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
