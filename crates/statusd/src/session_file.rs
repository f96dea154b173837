// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session File Parser (C4): given a path to an append-only JSON-lines
//! transcript, extract the most recent assistant message text and timestamp.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Read at most this many trailing bytes of the transcript.
const TAIL_BYTES: u64 = 512 * 1024;
/// Cap on the returned text, tail-ellipsized.
const MAX_TEXT_CHARS: usize = 12_000;

const TOOL_TRACE_PREFIXES: &[&str] =
    &["edit ", "write ", "read ", "bash ", "rg ", "find ", "python3 "];
const TOOL_TRACE_MARKERS: &[&str] = &["tool_uses", "recipient_name"];
const THINKING_MARKERS: &[&str] = &["thinking", "reasoning", "working...", "visual latest"];
const STRUCTURAL_SKIP_ROLES: &[&str] = &["tool", "reasoning", "thinking", "tool_result", "system"];

#[allow(clippy::unwrap_used)]
fn ansi_csi_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").unwrap())
}

/// Parse a session transcript and return `(text, timestamp_ms)`.
pub fn parse_session_file(path: &Path) -> (Option<String>, Option<i64>) {
    let Some(tail) = read_tail(path, TAIL_BYTES) else { return (None, None) };
    parse_tail(&tail)
}

fn read_tail(path: &Path, max_bytes: u64) -> Option<String> {
    use std::io::{Read, Seek, SeekFrom};
    let mut file = std::fs::File::open(path).ok()?;
    let len = file.metadata().ok()?.len();
    let start = len.saturating_sub(max_bytes);
    file.seek(SeekFrom::Start(start)).ok()?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).ok()?;
    Some(String::from_utf8_lossy(&buf).into_owned())
}

fn parse_tail(tail: &str) -> (Option<String>, Option<i64>) {
    let lines: Vec<&str> = tail.lines().collect();

    let mut assistant_started = false;
    let mut accepted: Vec<String> = Vec::new(); // backward order: newest first
    let mut newest_ts: Option<i64> = None;
    let mut fallback_thinking: Option<String> = None;

    for line in lines.iter().rev() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
            if assistant_started {
                break;
            }
            continue;
        };

        let inner = unwrap_message(&value);
        let role = role_of(inner);

        if role.as_deref() == Some("user") && assistant_started {
            break;
        }
        if let Some(role) = role.as_deref() {
            if STRUCTURAL_SKIP_ROLES.contains(&role) {
                continue;
            }
            if role != "assistant" {
                continue;
            }
        }

        let Some(text) = extract_text(inner) else { continue };
        let cleaned = clean_text(&text);
        if cleaned.is_empty() {
            continue;
        }

        assistant_started = true;

        if is_tool_trace(&cleaned) {
            continue;
        }
        if is_thinking_status(&cleaned) {
            if fallback_thinking.is_none() {
                fallback_thinking = Some(cleaned);
            }
            continue;
        }

        if newest_ts.is_none() {
            newest_ts = timestamp_of(inner);
        }
        accepted.push(cleaned);
    }

    let final_text = if !accepted.is_empty() {
        accepted.reverse(); // chronological order
        Some(merge_chunks(accepted))
    } else {
        fallback_thinking
    };

    (final_text.map(|t| cap_text(&t)), newest_ts)
}

/// Unwrap `{type:"message", message:{...}}` when present.
fn unwrap_message(value: &Value) -> &Value {
    if value.get("type").and_then(Value::as_str) == Some("message") {
        if let Some(inner) = value.get("message") {
            return inner;
        }
    }
    value
}

fn role_of(value: &Value) -> Option<String> {
    value.get("role").and_then(Value::as_str).map(str::to_owned)
}

fn timestamp_of(value: &Value) -> Option<i64> {
    value
        .get("timestamp")
        .or_else(|| value.get("ts"))
        .or_else(|| value.get("createdAt"))
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
}

/// Extract text from `content` (array items with `type` in {text,output_text};
/// recurse on strings/lists), or `text`/`output`.
fn extract_text(value: &Value) -> Option<String> {
    if let Some(content) = value.get("content") {
        if let Some(text) = extract_from_content(content) {
            return Some(text);
        }
    }
    if let Some(text) = value.get("text").and_then(Value::as_str) {
        return Some(text.to_owned());
    }
    if let Some(text) = value.get("output").and_then(Value::as_str) {
        return Some(text.to_owned());
    }
    None
}

fn extract_from_content(content: &Value) -> Option<String> {
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let mut parts = Vec::new();
            for item in items {
                if let Some(s) = item.as_str() {
                    parts.push(s.to_owned());
                    continue;
                }
                let item_type = item.get("type").and_then(Value::as_str);
                if matches!(item_type, Some("text") | Some("output_text")) {
                    if let Some(text) = item.get("text").and_then(Value::as_str) {
                        parts.push(text.to_owned());
                        continue;
                    }
                }
                if let Some(nested) = item.get("content") {
                    if let Some(text) = extract_from_content(nested) {
                        parts.push(text);
                    }
                }
            }
            if parts.is_empty() { None } else { Some(parts.join("")) }
        }
        _ => None,
    }
}

/// Strip ANSI CSI sequences, drop private-use/non-printable control chars
/// (except `\n`/`\t`), right-trim lines, collapse 3+ blank lines to 2.
pub(crate) fn clean_text(raw: &str) -> String {
    let stripped = ansi_csi_re().replace_all(raw, "");
    let filtered: String = stripped
        .chars()
        .filter(|&c| c == '\n' || c == '\t' || !c.is_control())
        .collect();

    let mut out_lines: Vec<String> = Vec::new();
    let mut blank_run = 0usize;
    for line in filtered.lines() {
        let trimmed_end = line.trim_end();
        if trimmed_end.is_empty() {
            blank_run += 1;
            if blank_run <= 2 {
                out_lines.push(String::new());
            }
        } else {
            blank_run = 0;
            out_lines.push(trimmed_end.to_owned());
        }
    }
    out_lines.join("\n").trim().to_owned()
}

fn is_tool_trace(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    if TOOL_TRACE_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return true;
    }
    TOOL_TRACE_MARKERS.iter().any(|m| lower.contains(m))
}

fn is_thinking_status(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    THINKING_MARKERS.iter().any(|m| lower.contains(m))
}

/// If a newer chunk starts with the previous one, replace previous; skip
/// exact duplicates.
fn merge_chunks(chunks: Vec<String>) -> String {
    let mut acc = String::new();
    for (i, chunk) in chunks.into_iter().enumerate() {
        if i == 0 {
            acc = chunk;
            continue;
        }
        if chunk == acc {
            continue;
        }
        acc = chunk;
    }
    acc
}

pub(crate) fn cap_text(text: &str) -> String {
    if text.chars().count() <= MAX_TEXT_CHARS {
        return text.to_owned();
    }
    let tail: String =
        text.chars().rev().take(MAX_TEXT_CHARS - 3).collect::<Vec<_>>().into_iter().rev().collect();
    format!("{tail}...")
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    path: std::path::PathBuf,
    mtime_ns: i128,
    size: u64,
}

/// Bounded (best-effort LRU) cache keyed by `(path, mtime_ns, size)`, per the
/// design notes' guidance to replace unbounded dicts with an LRU cap.
pub struct SessionFileCache {
    capacity: usize,
    entries: Mutex<HashMap<CacheKey, (Option<String>, Option<i64>)>>,
    order: Mutex<VecDeque<CacheKey>>,
}

impl SessionFileCache {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: Mutex::new(HashMap::new()), order: Mutex::new(VecDeque::new()) }
    }

    pub fn get_or_parse(&self, path: &Path) -> (Option<String>, Option<i64>) {
        let Ok(meta) = std::fs::metadata(path) else { return (None, None) };
        let mtime_ns = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as i128)
            .unwrap_or(0);
        let key = CacheKey { path: path.to_path_buf(), mtime_ns, size: meta.len() };

        if let Some(cached) = self.entries.lock().unwrap_or_else(|e| e.into_inner()).get(&key).cloned() {
            return cached;
        }

        let parsed = parse_session_file(path);

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut order = self.order.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.clone(), parsed.clone());
        order.push_back(key);
        if order.len() > self.capacity {
            if let Some(evicted) = order.pop_front() {
                entries.remove(&evicted);
            }
        }
        parsed
    }
}

impl Default for SessionFileCache {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
#[path = "session_file_tests.rs"]
mod tests;
