// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Working-Directory Resolver (C2): map a PID to its cwd via an OS query.
//! Failures are per-PID and legal; a missing entry just means `cwd: None`.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-process timeout, per §4.2.
pub const CWD_QUERY_TIMEOUT: Duration = Duration::from_millis(1500);

/// Resolve a single PID's current working directory. Synchronous: `readlink`
/// on `/proc/<pid>/cwd` does not block in practice, so no explicit timeout
/// machinery is needed beyond documenting the budget callers should respect
/// when batching many PIDs (see `resolve_many`).
pub fn resolve(pid: u32) -> Option<PathBuf> {
    let link = Path::new("/proc").join(pid.to_string()).join("cwd");
    std::fs::read_link(link).ok()
}

/// Resolve cwd for a batch of PIDs, isolating per-PID failures so one
/// unreadable entry never drops the others.
pub fn resolve_many(pids: &[u32]) -> std::collections::HashMap<u32, PathBuf> {
    pids.iter().filter_map(|&pid| resolve(pid).map(|cwd| (pid, cwd))).collect()
}

#[cfg(test)]
#[path = "cwd_tests.rs"]
mod tests;
