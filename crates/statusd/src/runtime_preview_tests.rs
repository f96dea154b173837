use super::*;

#[test]
fn run_with_timeout_captures_stdout() {
    let out = run_with_timeout("echo", &["hello"]);
    assert_eq!(out.as_deref(), Some("hello\n"));
}

#[test]
fn run_with_timeout_returns_none_for_missing_binary() {
    let out = run_with_timeout("definitely-not-a-real-binary-xyz", &["-p"]);
    assert!(out.is_none());
}

#[test]
fn capture_unknown_mux_returns_none() {
    assert!(capture("unknown-mux", None, 1).is_none());
}

#[test]
fn capture_screen_is_unsupported_and_returns_none() {
    assert!(capture_screen(Some("foo")).is_none());
}

#[test]
fn preview_cache_reuses_entry_within_ttl() {
    let cache = PreviewCache::default();
    {
        let mut guard = cache.entries.lock().unwrap();
        guard.insert(42, CacheEntry { text: "cached output".to_owned(), at: Instant::now() });
    }
    let result = cache.get_or_capture("tmux", None, 42);
    assert_eq!(result.map(|(t, _)| t), Some("cached output".to_owned()));
}
