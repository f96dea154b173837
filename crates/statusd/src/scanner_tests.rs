use std::sync::Arc;

use clap::Parser;

use super::*;

fn test_config() -> Arc<Config> {
    Arc::new(Config::parse_from(["statusd"]))
}

#[test]
fn scan_against_live_process_table_succeeds() {
    let scanner = Scanner::new(test_config());
    let result = scanner.scan();
    assert!(result.ok);
    assert_eq!(result.summary.total, result.agents.len());
}

#[test]
fn latest_message_for_unknown_pid_returns_none() {
    let scanner = Scanner::new(test_config());
    assert!(scanner.latest_message_for(u32::MAX).is_none());
}

#[test]
fn render_html_escapes_and_wraps() {
    let out = render_html("<script>&\"x\"</script>");
    assert!(out.starts_with("<pre"));
    assert!(out.contains("&lt;script&gt;&amp;&quot;x&quot;&lt;/script&gt;"));
}

#[test]
fn bridge_dir_defaults_when_unset() {
    let scanner = Scanner::new(test_config());
    assert_eq!(scanner.bridge_dir(), crate::router::bridge::default_bridge_dir());
}

#[test]
fn bridge_dir_honors_config_override() {
    let mut cfg = Config::parse_from(["statusd"]);
    cfg.bridge_dir = Some(std::path::PathBuf::from("/tmp/statusd-scanner-test-bridge"));
    let scanner = Scanner::new(Arc::new(cfg));
    assert_eq!(scanner.bridge_dir(), std::path::PathBuf::from("/tmp/statusd-scanner-test-bridge"));
}
