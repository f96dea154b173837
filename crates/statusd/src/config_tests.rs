use super::*;
use clap::Parser;

fn parse(args: &[&str]) -> Config {
    let mut full = vec!["statusd"];
    full.extend_from_slice(args);
    Config::parse_from(full)
}

#[test]
fn defaults_are_sane() {
    let cfg = parse(&[]);
    assert_eq!(cfg.http_port, 8787);
    assert_eq!(cfg.https_port, 8788);
    assert!(cfg.allow_loopback_unauth);
    assert_eq!(cfg.send_rate_per_10s, 12);
    assert!(cfg.validate().is_ok());
}

#[test]
fn https_enabled_requires_cert_and_key() {
    let cfg = parse(&["--https-enabled"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn https_enabled_with_cert_and_key_is_valid() {
    let cfg = parse(&[
        "--https-enabled",
        "--https-cert-path",
        "/tmp/cert.pem",
        "--https-key-path",
        "/tmp/key.pem",
    ]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn rate_and_retry_clamps() {
    let mut cfg = parse(&[]);
    cfg.send_rate_per_10s = 9000;
    assert_eq!(cfg.clamped_send_rate_per_10s(), 200);
    cfg.send_rate_per_10s = 0;
    assert_eq!(cfg.clamped_send_rate_per_10s(), 1);

    cfg.bridge_send_retries = 99;
    assert_eq!(cfg.clamped_bridge_send_retries(), 8);

    cfg.bridge_send_retry_backoff_ms = 1;
    assert_eq!(cfg.clamped_bridge_send_retry_backoff_ms(), 100);
    cfg.bridge_send_retry_backoff_ms = 99999;
    assert_eq!(cfg.clamped_bridge_send_retry_backoff_ms(), 3000);
}

#[test]
fn missing_config_file_yields_defaults() {
    let mut cfg = parse(&[]);
    cfg.config_file = Some(std::path::PathBuf::from("/nonexistent/statusd-http.json"));
    let file = cfg.load_file().expect("missing file is not an error");
    assert!(file.host.is_none());
}

#[test]
fn apply_file_fills_in_only_unset_fields() {
    std::env::remove_var("PI_STATUSD_HTTP_PORT");
    std::env::remove_var("PI_STATUSD_SEND_RATE_PER_10S");

    let mut cfg = parse(&["--send-rate-per-10s", "42"]);
    let file = ConfigFile {
        host: Some("127.0.0.1".to_owned()),
        port: Some(9999),
        send_rate_per_10s: Some(7),
        ..ConfigFile::default()
    };
    cfg.apply_file(&file);

    assert_eq!(cfg.http_host, "127.0.0.1");
    assert_eq!(cfg.http_port, 9999);
    assert_eq!(cfg.send_rate_per_10s, 42);
}

#[test]
fn socket_path_honors_explicit_override() {
    let mut cfg = parse(&[]);
    cfg.socket = Some(std::path::PathBuf::from("/tmp/custom.sock"));
    assert_eq!(cfg.socket_path(), std::path::PathBuf::from("/tmp/custom.sock"));
}

#[test]
fn socket_path_falls_back_to_runtime_dir() {
    let cfg = parse(&[]);
    let path = cfg.socket_path();
    assert_eq!(path.file_name().unwrap(), "statusd.sock");
}

#[test]
fn send_subcommand_parses() {
    let cfg = parse(&["send", "42", "hello", "world"]);
    match cfg.command {
        Some(Command::Send { pid, message }) => {
            assert_eq!(pid, 42);
            assert_eq!(message, vec!["hello".to_owned(), "world".to_owned()]);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}
