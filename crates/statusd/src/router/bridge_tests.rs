use super::*;
use std::time::Duration;

fn write_registry(dir: &std::path::Path, pid: u32, updated_at_ms: u64) {
    let registry_dir = dir.join("registry");
    std::fs::create_dir_all(&registry_dir).unwrap();
    let body = serde_json::json!({ "pid": pid, "updatedAt": updated_at_ms });
    std::fs::write(registry_dir.join(format!("{pid}.json")), body.to_string()).unwrap();
}

#[test]
fn missing_registry_file_is_not_registered() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(!is_registered(tmp.path(), 999_999, 5_000));
}

#[test]
fn stale_registry_entry_is_not_registered() {
    let tmp = tempfile::tempdir().unwrap();
    let now_ms =
        std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_millis() as u64;
    write_registry(tmp.path(), std::process::id(), now_ms - 10_000);
    assert!(!is_registered(tmp.path(), std::process::id(), 5_000));
}

#[test]
fn fresh_registry_entry_for_live_pid_is_registered() {
    let tmp = tempfile::tempdir().unwrap();
    let now_ms =
        std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_millis() as u64;
    write_registry(tmp.path(), std::process::id(), now_ms);
    assert!(is_registered(tmp.path(), std::process::id(), 5_000));
}

#[test]
fn registry_entry_for_mismatched_pid_file_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let registry_dir = tmp.path().join("registry");
    std::fs::create_dir_all(&registry_dir).unwrap();
    let body = serde_json::json!({ "pid": 1, "updatedAt": 0 });
    std::fs::write(registry_dir.join("42.json"), body.to_string()).unwrap();
    assert!(!is_registered(tmp.path(), 42, 5_000));
}

#[test]
fn send_once_times_out_when_no_ack_appears() {
    let tmp = tempfile::tempdir().unwrap();
    let result = send_once(tmp.path(), 4242, "hello", 1, Duration::from_millis(30), Duration::from_millis(5));
    assert!(matches!(result, Err(BridgeError::Timeout)));
    let inbox = tmp.path().join("inbox").join("4242");
    assert_eq!(std::fs::read_dir(&inbox).unwrap().count(), 1);
}

#[test]
fn send_once_returns_ack_once_written() {
    let tmp = tempfile::tempdir().unwrap();
    let bridge_dir = tmp.path().to_path_buf();
    let pid = 4243u32;

    let writer = {
        let bridge_dir = bridge_dir.clone();
        std::thread::spawn(move || {
            // Wait for the envelope to land, then drop an ack matching it.
            let inbox = bridge_dir.join("inbox").join(pid.to_string());
            let id = loop {
                if let Ok(mut entries) = std::fs::read_dir(&inbox) {
                    if let Some(entry) = entries.next() {
                        let path = entry.unwrap().path();
                        break path.file_stem().unwrap().to_string_lossy().into_owned();
                    }
                }
                std::thread::sleep(Duration::from_millis(2));
            };
            let acks_dir = bridge_dir.join("acks").join(pid.to_string());
            std::fs::create_dir_all(&acks_dir).unwrap();
            std::fs::write(
                acks_dir.join(format!("{id}.json")),
                serde_json::json!({"status": "delivered"}).to_string(),
            )
            .unwrap();
        })
    };

    let result = send_once(&bridge_dir, pid, "hi", 1, Duration::from_secs(2), Duration::from_millis(5));
    writer.join().unwrap();
    let outcome = result.unwrap();
    assert!(outcome.ack.is_delivered());
}

#[test]
fn iso_from_ms_formats_as_iso8601_utc() {
    assert_eq!(iso_from_ms(0), "1970-01-01T00:00:00.000Z");
    assert_eq!(iso_from_ms(1_700_000_000_123), "2023-11-14T22:13:20.123Z");
}

#[test]
fn ack_rate_limited_error_is_recognized() {
    let ack = BridgeAck { status: "failed".to_owned(), resolved_mode: None, error: Some("rate_limited".to_owned()) };
    assert!(ack.is_rate_limited());
    assert!(!ack.is_delivered());
}
