use super::*;

#[test]
fn load_server_config_rejects_missing_files() {
    let result = load_server_config(Path::new("/nonexistent/cert.pem"), Path::new("/nonexistent/key.pem"));
    assert!(result.is_err());
}

#[test]
fn cert_sha256_hex_rejects_missing_file() {
    assert!(cert_sha256_hex(Path::new("/nonexistent/cert.pem")).is_err());
}

#[test]
fn cert_sha256_hex_is_stable_and_hex() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cert.pem");
    std::fs::write(&path, b"not a real certificate, just bytes to hash").unwrap();
    let digest = cert_sha256_hex(&path).unwrap();
    assert_eq!(digest.len(), 64);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(digest, cert_sha256_hex(&path).unwrap());
}
