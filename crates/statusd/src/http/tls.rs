// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTPS listener (§4.10): manual `TcpListener` + `tokio-rustls` accept loop,
//! since the daemon terminates TLS itself rather than sitting behind a proxy.
//! Minimum TLS version 1.2, per the design notes. Certificates are supplied
//! by an external collaborator (§4.10: "self-signed certificate file pair");
//! this module only loads and serves them.

use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use sha2::{Digest, Sha256};
use tokio::net::TcpListener;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

/// Load a PEM certificate chain + private key into a rustls `ServerConfig`
/// restricted to TLS 1.2+.
pub fn load_server_config(cert_path: &Path, key_path: &Path) -> anyhow::Result<Arc<ServerConfig>> {
    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| anyhow::anyhow!("invalid TLS certificate/key pair: {e}"))?;
    Ok(Arc::new(config))
}

fn load_certs(path: &Path) -> anyhow::Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

fn load_key(path: &Path) -> anyhow::Result<PrivateKeyDer<'static>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)?.ok_or_else(|| anyhow::anyhow!("no private key found in {path:?}"))
}

/// SHA-256 hex digest of the certificate file's raw bytes, surfaced over
/// `GET /tls` so clients can pin/verify the self-signed cert out of band.
pub fn cert_sha256_hex(cert_path: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(cert_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hasher.finalize();
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

/// Accept loop: terminate TLS on each connection, then hand the stream to a
/// fresh hyper/axum connection — the same `hyper_util` serving pattern used
/// for this daemon's sibling UNIX-socket server, adapted for a TCP+TLS
/// transport. One task per connection; TLS handshake and I/O failures are
/// logged and dropped rather than killing the listener (§4.10: "TLS/EOF/reset
/// disconnect noise is swallowed").
pub async fn serve(addr: SocketAddr, tls_config: Arc<ServerConfig>, router: Router) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    let acceptor = TlsAcceptor::from(tls_config);
    let mut make_service = router.into_make_service_with_connect_info::<SocketAddr>();

    loop {
        let (tcp, peer_addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "https accept failed");
                continue;
            }
        };
        let acceptor = acceptor.clone();
        let svc_future = tower::Service::<SocketAddr>::call(&mut make_service, peer_addr);

        tokio::spawn(async move {
            let tls_stream = match acceptor.accept(tcp).await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::debug!(error = %e, %peer_addr, "tls handshake failed");
                    return;
                }
            };
            let Ok(svc) = svc_future.await;
            let io = hyper_util::rt::TokioIo::new(tls_stream);
            let hyper_svc = hyper_util::service::TowerToHyperService::new(svc);
            if let Err(e) = hyper_util::server::conn::auto::Builder::new(hyper_util::rt::TokioExecutor::new())
                .serve_connection_with_upgrades(io, hyper_svc)
                .await
            {
                tracing::debug!(error = %e, %peer_addr, "https connection closed with error");
            }
        });
    }
}

#[cfg(test)]
#[path = "tls_tests.rs"]
mod tests;
