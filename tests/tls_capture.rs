// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

mod common;

use std::sync::Arc;

use rcgen::{CertificateParams, KeyPair, PKCS_ECDSA_P256_SHA256};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::ServerConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_rustls::TlsAcceptor;

use common::{read_warc, settings, temp_dir};
use warc_recorder::compression::Compression;
use warc_recorder::config::Config;
use warc_recorder::recorder::Recorder;

const BODY: &str = "secret payload over tls";

struct TlsServer {
    port: u16,
    cert_pem: String,
    alpn: oneshot::Receiver<Option<Vec<u8>>>,
}

/// Serve one HTTPS exchange for `localhost`, offering h2 and http/1.1.
async fn start_tls_server() -> anyhow::Result<TlsServer> {
    let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256)?;
    let cert = CertificateParams::new(vec!["localhost".to_string()])?.self_signed(&key_pair)?;
    let cert_pem = cert.pem();
    let cert_der: CertificateDer<'static> = cert.der().clone();
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    let mut server_config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(vec![cert_der], key_der)?;
    server_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    let acceptor = TlsAcceptor::from(Arc::new(server_config));

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let (alpn_tx, alpn_rx) = oneshot::channel();

    tokio::spawn(async move {
        let Ok((tcp, _)) = listener.accept().await else {
            return;
        };
        let Ok(mut tls) = acceptor.accept(tcp).await else {
            return;
        };
        let _ = alpn_tx.send(tls.get_ref().1.alpn_protocol().map(|p| p.to_vec()));

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match tls.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{}",
            BODY.len(),
            BODY
        );
        let _ = tls.write_all(response.as_bytes()).await;
        let _ = tls.flush().await;
        let _ = tls.shutdown().await;
    });

    Ok(TlsServer {
        port,
        cert_pem,
        alpn: alpn_rx,
    })
}

#[tokio::test]
async fn tls_exchange_is_captured_as_plaintext_http11() -> anyhow::Result<()> {
    let server = start_tls_server().await?;
    let dir = temp_dir("tls");
    let ca_path = dir.join("server-ca.pem");
    tokio::fs::write(&ca_path, &server.cert_pem).await?;

    let mut config = Config::default();
    config.rotator = settings(&dir.join("out"), Compression::None, 10.0);
    config.tls.extra_root_certificates = vec![ca_path];
    let recorder = Recorder::from_config(&config)?;

    let resp = recorder
        .client()
        .get(&format!("https://localhost:{}/secure?x=1", server.port))
        .await?;
    assert_eq!(&resp.body()[..], BODY.as_bytes());

    // The server offered h2 but the client never asked for any protocol.
    assert_eq!(server.alpn.await?, None);

    let summary = recorder.close().await?;
    let records = read_warc(&summary.files[0])?;
    assert_eq!(records.len(), 3);

    let response = &records[1];
    assert_eq!(response.warc_type(), "response");
    assert_eq!(
        response.get("WARC-Target-URI"),
        Some(format!("https://localhost:{}/secure?x=1", server.port).as_str())
    );
    assert_eq!(response.content, BODY.as_bytes());

    let request = &records[2];
    assert_eq!(request.warc_type(), "request");
    assert_eq!(
        request.get("Host").map(str::to_string),
        Some(format!("localhost:{}", server.port))
    );

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

#[tokio::test]
async fn untrusted_certificate_is_a_transport_fault() -> anyhow::Result<()> {
    let server = start_tls_server().await?;
    let dir = temp_dir("tls_untrusted");
    let recorder = Recorder::new(settings(&dir, Compression::None, 10.0))?;

    let err = recorder
        .client()
        .get(&format!("https://localhost:{}/", server.port))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), warc_recorder::FaultKind::Transport);

    let summary = recorder.close().await?;
    assert_eq!(summary.batches, 0);
    std::fs::remove_dir_all(&dir)?;
    Ok(())
}
