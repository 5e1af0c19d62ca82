// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Dialing plain and TLS connections with a capture attached.

use hyper::Uri;
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::trace;
use uuid::Uuid;

use crate::capture::CaptureStream;
use crate::error::{Error, Result};

/// Metadata associated with an underlying TCP connection.
#[derive(Debug, Clone)]
pub struct ConnectionMetadata {
    pub id: Uuid,
    pub remote_addr: SocketAddr,
    pub established: Instant,
    pub tls: bool,
}

impl ConnectionMetadata {
    pub fn new(remote_addr: SocketAddr, tls: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            remote_addr,
            established: Instant::now(),
            tls,
        }
    }
}

/// Plain TCP or client-side TLS over TCP.
#[derive(Debug)]
pub enum MaybeTlsStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl MaybeTlsStream {
    /// Negotiated ALPN protocol, if any.
    pub fn alpn_protocol(&self) -> Option<&[u8]> {
        match self {
            Self::Plain(_) => None,
            Self::Tls(s) => s.get_ref().1.alpn_protocol(),
        }
    }

    pub fn tcp(&self) -> &TcpStream {
        match self {
            Self::Plain(s) => s,
            Self::Tls(s) => s.get_ref().0,
        }
    }
}

impl AsyncRead for MaybeTlsStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTlsStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_flush(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Opens one connection per call, each wrapped in a fresh capture.
#[derive(Clone)]
pub struct Dialer {
    tls_config: Arc<ClientConfig>,
}

impl Dialer {
    /// Build a dialer from a TLS client config.
    ///
    /// The config is cloned with its ALPN list cleared so servers always
    /// answer over HTTP/1.1.
    pub fn new(tls_config: &ClientConfig) -> Self {
        let mut cfg = tls_config.clone();
        cfg.alpn_protocols.clear();
        Self {
            tls_config: Arc::new(cfg),
        }
    }

    pub async fn dial(
        &self,
        uri: &Uri,
    ) -> Result<(CaptureStream<MaybeTlsStream>, ConnectionMetadata)> {
        let (host, port, secure) = target_of(uri)?;

        trace!(%host, port, secure, "dialing");
        let connect_err = |source: io::Error| Error::Connect {
            target: format!("{}:{}", host, port),
            source,
        };
        let tcp = TcpStream::connect((host.as_str(), port))
            .await
            .map_err(connect_err)?;
        let remote_addr = tcp.peer_addr().map_err(connect_err)?;

        let stream = if secure {
            let server_name = ServerName::try_from(host.clone())
                .map_err(|_| Error::InvalidRequest(format!("invalid TLS server name '{}'", host)))?;
            let tls = TlsConnector::from(self.tls_config.clone())
                .connect(server_name, tcp)
                .await
                .map_err(connect_err)?;
            MaybeTlsStream::Tls(Box::new(tls))
        } else {
            MaybeTlsStream::Plain(tcp)
        };

        let meta = ConnectionMetadata::new(remote_addr, secure);
        Ok((CaptureStream::new(stream), meta))
    }
}

/// Host, port and TLS flag for an absolute `http`/`https` URI.
pub(crate) fn target_of(uri: &Uri) -> Result<(String, u16, bool)> {
    let secure = match uri.scheme_str() {
        Some("http") => false,
        Some("https") => true,
        Some(other) => {
            return Err(Error::InvalidRequest(format!(
                "unsupported scheme '{}'",
                other
            )))
        }
        None => return Err(Error::InvalidRequest(format!("URI '{}' is not absolute", uri))),
    };
    let host = uri
        .host()
        .ok_or_else(|| Error::InvalidRequest(format!("URI '{}' has no host", uri)))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    let port = uri.port_u16().unwrap_or(if secure { 443 } else { 80 });
    Ok((host, port, secure))
}

/// Default TLS client config trusting the bundled web PKI roots plus `extra`.
pub fn tls_config_with_roots(extra: Vec<CertificateDer<'static>>) -> Result<ClientConfig> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    for cert in extra {
        roots
            .add(cert)
            .map_err(|e| Error::Config(format!("invalid root certificate: {}", e)))?;
    }
    let cfg = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::aws_lc_rs::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .with_root_certificates(roots)
    .with_no_client_auth();
    Ok(cfg)
}

/// Read every certificate from a PEM file.
pub fn load_pem_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let unreadable =
        |e: io::Error| Error::Config(format!("cannot read {}: {}", path.display(), e));
    let mut reader = io::BufReader::new(std::fs::File::open(path).map_err(unreadable)?);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<io::Result<Vec<_>>>()
        .map_err(unreadable)?;
    if certs.is_empty() {
        return Err(Error::Config(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}
