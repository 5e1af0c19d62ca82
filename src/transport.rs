// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! HTTP/1.1 client that reports every exchange it performs.
//!
//! Each request runs over its own connection with a fresh capture attached,
//! so concurrent requests never share capture state. The raw bytes of every
//! completed exchange, redirect hops included, are handed to a callback.

use bytes::Bytes;
use chrono::Utc;
use http_body_util::{BodyExt, Full};
use hyper::header::{
    HeaderName, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HOST, LOCATION,
    REFERER, TRANSFER_ENCODING, USER_AGENT,
};
use hyper::{Method, Request, Response, StatusCode, Uri, Version};
use hyper_util::rt::TokioIo;
use rustls::pki_types::CertificateDer;
use rustls::ClientConfig;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::connection::{tls_config_with_roots, Dialer};
use crate::error::{Error, Result};
use crate::exchange::{host_field, CapturedExchange, RequestInfo, ResponseInfo};

/// Redirects followed before giving up, as common HTTP clients do.
pub const MAX_REDIRECTS: usize = 10;

pub const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub type CaptureFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// Invoked once per completed exchange. An error aborts the request.
pub type CaptureCallback = Arc<dyn Fn(CapturedExchange) -> CaptureFuture + Send + Sync>;

/// Wrap an async closure as a [`CaptureCallback`].
pub fn capture_callback<F, Fut>(f: F) -> CaptureCallback
where
    F: Fn(CapturedExchange) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |exchange| Box::pin(f(exchange)) as CaptureFuture)
}

pub struct ClientBuilder {
    tls_config: Option<ClientConfig>,
    extra_roots: Vec<CertificateDer<'static>>,
    max_redirects: usize,
    user_agent: String,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            tls_config: None,
            extra_roots: Vec::new(),
            max_redirects: MAX_REDIRECTS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` instead of the bundled web PKI roots. Its ALPN list is ignored.
    pub fn tls_config(mut self, config: ClientConfig) -> Self {
        self.tls_config = Some(config);
        self
    }

    /// Trust `cert` in addition to the default roots.
    pub fn add_root_certificate(mut self, cert: CertificateDer<'static>) -> Self {
        self.extra_roots.push(cert);
        self
    }

    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Validate the TLS roots and user agent without attaching a callback.
    pub fn prepare(self) -> Result<PreparedClient> {
        let tls = match self.tls_config {
            Some(mut cfg) if self.extra_roots.is_empty() => {
                cfg.alpn_protocols.clear();
                cfg
            }
            Some(_) => {
                return Err(Error::Config(
                    "extra root certificates cannot be combined with a custom TLS config".into(),
                ))
            }
            None => tls_config_with_roots(self.extra_roots)?,
        };
        let user_agent = HeaderValue::from_str(&self.user_agent)
            .map_err(|e| Error::Config(format!("invalid user agent: {}", e)))?;
        Ok(PreparedClient {
            dialer: Dialer::new(&tls),
            max_redirects: self.max_redirects,
            user_agent,
        })
    }

    pub fn build(self, on_capture: CaptureCallback) -> Result<CapturingClient> {
        Ok(self.prepare()?.with_callback(on_capture))
    }
}

/// Validated client settings waiting for a capture callback.
pub struct PreparedClient {
    dialer: Dialer,
    max_redirects: usize,
    user_agent: HeaderValue,
}

impl PreparedClient {
    pub fn with_callback(self, on_capture: CaptureCallback) -> CapturingClient {
        CapturingClient {
            dialer: self.dialer,
            on_capture,
            max_redirects: self.max_redirects,
            user_agent: self.user_agent,
        }
    }
}

/// Capturing HTTP client. Cheap to clone; clones share the callback.
#[derive(Clone)]
pub struct CapturingClient {
    dialer: Dialer,
    on_capture: CaptureCallback,
    max_redirects: usize,
    user_agent: HeaderValue,
}

impl CapturingClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub async fn get(&self, uri: &str) -> Result<Response<Bytes>> {
        let uri: Uri = uri
            .parse()
            .map_err(|e| Error::InvalidRequest(format!("invalid URI '{}': {}", uri, e)))?;
        let req = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Bytes::new())?;
        self.request(req).await
    }

    /// Send `req` to its absolute URI, following redirects.
    ///
    /// The body is returned exactly as received, without content decoding.
    pub async fn request(&self, req: Request<Bytes>) -> Result<Response<Bytes>> {
        let (parts, body) = req.into_parts();
        let initial_host = parts.uri.host().map(str::to_ascii_lowercase);
        let mut current = RequestInfo {
            method: parts.method,
            uri: parts.uri,
            version: Version::HTTP_11,
            headers: parts.headers,
            body,
        };

        let mut via = 0usize;
        loop {
            let exchange = self.round_trip(&current).await?;
            let status = exchange.response.status;
            let location = redirect_location(&exchange.response);
            let response = exchange.response.clone();
            (self.on_capture)(exchange).await?;

            let Some(location) = location else {
                return Ok(into_response(response));
            };

            via += 1;
            if via >= self.max_redirects {
                warn!(uri = %current.uri, redirects = via, "redirect limit reached");
                return Err(Error::RedirectLimit(via));
            }

            let target = resolve_location(&current.uri, &location)?;
            debug!(from = %current.uri, to = %target, %status, "following redirect");
            current = next_request(&current, status, target, initial_host.as_deref());
        }
    }

    async fn round_trip(&self, req: &RequestInfo) -> Result<CapturedExchange> {
        let (stream, meta) = self.dialer.dial(&req.uri).await?;
        let capture = stream.capture().clone();
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                trace!(error = %e, "connection ended with error");
            }
        });

        let mut sent = req.clone();
        if !sent.headers.contains_key(HOST) {
            let host = host_field(&req.uri)
                .ok_or_else(|| Error::InvalidRequest(format!("URI '{}' has no host", req.uri)))?;
            let host = HeaderValue::from_str(&host)
                .map_err(|e| Error::InvalidRequest(e.to_string()))?;
            sent.headers.insert(HOST, host);
        }
        if !sent.headers.contains_key(USER_AGENT) {
            sent.headers.insert(USER_AGENT, self.user_agent.clone());
        }

        let origin_form = req.uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
        let mut request = Request::builder()
            .method(sent.method.clone())
            .uri(origin_form)
            .version(Version::HTTP_11)
            .body(Full::new(sent.body.clone()))?;
        *request.headers_mut() = sent.headers.clone();

        let response = sender.send_request(request).await?;
        let (parts, body) = response.into_parts();
        let body = body.collect().await?.to_bytes();
        drop(sender);

        let (raw_request, raw_response) = capture.take();
        debug!(
            conn = %meta.id,
            method = %sent.method,
            uri = %sent.uri,
            status = %parts.status,
            request_bytes = raw_request.len(),
            response_bytes = raw_response.len(),
            "exchange captured"
        );

        Ok(CapturedExchange {
            request: sent,
            response: ResponseInfo {
                status: parts.status,
                version: parts.version,
                headers: parts.headers,
                body,
            },
            raw_request,
            raw_response,
            captured_at: Utc::now(),
        })
    }
}

fn into_response(info: ResponseInfo) -> Response<Bytes> {
    let mut resp = Response::new(info.body);
    *resp.status_mut() = info.status;
    *resp.version_mut() = info.version;
    *resp.headers_mut() = info.headers;
    resp
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

fn redirect_location(resp: &ResponseInfo) -> Option<String> {
    if !is_redirect(resp.status) {
        return None;
    }
    resp.headers
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Build the follow-up request for a redirect to `target`.
fn next_request(
    prev: &RequestInfo,
    status: StatusCode,
    target: Uri,
    initial_host: Option<&str>,
) -> RequestInfo {
    let keep_body = matches!(status.as_u16(), 307 | 308);
    let method = if keep_body || prev.method == Method::GET || prev.method == Method::HEAD {
        prev.method.clone()
    } else {
        Method::GET
    };

    let mut headers = prev.headers.clone();
    headers.remove(HOST);
    if !keep_body {
        for name in [CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING] {
            headers.remove(name);
        }
    }

    let target_host = target.host().map(str::to_ascii_lowercase);
    if !same_or_subdomain(initial_host, target_host.as_deref()) {
        let www_authenticate = HeaderName::from_static("www-authenticate");
        for name in [AUTHORIZATION, COOKIE, www_authenticate] {
            headers.remove(name);
        }
    }

    headers.remove(REFERER);
    let downgrade = prev.uri.scheme_str() == Some("https") && target.scheme_str() == Some("http");
    if !downgrade {
        if let Ok(referer) = HeaderValue::from_str(&prev.uri.to_string()) {
            headers.insert(REFERER, referer);
        }
    }

    RequestInfo {
        method,
        uri: target,
        version: Version::HTTP_11,
        headers,
        body: if keep_body { prev.body.clone() } else { Bytes::new() },
    }
}

fn same_or_subdomain(initial: Option<&str>, target: Option<&str>) -> bool {
    match (initial, target) {
        (Some(initial), Some(target)) => {
            target == initial
                || target
                    .strip_suffix(initial)
                    .is_some_and(|rest| rest.ends_with('.'))
        }
        _ => false,
    }
}

/// Resolve a `Location` value against the URI it was received for.
fn resolve_location(base: &Uri, location: &str) -> Result<Uri> {
    let location = location.split('#').next().unwrap_or_default();
    let invalid = |e: &dyn std::fmt::Display| {
        Error::InvalidRequest(format!("invalid redirect location '{}': {}", location, e))
    };

    let scheme = base.scheme_str().unwrap_or("http");
    let authority = base
        .authority()
        .map(|a| a.as_str())
        .ok_or_else(|| Error::InvalidRequest(format!("URI '{}' has no host", base)))?;

    let has_scheme = location
        .split_once(':')
        .is_some_and(|(s, _)| !s.is_empty() && !s.contains('/') && !s.contains('?'));

    let resolved = if has_scheme {
        location.to_string()
    } else if location.starts_with("//") {
        format!("{}:{}", scheme, location)
    } else if location.starts_with('/') {
        let (path, query) = split_query(location);
        format!("{}://{}{}{}", scheme, authority, remove_dot_segments(path), query)
    } else if location.starts_with('?') {
        format!("{}://{}{}{}", scheme, authority, base.path(), location)
    } else {
        let dir = match base.path().rfind('/') {
            Some(i) => &base.path()[..=i],
            None => "/",
        };
        let (path, query) = split_query(location);
        let merged = format!("{}{}", dir, path);
        format!("{}://{}{}{}", scheme, authority, remove_dot_segments(&merged), query)
    };

    let uri: Uri = resolved.parse().map_err(|e| invalid(&e))?;
    match uri.scheme_str() {
        Some("http") | Some("https") if uri.authority().is_some() => Ok(uri),
        _ => Err(invalid(&"not an absolute http(s) URI")),
    }
}

fn split_query(s: &str) -> (&str, &str) {
    match s.find('?') {
        Some(i) => (&s[..i], &s[i..]),
        None => (s, ""),
    }
}

fn remove_dot_segments(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len().saturating_sub(1);
    for (i, seg) in segments.iter().enumerate() {
        match *seg {
            "." => {
                if i == last {
                    out.push("");
                }
            }
            ".." => {
                if out.len() > 1 {
                    out.pop();
                }
                if i == last {
                    out.push("");
                }
            }
            s => out.push(s),
        }
    }
    let joined = out.join("/");
    if joined.starts_with('/') {
        joined
    } else {
        format!("/{}", joined)
    }
}
