// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! One captured request/response pair, as handed to the capture callback.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use hyper::{HeaderMap, Method, StatusCode, Uri, Version};

/// Request portion of an exchange.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: Method,
    /// Absolute URI the request was sent to.
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RequestInfo {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

/// Response portion of an exchange. The body is the payload as received,
/// without any content decoding.
#[derive(Debug, Clone)]
pub struct ResponseInfo {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// A completed exchange together with the bytes that crossed the wire.
#[derive(Debug, Clone)]
pub struct CapturedExchange {
    pub request: RequestInfo,
    pub response: ResponseInfo,
    pub raw_request: Bytes,
    pub raw_response: Bytes,
    pub captured_at: DateTime<Utc>,
}

/// `Host` field value for `uri`: the host plus any explicit port. Userinfo
/// is never included.
pub fn host_field(uri: &Uri) -> Option<String> {
    let authority = uri.authority()?;
    Some(match authority.port() {
        Some(port) => format!("{}:{}", authority.host(), port),
        None => authority.host().to_string(),
    })
}

/// Textual HTTP-version token used in start and status lines.
pub fn format_http_version(v: Version) -> &'static str {
    match v {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2.0",
        _ => "HTTP/1.1",
    }
}
