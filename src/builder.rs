// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Turning captured HTTP exchanges into WARC record batches.
//!
//! Every batch holds two records, response first and request second. Both
//! come from the raw HTTP/1.1 bytes: live captures use the bytes seen on the
//! wire, decoded responses are serialized back to wire form first.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use hyper::header::{CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use hyper::{HeaderMap, Request, Response, Uri};

use crate::error::{Error, Result};
use crate::exchange::{format_http_version, host_field, CapturedExchange};
use crate::header::Header;
use crate::record::{
    payload_digest, Record, RecordBatch, CONTENT_TYPE, WARC_PAYLOAD_DIGEST, WARC_TARGET_URI,
    WARC_TYPE,
};

const HEAD_DELIMITER: &[u8] = b"\r\n\r\n";

/// Build the batch for a live capture.
pub fn records_from_exchange(exchange: &CapturedExchange) -> Result<RecordBatch> {
    records_from_raw(
        &exchange.request.uri,
        exchange.raw_request.clone(),
        exchange.raw_response.clone(),
        exchange.captured_at,
    )
}

/// Build the batch from raw request and response bytes.
///
/// Fails with [`Error::Parse`] when either side has no header/body
/// delimiter or a malformed header line; nothing is emitted in that case.
pub fn records_from_raw(
    target_uri: &Uri,
    raw_request: Bytes,
    raw_response: Bytes,
    capture_time: DateTime<Utc>,
) -> Result<RecordBatch> {
    let target = target_uri.to_string();

    let response = http_record("response", &target, &raw_response)?;

    let mut request = http_record("request", &target, &raw_request)?;
    request
        .header
        .set("Host", host_field(target_uri).unwrap_or_default());

    let mut batch = RecordBatch::new(capture_time);
    batch.push(response);
    batch.push(request);
    Ok(batch)
}

/// Build the batch from a decoded response and the request that produced it.
///
/// Used when no live capture exists. Both messages are serialized to
/// HTTP/1.1 wire form, then handled exactly like captured bytes.
pub fn records_from_response(
    request: &Request<Bytes>,
    response: &Response<Bytes>,
) -> Result<RecordBatch> {
    let uri = request.uri();
    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(Error::InvalidRequest(format!(
            "request URI '{}' is not absolute",
            uri
        )));
    }
    records_from_raw(
        uri,
        serialize_request(request),
        serialize_response(response),
        Utc::now(),
    )
}

fn http_record(msgtype: &str, target: &str, raw: &Bytes) -> Result<Record> {
    let (mut header, payload) = split_message(raw)?;
    header.set(WARC_TYPE, msgtype);
    header.set(WARC_PAYLOAD_DIGEST, payload_digest(raw));
    header.set(WARC_TARGET_URI, target);
    header.set(CONTENT_TYPE, format!("application/http; msgtype={}", msgtype));
    Ok(Record::new(header, payload))
}

/// Split an HTTP message into its header fields and payload.
///
/// The start line is discarded. Repeated field names are joined with `,`
/// and continuation lines are folded into the previous value. Fields named
/// `WARC-*` are dropped so a peer cannot set record metadata.
fn split_message(raw: &Bytes) -> Result<(Header, Bytes)> {
    let pos = raw
        .windows(HEAD_DELIMITER.len())
        .position(|w| w == HEAD_DELIMITER)
        .ok_or_else(|| Error::Parse("no header/body delimiter in captured bytes".into()))?;

    let head = String::from_utf8_lossy(&raw[..pos]);
    let mut lines = head.split("\r\n");
    lines.next();

    let mut fields: Vec<(String, String)> = Vec::new();
    let mut skipping = false;
    for line in lines {
        if line.starts_with(' ') || line.starts_with('\t') {
            if skipping {
                continue;
            }
            let (_, value) = fields
                .last_mut()
                .ok_or_else(|| Error::Parse("continuation line before first field".into()))?;
            value.push(' ');
            value.push_str(line.trim());
            continue;
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::Parse(format!("malformed header line '{}'", line)))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Parse(format!("empty field name in '{}'", line)));
        }
        let value = value.trim();

        if is_warc_field(name) {
            skipping = true;
            continue;
        }
        skipping = false;

        match fields.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some((_, existing)) => {
                existing.push(',');
                existing.push_str(value);
            }
            None => fields.push((name.to_string(), value.to_string())),
        }
    }

    let payload = raw.slice(pos + HEAD_DELIMITER.len()..);
    Ok((fields.into_iter().collect(), payload))
}

fn is_warc_field(name: &str) -> bool {
    name.len() >= 5 && name.as_bytes()[..5].eq_ignore_ascii_case(b"WARC-")
}

fn serialize_request(request: &Request<Bytes>) -> Bytes {
    let uri = request.uri();
    let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    let mut out = Vec::with_capacity(256 + request.body().len());
    out.extend_from_slice(request.method().as_str().as_bytes());
    out.push(b' ');
    out.extend_from_slice(target.as_bytes());
    out.extend_from_slice(b" HTTP/1.1\r\n");

    if !request.headers().contains_key(HOST) {
        if let Some(host) = host_field(uri) {
            out.extend_from_slice(b"Host: ");
            out.extend_from_slice(host.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
    }
    write_headers_and_body(&mut out, request.headers(), request.body());
    Bytes::from(out)
}

fn serialize_response(response: &Response<Bytes>) -> Bytes {
    let status = response.status();

    let mut out = Vec::with_capacity(256 + response.body().len());
    out.extend_from_slice(format_http_version(response.version()).as_bytes());
    out.push(b' ');
    out.extend_from_slice(status.as_str().as_bytes());
    if let Some(reason) = status.canonical_reason() {
        out.push(b' ');
        out.extend_from_slice(reason.as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    write_headers_and_body(&mut out, response.headers(), response.body());
    Bytes::from(out)
}

// The body is already decoded, so framing headers are rewritten to match it.
fn write_headers_and_body(out: &mut Vec<u8>, headers: &HeaderMap, body: &Bytes) {
    let had_length = headers.contains_key(CONTENT_LENGTH);
    for (name, value) in headers.iter() {
        if name == CONTENT_LENGTH || name == TRANSFER_ENCODING {
            continue;
        }
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    if had_length || !body.is_empty() {
        out.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
}
