// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Archive records and record batches.

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use sha1::{Digest, Sha1};

use crate::header::Header;

pub const WARC_TYPE: &str = "WARC-Type";
pub const WARC_RECORD_ID: &str = "WARC-Record-ID";
pub const WARC_DATE: &str = "WARC-Date";
pub const WARC_TARGET_URI: &str = "WARC-Target-URI";
pub const WARC_PAYLOAD_DIGEST: &str = "WARC-Payload-Digest";
pub const WARC_WARCINFO_ID: &str = "WARC-Warcinfo-ID";
pub const WARC_FILENAME: &str = "WARC-Filename";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_LENGTH: &str = "Content-Length";

/// One header block plus payload.
#[derive(Debug, Clone, Default)]
pub struct Record {
    pub header: Header,
    pub content: Bytes,
}

impl Record {
    pub fn new(header: Header, content: impl Into<Bytes>) -> Self {
        Self {
            header,
            content: content.into(),
        }
    }

    pub fn warc_type(&self) -> Option<&str> {
        self.header.get(WARC_TYPE)
    }
}

/// Records captured together; they share one capture time and always land in
/// the same file.
#[derive(Debug, Clone)]
pub struct RecordBatch {
    pub records: Vec<Record>,
    pub capture_time: DateTime<Utc>,
}

impl RecordBatch {
    pub fn new(capture_time: DateTime<Utc>) -> Self {
        Self {
            records: Vec::with_capacity(2),
            capture_time,
        }
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for RecordBatch {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

/// `sha1:<hex>` digest of `data`.
pub fn payload_digest(data: &[u8]) -> String {
    format!("sha1:{:x}", Sha1::digest(data))
}

/// Timestamp in the form used by `WARC-Date`.
pub fn warc_date(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// `<urn:uuid:...>` form of a record identifier.
pub fn record_urn(id: &uuid::Uuid) -> String {
    format!("<urn:uuid:{}>", id)
}
