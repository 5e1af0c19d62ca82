// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! WARC/1.1 encoding of single records.
//!
//! These functions only lay bytes out; framing, compression and file
//! ownership belong to the rotator.

use chrono::{DateTime, Utc};
use std::io::{self, Write};
use uuid::Uuid;

use crate::header::Header;
use crate::record::{
    record_urn, warc_date, Record, CONTENT_LENGTH, CONTENT_TYPE, WARC_DATE, WARC_FILENAME,
    WARC_RECORD_ID, WARC_TYPE,
};

pub const WARC_VERSION: &str = "WARC/1.1";

const CRLF: &[u8] = b"\r\n";

/// Write one record and return the `WARC-Record-ID` it was written with.
///
/// A record without an identifier gets a fresh `urn:uuid`. `Content-Length`
/// always reflects the content actually written.
pub fn write_record<W: Write + ?Sized>(out: &mut W, record: &mut Record) -> io::Result<String> {
    if !record.header.contains(WARC_RECORD_ID) {
        record
            .header
            .set(WARC_RECORD_ID, record_urn(&Uuid::new_v4()));
    }
    record
        .header
        .set(CONTENT_LENGTH, record.content.len().to_string());

    out.write_all(WARC_VERSION.as_bytes())?;
    out.write_all(CRLF)?;
    write_fields(out, &record.header)?;
    out.write_all(CRLF)?;
    out.write_all(&record.content)?;
    out.write_all(CRLF)?;
    out.write_all(CRLF)?;

    Ok(record
        .header
        .get(WARC_RECORD_ID)
        .unwrap_or_default()
        .to_string())
}

/// Write the `warcinfo` record that opens every file and return its id.
pub fn write_info_record<W: Write + ?Sized>(
    out: &mut W,
    info: &Header,
    filename: &str,
    date: DateTime<Utc>,
) -> io::Result<Uuid> {
    let id = Uuid::new_v4();

    let mut content = Vec::new();
    write_fields(&mut content, info)?;

    let mut header = Header::new();
    header.set(WARC_TYPE, "warcinfo");
    header.set(WARC_RECORD_ID, record_urn(&id));
    header.set(WARC_DATE, warc_date(&date));
    header.set(WARC_FILENAME, filename);
    header.set(CONTENT_TYPE, "application/warc-fields");

    let mut record = Record::new(header, content);
    write_record(out, &mut record)?;
    Ok(id)
}

fn write_fields<W: Write + ?Sized>(out: &mut W, header: &Header) -> io::Result<()> {
    for (name, value) in header.iter() {
        out.write_all(name.as_bytes())?;
        out.write_all(b": ")?;
        out.write_all(value.as_bytes())?;
        out.write_all(CRLF)?;
    }
    Ok(())
}
