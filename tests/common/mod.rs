// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

#![allow(dead_code)]

use std::io::Read;
use std::path::{Path, PathBuf};

use warc_recorder::compression::Compression;
use warc_recorder::config::RotatorSettings;

/// One parsed WARC record.
#[derive(Debug)]
pub struct WarcRecord {
    pub fields: Vec<(String, String)>,
    pub content: Vec<u8>,
    /// Bytes the record occupies in the uncompressed stream.
    pub encoded_len: usize,
}

impl WarcRecord {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn warc_type(&self) -> &str {
        self.get("WARC-Type").unwrap_or_default()
    }
}

pub fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("warc_integ_{}_{}", tag, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub fn settings(dir: &Path, compression: Compression, max_size_mb: f64) -> RotatorSettings {
    RotatorSettings {
        prefix: "TEST".to_string(),
        compression,
        max_size_mb,
        output_directory: dir.to_path_buf(),
        ..RotatorSettings::default()
    }
}

/// Every entry of `dir`, sorted by name.
pub fn list_dir(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        out.push(entry?.path());
    }
    out.sort();
    Ok(out)
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Decompress a sealed file according to its extension.
pub fn decompress(path: &Path) -> anyhow::Result<Vec<u8>> {
    let raw = std::fs::read(path)?;
    let name = file_name(path);
    if name.ends_with(".warc.gz") {
        let mut out = Vec::new();
        flate2::read::MultiGzDecoder::new(&raw[..]).read_to_end(&mut out)?;
        Ok(out)
    } else if name.ends_with(".warc.zst") {
        Ok(zstd::decode_all(&raw[..])?)
    } else {
        Ok(raw)
    }
}

/// Parse a stream of uncompressed WARC records.
pub fn parse_records(data: &[u8]) -> anyhow::Result<Vec<WarcRecord>> {
    let mut records = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let rest = &data[pos..];
        anyhow::ensure!(
            rest.starts_with(b"WARC/1.1\r\n"),
            "record at offset {} has no version line",
            pos
        );
        let head_len = rest
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .ok_or_else(|| anyhow::anyhow!("unterminated record header at {}", pos))?;
        let head = std::str::from_utf8(&rest[..head_len])?;

        let mut fields = Vec::new();
        for line in head.split("\r\n").skip(1) {
            let (k, v) = line
                .split_once(": ")
                .ok_or_else(|| anyhow::anyhow!("bad field line '{}'", line))?;
            fields.push((k.to_string(), v.to_string()));
        }
        let record = WarcRecord {
            fields,
            content: Vec::new(),
            encoded_len: 0,
        };
        let len: usize = record
            .get("Content-Length")
            .ok_or_else(|| anyhow::anyhow!("record without Content-Length"))?
            .parse()?;

        let start = head_len + 4;
        let end = start + len;
        anyhow::ensure!(rest.len() >= end + 4, "truncated record at {}", pos);
        anyhow::ensure!(&rest[end..end + 4] == b"\r\n\r\n", "bad record trailer at {}", pos);

        records.push(WarcRecord {
            content: rest[start..end].to_vec(),
            encoded_len: end + 4,
            ..record
        });
        pos += end + 4;
    }
    Ok(records)
}

pub fn read_warc(path: &Path) -> anyhow::Result<Vec<WarcRecord>> {
    parse_records(&decompress(path)?)
}

/// Byte offsets at which each gzip member of `data` ends.
pub fn gzip_member_ends(data: &[u8]) -> anyhow::Result<Vec<usize>> {
    let mut ends = Vec::new();
    let mut rest = data;
    while !rest.is_empty() {
        let mut dec = flate2::bufread::GzDecoder::new(rest);
        std::io::copy(&mut dec, &mut std::io::sink())?;
        rest = dec.into_inner();
        ends.push(data.len() - rest.len());
    }
    Ok(ends)
}

/// Byte offsets at which each zstd frame of `data` ends.
pub fn zstd_frame_ends(data: &[u8]) -> anyhow::Result<Vec<usize>> {
    let mut ends = Vec::new();
    let mut rest = data;
    while !rest.is_empty() {
        let mut dec = zstd::stream::read::Decoder::with_buffer(rest)?.single_frame();
        std::io::copy(&mut dec, &mut std::io::sink())?;
        rest = dec.finish();
        ends.push(data.len() - rest.len());
    }
    Ok(ends)
}
