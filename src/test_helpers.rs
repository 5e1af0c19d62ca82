// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Shared test utilities to reduce duplication across test modules.

use bytes::Bytes;
use std::path::PathBuf;
use uuid::Uuid;

use crate::compression::Compression;
use crate::config::RotatorSettings;

/// A bodiless GET as it would appear on the wire.
pub fn raw_request() -> Bytes {
    Bytes::from_static(
        b"GET /page?q=1 HTTP/1.1\r\nHost: example.com:8080\r\nUser-Agent: test-agent\r\nAccept: */*\r\n\r\n",
    )
}

/// A 200 response carrying `body` and an `X-Test: 1` header.
pub fn raw_response(body: &str) -> Bytes {
    Bytes::from(format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nX-Test: 1\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    ))
}

/// Create a fresh, empty directory under the system temp dir.
pub fn temp_output_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("warc_recorder_{}_{}", tag, Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp output dir");
    dir
}

/// Uncompressed settings writing into `dir` with a 1 MiB threshold.
pub fn make_test_settings(dir: PathBuf) -> RotatorSettings {
    RotatorSettings {
        prefix: "TEST".to_string(),
        compression: Compression::None,
        max_size_mb: 1.0,
        output_directory: dir,
        ..RotatorSettings::default()
    }
}

/// Names of the regular files in `dir`, sorted.
pub fn list_files(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read output dir")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
