// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Configuration loading and validation.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::compression::Compression;
use crate::error::{Error, Result};
use crate::header::Header;
use crate::transport::MAX_REDIRECTS;

/// Settings for one rotator. Immutable once the rotator starts.
#[derive(Debug, Clone, Deserialize)]
pub struct RotatorSettings {
    /// Fields embedded in the warcinfo record that opens every file.
    #[serde(default = "default_info_content")]
    pub info_content: Header,

    /// Leading component of every file name.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default)]
    pub compression: Compression,

    /// Rotation threshold in megabytes (MiB).
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: f64,

    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,
}

fn default_info_content() -> Header {
    let mut h = Header::new();
    h.set(
        "software",
        concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")),
    );
    h.set("format", "WARC File Format 1.1");
    h.set(
        "conformsTo",
        "http://iipc.github.io/warc-specifications/specifications/warc-format/warc-1.1/",
    );
    h
}

fn default_prefix() -> String {
    "WARC".to_string()
}

fn default_max_size_mb() -> f64 {
    1000.0
}

fn default_output_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_redirects() -> usize {
    MAX_REDIRECTS
}

impl Default for RotatorSettings {
    fn default() -> Self {
        Self {
            info_content: default_info_content(),
            prefix: default_prefix(),
            compression: Compression::default(),
            max_size_mb: default_max_size_mb(),
            output_directory: default_output_directory(),
        }
    }
}

impl RotatorSettings {
    /// Reject settings that cannot produce valid files.
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() {
            return Err(Error::Config("prefix must not be empty".into()));
        }
        if self.prefix.contains(['/', '\\']) {
            return Err(Error::Config(format!(
                "prefix '{}' must not contain path separators",
                self.prefix
            )));
        }
        if !self.max_size_mb.is_finite() || self.max_size_mb <= 0.0 {
            return Err(Error::Config(format!(
                "max_size_mb must be a positive number, got {}",
                self.max_size_mb
            )));
        }
        if self.output_directory.as_os_str().is_empty() {
            return Err(Error::Config("output_directory must not be empty".into()));
        }
        if self.output_directory.exists() && !self.output_directory.is_dir() {
            return Err(Error::Config(format!(
                "output_directory {} is not a directory",
                self.output_directory.display()
            )));
        }
        Ok(())
    }

    /// Rotation threshold in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        (self.max_size_mb * 1024.0 * 1024.0) as u64
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    /// PEM files whose certificates are trusted in addition to the web PKI roots.
    #[serde(default)]
    pub extra_root_certificates: Vec<PathBuf>,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            extra_root_certificates: Vec::new(),
            max_redirects: default_max_redirects(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub rotator: RotatorSettings,

    #[serde(default)]
    pub tls: TlsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// `[rotator]` holds the rotator settings with `[rotator.info_content]`
    /// as the warcinfo fields; `[tls]` holds client options. Every key is
    /// optional.
    pub async fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let s = tokio::fs::read_to_string(path_ref).await.map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path_ref.display(), e))
        })?;
        let cfg: Self = toml::from_str(&s)?;
        cfg.rotator.validate()?;
        Ok(cfg)
    }
}
