// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Error types for capture, record building and file rotation.
//!
//! Every failure is classified by [`FaultKind`] so a caller supervising the
//! recorder can tell a bad configuration apart from a disk fault or a
//! malformed capture.

use thiserror::Error;

/// Broad class of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Invalid settings, reported before any file is created.
    Config,
    /// Captured bytes that cannot be turned into records.
    Parse,
    /// File system failure inside the writer.
    Io,
    /// Redirect chain longer than the client allows.
    Redirect,
    /// Network, TLS or HTTP protocol failure.
    Transport,
    /// The record writer is gone.
    Closed,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("malformed capture: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stopped after {0} redirects")]
    RedirectLimit(usize),

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("cannot connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("record writer is no longer running")]
    RotatorClosed,

    #[error("file lifecycle violation: {0}")]
    Lifecycle(String),

    #[error("record writer task failed: {0}")]
    WriterTask(String),
}

impl Error {
    pub fn kind(&self) -> FaultKind {
        match self {
            Error::Config(_) => FaultKind::Config,
            Error::Parse(_) => FaultKind::Parse,
            Error::Io(_) => FaultKind::Io,
            Error::RedirectLimit(_) => FaultKind::Redirect,
            Error::Http(_)
            | Error::InvalidRequest(_)
            | Error::Tls(_)
            | Error::Connect { .. } => FaultKind::Transport,
            Error::RotatorClosed | Error::Lifecycle(_) | Error::WriterTask(_) => {
                FaultKind::Closed
            }
        }
    }
}

impl From<hyper::http::Error> for Error {
    fn from(e: hyper::http::Error) -> Self {
        Error::InvalidRequest(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
