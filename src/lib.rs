// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! HTTP client that records its traffic into rotating WARC/1.1 files.
//!
//! This library provides the capturing client, the record builder and the
//! rotating writer; main.rs is a small command line front end.

pub mod builder;
pub mod capture;
pub mod compression;
pub mod config;
pub mod connection;
pub mod error;
pub mod exchange;
pub mod header;
pub mod lifecycle;
pub mod record;
pub mod recorder;
pub mod rotator;
pub mod transport;
pub mod writer;

#[cfg(test)]
mod test_helpers;

pub use error::{Error, FaultKind, Result};
pub use recorder::Recorder;
