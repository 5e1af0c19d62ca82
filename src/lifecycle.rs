// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! File lifecycle of the rotator as a pure state machine.
//!
//! `transition` decides what has to happen to the current file; the rotator
//! carries the actions out. Keeping the decision free of I/O lets the
//! rotation rules be tested without touching the disk.

use chrono::{DateTime, Utc};

use crate::compression::Compression;
use crate::error::{Error, Result};

/// Suffix carried by a file while it is still being written.
pub const OPEN_SUFFIX: &str = ".open";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Open, info record written, accepting batches.
    Active,
    /// Flushed, closed and renamed. Accepts nothing.
    Sealed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileState {
    pub serial: u32,
    pub phase: Phase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A batch arrived; `file_size` is the current on-disk size.
    Batch { file_size: u64 },
    /// No more batches will arrive.
    QueueClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Create the file with this serial and write its info record.
    Open { serial: u32 },
    /// Write the pending batch to the current file.
    WriteBatch,
    /// Flush, close and publish the file with this serial.
    Seal { serial: u32 },
}

impl FileState {
    /// State and actions when a rotator starts.
    pub fn start() -> (FileState, Vec<Action>) {
        (
            FileState {
                serial: 1,
                phase: Phase::Active,
            },
            vec![Action::Open { serial: 1 }],
        )
    }
}

/// Next state for `event`, given a rotation threshold in bytes.
///
/// The size is checked once per batch, so a file grows past `max_size` by at
/// most one batch before the next batch triggers the rotation.
pub fn transition(
    state: FileState,
    event: Event,
    max_size: u64,
) -> Result<(FileState, Vec<Action>)> {
    if state.phase == Phase::Sealed {
        return Err(Error::Lifecycle(format!(
            "{:?} received after file {} was sealed",
            event, state.serial
        )));
    }

    match event {
        Event::Batch { file_size } if file_size > max_size => {
            let next = state.serial.checked_add(1).ok_or_else(|| {
                Error::Lifecycle("serial number space exhausted".into())
            })?;
            Ok((
                FileState {
                    serial: next,
                    phase: Phase::Active,
                },
                vec![
                    Action::Seal {
                        serial: state.serial,
                    },
                    Action::Open { serial: next },
                    Action::WriteBatch,
                ],
            ))
        }
        Event::Batch { .. } => Ok((state, vec![Action::WriteBatch])),
        Event::QueueClosed => Ok((
            FileState {
                serial: state.serial,
                phase: Phase::Sealed,
            },
            vec![Action::Seal {
                serial: state.serial,
            }],
        )),
    }
}

/// Sealed file name: `<prefix>-<timestamp>-<serial>-<host><extension>`.
pub fn file_name(
    prefix: &str,
    time: DateTime<Utc>,
    serial: u32,
    host: &str,
    compression: Compression,
) -> String {
    format!(
        "{}-{}-{:05}-{}{}",
        prefix,
        time.format("%Y%m%d%H%M%S%3f"),
        serial,
        host,
        compression.extension()
    )
}

/// Name of a file while it is being written.
pub fn open_name(sealed: &str) -> String {
    format!("{}{}", sealed, OPEN_SUFFIX)
}
