// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Rotating WARC file writer.
//!
//! A single blocking consumer owns the current file and its encoder.
//! Producers hand batches over through [`BatchSender`]; a send completes only
//! once the consumer has taken the batch, so producers are throttled to the
//! speed of the disk.

use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::compression::FrameWriter;
use crate::config::RotatorSettings;
use crate::error::{Error, Result};
use crate::lifecycle::{file_name, open_name, transition, Action, Event, FileState};
use crate::record::{record_urn, warc_date, RecordBatch, WARC_DATE, WARC_WARCINFO_ID};
use crate::writer::{write_info_record, write_record};

struct Handoff {
    batch: RecordBatch,
    accepted: oneshot::Sender<()>,
}

/// What a rotator produced over its lifetime.
#[derive(Debug, Clone, Default)]
pub struct RotatorSummary {
    /// Sealed files in the order they were written.
    pub files: Vec<PathBuf>,
    pub batches: u64,
    pub records: u64,
}

/// Cloneable producer handle.
#[derive(Clone)]
pub struct BatchSender {
    slot: Arc<Mutex<Option<mpsc::Sender<Handoff>>>>,
}

impl BatchSender {
    fn new(tx: mpsc::Sender<Handoff>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(tx))),
        }
    }

    fn current(&self) -> Option<mpsc::Sender<Handoff>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Hand `batch` to the consumer and wait until it is accepted.
    pub async fn send(&self, batch: RecordBatch) -> Result<()> {
        let tx = self.current().ok_or(Error::RotatorClosed)?;
        let (accepted, ack) = oneshot::channel();
        tx.send(Handoff { batch, accepted })
            .await
            .map_err(|_| Error::RotatorClosed)?;
        drop(tx);
        ack.await.map_err(|_| Error::RotatorClosed)
    }

    /// Detach the shared sender. Every clone sees the rotator as closed.
    fn close(&self) {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_closed(&self) -> bool {
        match self.current() {
            Some(tx) => tx.is_closed(),
            None => true,
        }
    }
}

/// Owns the consumer task of one rotating file set.
pub struct Rotator {
    sender: BatchSender,
    task: JoinHandle<Result<RotatorSummary>>,
}

impl Rotator {
    /// Validate `settings`, create the output directory and start the consumer.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(settings: RotatorSettings) -> Result<Self> {
        settings.validate()?;
        std::fs::create_dir_all(&settings.output_directory).map_err(|e| {
            Error::Config(format!(
                "cannot create output directory {}: {}",
                settings.output_directory.display(),
                e
            ))
        })?;

        let host = local_host_name();
        let (tx, rx) = mpsc::channel(1);
        let task = tokio::task::spawn_blocking(move || {
            let result = run_consumer(settings, host, rx);
            if let Err(e) = &result {
                error!(error = %e, "record writer stopped");
            }
            result
        });

        Ok(Self {
            sender: BatchSender::new(tx),
            task,
        })
    }

    pub fn sender(&self) -> BatchSender {
        self.sender.clone()
    }

    /// Stop accepting batches, seal the current file and wait for the consumer.
    ///
    /// Returns the first fault the consumer hit, if any.
    pub async fn close(self) -> Result<RotatorSummary> {
        self.sender.close();
        self.task
            .await
            .map_err(|e| Error::WriterTask(e.to_string()))?
    }
}

fn local_host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .map(|h| h.replace(['/', '\\'], "_"))
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

struct OpenFile {
    serial: u32,
    open_path: PathBuf,
    final_path: PathBuf,
    info_record_id: Uuid,
    frames: FrameWriter<BufWriter<File>>,
}

impl OpenFile {
    fn create(settings: &RotatorSettings, host: &str, serial: u32) -> Result<Self> {
        let now = Utc::now();
        let name = file_name(&settings.prefix, now, serial, host, settings.compression);
        let final_path = settings.output_directory.join(&name);
        let open_path = settings.output_directory.join(open_name(&name));

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&open_path)?;
        let mut frames = FrameWriter::new(BufWriter::new(file), settings.compression);
        let info_record_id = frames
            .write_frame(|w| write_info_record(w, &settings.info_content, &name, now))?;
        frames.flush()?;

        info!(path = %open_path.display(), serial, "opened WARC file");
        Ok(Self {
            serial,
            open_path,
            final_path,
            info_record_id,
            frames,
        })
    }

    fn size(&self) -> Result<u64> {
        Ok(self.frames.get_ref().get_ref().metadata()?.len())
    }

    fn write_batch(&mut self, batch: RecordBatch) -> Result<usize> {
        let date = warc_date(&batch.capture_time);
        let info_id = record_urn(&self.info_record_id);
        let count = batch.len();
        for mut record in batch.records {
            record.header.set(WARC_DATE, date.as_str());
            record.header.set(WARC_WARCINFO_ID, info_id.as_str());
            self.frames.write_frame(|w| write_record(w, &mut record))?;
        }
        self.frames.flush()?;
        Ok(count)
    }

    fn seal(self) -> Result<PathBuf> {
        let mut frames = self.frames;
        frames.flush()?;
        let file = frames
            .into_inner()
            .into_inner()
            .map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&self.open_path, &self.final_path)?;
        info!(path = %self.final_path.display(), serial = self.serial, "sealed WARC file");
        Ok(self.final_path)
    }
}

struct Consumer {
    settings: RotatorSettings,
    host: String,
    current: Option<OpenFile>,
    summary: RotatorSummary,
}

impl Consumer {
    fn current_size(&self) -> Result<u64> {
        match &self.current {
            Some(f) => f.size(),
            None => Err(Error::Lifecycle("no file is open".into())),
        }
    }

    fn apply(&mut self, actions: &[Action], mut pending: Option<RecordBatch>) -> Result<()> {
        for action in actions {
            match *action {
                Action::Open { serial } => {
                    if self.current.is_some() {
                        return Err(Error::Lifecycle(format!(
                            "file {} opened while another file is active",
                            serial
                        )));
                    }
                    self.current = Some(OpenFile::create(&self.settings, &self.host, serial)?);
                }
                Action::WriteBatch => {
                    let batch = pending
                        .take()
                        .ok_or_else(|| Error::Lifecycle("write without a pending batch".into()))?;
                    let file = self
                        .current
                        .as_mut()
                        .ok_or_else(|| Error::Lifecycle("write without an open file".into()))?;
                    let written = file.write_batch(batch)?;
                    self.summary.batches += 1;
                    self.summary.records += written as u64;
                }
                Action::Seal { serial } => {
                    let file = self
                        .current
                        .take()
                        .ok_or_else(|| Error::Lifecycle("seal without an open file".into()))?;
                    if file.serial != serial {
                        return Err(Error::Lifecycle(format!(
                            "asked to seal file {} but file {} is open",
                            serial, file.serial
                        )));
                    }
                    self.summary.files.push(file.seal()?);
                }
            }
        }
        Ok(())
    }
}

fn run_consumer(
    settings: RotatorSettings,
    host: String,
    mut rx: mpsc::Receiver<Handoff>,
) -> Result<RotatorSummary> {
    let max_size = settings.max_size_bytes();
    let mut consumer = Consumer {
        settings,
        host,
        current: None,
        summary: RotatorSummary::default(),
    };

    let (mut state, actions) = FileState::start();
    consumer.apply(&actions, None)?;

    while let Some(Handoff { batch, accepted }) = rx.blocking_recv() {
        // The producer may have given up waiting; the batch is still written.
        let _ = accepted.send(());
        let file_size = consumer.current_size()?;
        debug!(records = batch.len(), file_size, "writing batch");
        let (next, actions) = transition(state, Event::Batch { file_size }, max_size)?;
        state = next;
        consumer.apply(&actions, Some(batch))?;
    }

    let (_, actions) = transition(state, Event::QueueClosed, max_size)?;
    consumer.apply(&actions, None)?;
    Ok(consumer.summary)
}

/// Sealed files of `dir` whose name starts with `prefix`, oldest serial first.
pub fn sealed_files(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix) && !n.ends_with(crate::lifecycle::OPEN_SUFFIX))
        })
        .collect();
    files.sort();
    Ok(files)
}
