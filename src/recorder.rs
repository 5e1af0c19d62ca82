// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Ties a capturing client to a rotator.

use tracing::info;

use crate::builder::records_from_exchange;
use crate::config::{Config, RotatorSettings};
use crate::connection::load_pem_certificates;
use crate::error::Result;
use crate::record::RecordBatch;
use crate::rotator::{BatchSender, Rotator, RotatorSummary};
use crate::transport::{capture_callback, CapturingClient, ClientBuilder};

/// Archives every exchange made through [`Recorder::client`].
pub struct Recorder {
    client: CapturingClient,
    sender: BatchSender,
    rotator: Rotator,
}

impl Recorder {
    pub fn new(settings: RotatorSettings) -> Result<Self> {
        Self::with_client_builder(settings, ClientBuilder::new())
    }

    /// Start a recorder whose client is configured by `builder`.
    pub fn with_client_builder(settings: RotatorSettings, builder: ClientBuilder) -> Result<Self> {
        // Client settings are checked before the rotator creates its first file.
        let prepared = builder.prepare()?;
        let rotator = Rotator::spawn(settings)?;
        let sender = rotator.sender();

        let callback_sender = sender.clone();
        let client = prepared.with_callback(capture_callback(move |exchange| {
            let sender = callback_sender.clone();
            async move {
                let batch = records_from_exchange(&exchange)?;
                sender.send(batch).await
            }
        }));

        Ok(Self {
            client,
            sender,
            rotator,
        })
    }

    /// Start a recorder from a loaded configuration file.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = ClientBuilder::new().max_redirects(config.tls.max_redirects);
        for path in &config.tls.extra_root_certificates {
            for cert in load_pem_certificates(path)? {
                builder = builder.add_root_certificate(cert);
            }
        }
        Self::with_client_builder(config.rotator.clone(), builder)
    }

    /// Client whose traffic is archived. Clones stay bound to this recorder.
    pub fn client(&self) -> CapturingClient {
        self.client.clone()
    }

    /// Archive a batch built outside the client, e.g. with
    /// [`records_from_response`](crate::builder::records_from_response).
    pub async fn archive(&self, batch: RecordBatch) -> Result<()> {
        self.sender.send(batch).await
    }

    /// Seal the current file and stop the writer.
    pub async fn close(self) -> Result<RotatorSummary> {
        let summary = self.rotator.close().await?;
        info!(
            files = summary.files.len(),
            batches = summary.batches,
            records = summary.records,
            "recorder closed"
        );
        Ok(summary)
    }
}
