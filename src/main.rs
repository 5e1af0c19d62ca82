// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

use clap::Parser;
use std::path::PathBuf;

use tracing::{error, info};
use warc_recorder::compression::Compression;
use warc_recorder::config::Config;
use warc_recorder::recorder::Recorder;

#[derive(Parser, Debug)]
#[command(name = "warc-recorder")]
struct Args {
    /// Optional config TOML path
    #[arg(long)]
    config: Option<String>,

    /// File name prefix, overrides the config file
    #[arg(long)]
    prefix: Option<String>,

    /// none, gzip or zstd
    #[arg(long)]
    compression: Option<Compression>,

    /// Rotation threshold in megabytes
    #[arg(long)]
    max_size_mb: Option<f64>,

    /// Directory receiving the WARC files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// URLs to fetch, in order
    #[arg(required = true)]
    urls: Vec<String>,
}

async fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut cfg = match args.config {
        Some(ref p) => Config::load_from_path(p).await?,
        None => Config::default(),
    };
    if let Some(ref prefix) = args.prefix {
        cfg.rotator.prefix = prefix.clone();
    }
    if let Some(compression) = args.compression {
        cfg.rotator.compression = compression;
    }
    if let Some(size) = args.max_size_mb {
        cfg.rotator.max_size_mb = size;
    }
    if let Some(ref dir) = args.output_dir {
        cfg.rotator.output_directory = dir.clone();
    }
    cfg.rotator.validate()?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let cfg = load_config(&args).await?;
    let recorder = Recorder::from_config(&cfg)?;
    let client = recorder.client();

    let mut failed = 0usize;
    for url in &args.urls {
        match client.get(url).await {
            Ok(resp) => info!(%url, status = %resp.status(), bytes = resp.body().len(), "fetched"),
            Err(e) => {
                failed += 1;
                error!(%url, error = %e, "fetch failed");
            }
        }
    }

    let summary = recorder.close().await?;
    for file in &summary.files {
        info!(path = %file.display(), "sealed");
    }

    if failed > 0 {
        anyhow::bail!("{} of {} fetches failed", failed, args.urls.len());
    }
    Ok(())
}
