mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use dirstream::archive::{Decoder, DecoderConfig, Encoder, EncoderConfig};
use std::path::PathBuf;
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing_subscriber::EnvFilter;

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn create(cli: &Cli, paths: &[PathBuf]) -> Result<()> {
    let sink: Box<dyn AsyncWrite + Unpin> = if cli.uses_stdio() {
        Box::new(tokio::io::stdout())
    } else {
        let file = File::create(&cli.file)
            .await
            .with_context(|| format!("cannot create {}", cli.file.display()))?;
        Box::new(file)
    };

    let mut encoder = Encoder::new(
        sink,
        EncoderConfig {
            sort_children: cli.sort_children(),
        },
    );

    for path in paths {
        let report = encoder
            .encode(path)
            .await
            .with_context(|| format!("archive aborted while encoding {}", path.display()))?;
        tracing::info!(
            "{}: {} frames, {} skipped",
            path.display(),
            report.frames,
            report.failures.len()
        );
    }
    let stats = encoder.finish().await.context("cannot flush archive")?;
    tracing::info!(
        "archived {} entries ({} files, {} bytes), {} skipped",
        stats.entries(),
        stats.files,
        stats.bytes,
        stats.failed
    );
    Ok(())
}

async fn extract(cli: &Cli) -> Result<()> {
    fs::create_dir_all(&cli.chdir)
        .await
        .with_context(|| format!("cannot create {}", cli.chdir.display()))?;

    let source: Box<dyn AsyncRead + Unpin> = if cli.uses_stdio() {
        Box::new(tokio::io::stdin())
    } else {
        let file = File::open(&cli.file)
            .await
            .with_context(|| format!("cannot open {}", cli.file.display()))?;
        Box::new(file)
    };

    let mut decoder = Decoder::new(
        source,
        cli.chdir.clone(),
        DecoderConfig {
            max_frame_size: cli.max_frame_size,
        },
    );
    let stats = decoder.run().await.context("extraction aborted")?;

    tracing::info!(
        "extracted {} entries ({} files, {} bytes), {} skipped",
        stats.entries(),
        stats.files,
        stats.bytes,
        stats.failed
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    match &cli.command {
        Command::Create { paths } => create(&cli, paths).await,
        Command::Extract => extract(&cli).await,
    }
}
