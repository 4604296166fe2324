// ABOUTME: Entry point for the evlog binary.
// ABOUTME: Parses CLI arguments, initializes tracing, and runs one store operation against a log file.

mod config;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use evlog_core::{AppendOnlyStore, Payload, StreamId, Version};
use evlog_store::FileSystemDriver;

use crate::config::EvlogConfig;

/// Append-only event store over a JSONL log
#[derive(Parser, Debug)]
#[command(name = "evlog")]
#[command(about = "Append-only event store with per-stream optimistic concurrency", long_about = None)]
struct Cli {
    /// Log file (overrides EVLOG_FILEPATH)
    #[arg(long, global = true)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append a batch of payloads to a stream
    Append {
        stream: String,
        /// Version the stream is expected to be at (0 for a new stream)
        #[arg(long)]
        expected: Version,
        /// JSON array of payloads, or a single JSON value
        payloads: String,
    },
    /// Print records as JSON lines
    Read {
        /// Only records of this stream
        #[arg(long)]
        stream: Option<String>,
    },
    /// List streams with their current versions
    Streams,
    /// Drop unreadable lines from the log (do not run while it is in use)
    Repair,
}

fn parse_payloads(raw: &str) -> Result<Vec<Payload>> {
    let value: Payload = serde_json::from_str(raw).context("payloads are not valid JSON")?;
    Ok(match value {
        Payload::Array(items) => items,
        single => vec![single],
    })
}

async fn open(config: &EvlogConfig) -> Result<FileSystemDriver> {
    tracing::debug!(path = %config.filepath.display(), sync = config.sync, "opening log");
    FileSystemDriver::open(config.driver_config())
        .await
        .with_context(|| format!("failed to open {}", config.filepath.display()))
}

async fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
    let config = EvlogConfig::from_env()?.with_filepath(cli.file);

    match cli.command {
        Command::Append {
            stream,
            expected,
            payloads,
        } => {
            let payloads = parse_payloads(&payloads)?;
            let driver = open(&config).await?;
            let record = driver
                .append(&StreamId::new(stream), payloads, expected)
                .await?;
            writeln!(out, "{}", serde_json::to_string(&record)?)?;
        }
        Command::Read { stream } => {
            let driver = open(&config).await?;
            let records = match stream {
                Some(stream) => driver.read_records(&StreamId::new(stream)).await?,
                None => driver.read_all_records().await?,
            };
            for record in records {
                writeln!(out, "{}", serde_json::to_string(&record)?)?;
            }
        }
        Command::Streams => {
            let driver = open(&config).await?;
            for (stream, version) in driver.stream_ids().await? {
                writeln!(out, "{}\t{}", stream, version)?;
            }
        }
        Command::Repair => {
            let path = config.filepath.clone();
            let report = tokio::task::spawn_blocking(move || evlog_store::repair(&path)).await??;
            writeln!(
                out,
                "kept {} records, dropped {} lines",
                report.kept, report.dropped
            )?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "evlog=info,evlog_store=info".into()),
        )
        .init();

    run(Cli::parse(), &mut std::io::stdout().lock()).await
}
