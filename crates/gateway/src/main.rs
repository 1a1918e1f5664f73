//! Cinder - Prometheus remote storage gateway for Graphite
//!
//! # Usage
//!
//! ```bash
//! # Build every backend and report what it does
//! cinder --config cinder.toml check
//!
//! # Write JSON samples to every backend (or print the lines with --dry-run)
//! cinder --config cinder.toml write samples.json
//! cat samples.json | cinder write --dry-run --prefix test. -
//!
//! # Read a series back from Graphite-web
//! cinder read --from 1700000000 --until 1700003600 --match __name__=up --match job=node
//! ```

mod cmd;

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use cinder_config::{Config, LogConfig, LogFormat, LogLevel, LogOutput};
use clap::{Parser, Subcommand};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

/// Cinder - Prometheus remote storage gateway for Graphite
#[derive(Parser, Debug)]
#[command(name = "cinder")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the configuration and build every backend
    Check(cmd::check::CheckArgs),

    /// Write JSON samples to every backend
    Write(cmd::write::WriteArgs),

    /// Read series from the Graphite-web backend
    Read(cmd::read::ReadArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = cmd::load_config(cli.config.as_deref())?;
    let log_level = resolve_log_level(cli.log_level.as_deref(), &config);
    init_logging(&log_level, &config.log)?;

    match cli.command {
        Command::Check(args) => cmd::check::run(args, &config).await,
        Command::Write(args) => cmd::write::run(args, &config).await,
        Command::Read(args) => cmd::read::run(args, &config).await,
    }
}

/// Resolve log level: CLI flag > config file > default "info"
fn resolve_log_level(cli_level: Option<&str>, config: &Config) -> String {
    match cli_level {
        // Plain level names are normalised; anything else is an EnvFilter directive
        Some(level) => level
            .parse::<LogLevel>()
            .map(|l| l.as_str().to_string())
            .unwrap_or_else(|_| level.to_string()),
        None => config.log.level.as_str().to_string(),
    }
}

/// Initialize the tracing subscriber for logging
fn init_logging(level: &str, log: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let (writer, ansi) = make_writer(&log.output)?;
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match log.format {
        LogFormat::Console => fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    Ok(())
}

/// Writer for the configured destination, and whether colours make sense there
fn make_writer(output: &LogOutput) -> Result<(BoxMakeWriter, bool)> {
    match output {
        LogOutput::Stderr => Ok((BoxMakeWriter::new(std::io::stderr), true)),
        LogOutput::Stdout => Ok((BoxMakeWriter::new(std::io::stdout), true)),
        LogOutput::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(Path::new(path))
                .with_context(|| format!("failed to open log file {path}"))?;
            Ok((BoxMakeWriter::new(Mutex::new(file)), false))
        }
    }
}
