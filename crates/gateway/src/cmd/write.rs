//! Write command - Send JSON samples to every backend
//!
//! Prints one line per backend with its outcome, the same map a remote-write
//! request is answered with.
//!
//! # Usage
//!
//! ```bash
//! cinder write samples.json
//! cinder write --dry-run --prefix test. samples.json
//! cat samples.json | cinder write -
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use cinder_config::Config;
use cinder_gateway::{Gateway, parse_samples};
use clap::Args;
use tokio_util::sync::CancellationToken;

/// Write command arguments
#[derive(Args, Debug)]
pub struct WriteArgs {
    /// JSON sample file, or `-` for stdin
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Print the Carbon lines instead of sending them
    #[arg(long)]
    pub dry_run: bool,

    /// Prefix to use instead of each backend's default_prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the write command
pub async fn run(args: WriteArgs, config: &Config) -> Result<()> {
    let input = read_input(&args.input)?;
    let samples = parse_samples(&input)
        .with_context(|| format!("failed to parse {}", args.input.display()))?;

    let gateway = Gateway::from_config(config).context("invalid backend configuration")?;
    tracing::info!(samples = samples.len(), dry_run = args.dry_run, "writing samples");

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let replies = gateway
        .write(Arc::from(samples), args.prefix, args.dry_run, &cancel)
        .await;
    gateway.shutdown().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&replies)?);
    } else {
        for (backend, message) in &replies {
            println!("{backend}: {}", message.trim_end());
        }
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("failed to read stdin")?;
        return Ok(input);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
