//! Check command - Build every backend and report its role
//!
//! Compiling the rules and templates is the part that can fail, so a config
//! that passes `check` will not fail on its first sample.
//!
//! # Usage
//!
//! ```bash
//! cinder --config cinder.toml check
//! cinder --config cinder.toml check --json
//! ```

use anyhow::{Context, Result};
use cinder_config::Config;
use cinder_gateway::Gateway;
use clap::Args;
use serde::Serialize;

/// Check command arguments
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// One backend as reported by `check`
#[derive(Debug, Serialize)]
struct BackendSummary {
    name: String,
    carbon: Option<String>,
    transport: Option<&'static str>,
    read_url: Option<String>,
    rules: usize,
    paths_cache: bool,
}

/// Run the check command
pub async fn run(args: CheckArgs, config: &Config) -> Result<()> {
    let gateway = Gateway::from_config(config).context("invalid backend configuration")?;

    let summaries: Vec<BackendSummary> = config
        .backends()
        .zip(gateway.clients())
        .map(|((_, graphite), client)| BackendSummary {
            name: client.name().to_string(),
            carbon: client
                .transport()
                .map(|t| t.config().address.clone()),
            transport: client.transport().map(|t| t.config().kind.as_str()),
            read_url: client
                .is_reader()
                .then(|| graphite.read.url.clone()),
            rules: client.resolver().rules().len(),
            paths_cache: client.resolver().cache().is_some(),
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("no backends configured");
        return Ok(());
    }

    for summary in &summaries {
        println!("{}", summary.name);
        match (&summary.carbon, summary.transport) {
            (Some(address), Some(transport)) => println!("  write: {transport}://{address}"),
            _ => println!("  write: skipped (no carbon address)"),
        }
        match &summary.read_url {
            Some(url) => println!("  read:  {url}"),
            None => println!("  read:  disabled"),
        }
        println!(
            "  rules: {} (paths cache {})",
            summary.rules,
            if summary.paths_cache { "on" } else { "off" }
        );
    }

    Ok(())
}
