//! Read command - Answer one remote-read query from Graphite-web
//!
//! Prints the response as JSON.
//!
//! # Usage
//!
//! ```bash
//! cinder read --from 1700000000 --until 1700003600 --match __name__=up
//! cinder read --from 1700000000 --match __name__=up --match 'job=~node.*'
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use cinder_config::Config;
use cinder_gateway::Gateway;
use cinder_query::{LabelMatcher, Query, ReadRequest};
use clap::Args;

/// Read command arguments
#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Window start, in epoch seconds
    #[arg(long)]
    pub from: i64,

    /// Window end, in epoch seconds (default: now)
    #[arg(long)]
    pub until: Option<i64>,

    /// Label matcher: name=value, name!=value, name=~regex or name!~regex
    #[arg(short, long = "match", value_name = "MATCHER", required = true)]
    pub matchers: Vec<String>,

    /// Prefix to use instead of the backend's default_prefix
    #[arg(long)]
    pub prefix: Option<String>,
}

/// Run the read command
pub async fn run(args: ReadArgs, config: &Config) -> Result<()> {
    let matchers = args
        .matchers
        .iter()
        .map(|m| LabelMatcher::parse(m))
        .collect::<Result<Vec<_>, _>>()
        .context("invalid matcher")?;

    let until = match args.until {
        Some(until) => until,
        None => SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64,
    };
    let request = ReadRequest {
        queries: vec![Query::new(args.from * 1000, until * 1000, matchers)],
    };

    let gateway = Gateway::from_config(config).context("invalid backend configuration")?;
    let response = gateway.read(&request, args.prefix.as_deref()).await?;

    tracing::info!(
        samples = response.sample_count(),
        series = response.results.iter().map(|r| r.timeseries.len()).sum::<usize>(),
        "read complete"
    );
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
