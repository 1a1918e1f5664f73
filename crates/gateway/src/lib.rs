//! Cinder Gateway - Prometheus remote storage on Graphite
//!
//! Binds the translation crates into backends and fans requests out to them.
//!
//! # Architecture
//!
//! ```text
//! Config ──▶ Gateway ──┬──▶ GraphiteClient ──▶ PathResolver ──▶ CarbonTransport ──▶ Carbon
//!                      │                  └──▶ QueryTranslator ──▶ Graphite-web
//!                      └──▶ GraphiteClient ...
//! ```
//!
//! # Example
//!
//! ```ignore
//! let config = Config::from_file("cinder.toml")?;
//! let gateway = Gateway::from_config(&config)?;
//! gateway.start();
//!
//! let replies = gateway.write(samples, None, false, &CancellationToken::new()).await;
//! for (backend, message) in &replies {
//!     println!("{backend}: {message}");
//! }
//! ```

pub mod client;
pub mod error;
pub mod gateway;
pub mod samples;

pub use client::{
    ClientMetrics, ClientMetricsSnapshot, DONE_MESSAGE, GraphiteClient, SKIPPED_MESSAGE,
    WriteOutcome,
};
pub use error::{GatewayError, Result};
pub use gateway::Gateway;
pub use samples::parse_samples;
