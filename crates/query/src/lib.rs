//! Cinder Query - Prometheus remote reads served from Graphite-web
//!
//! - `QueryTranslator` - Turns queries into expand/render requests
//! - `Fetcher` / `HttpFetcher` - HTTP access, swappable in tests
//! - `interpolate` - Optional gap filling between sparse points
//!
//! # Usage
//!
//! ```ignore
//! use cinder_query::{HttpFetcher, LabelMatcher, Query, QueryTranslator};
//!
//! let translator = QueryTranslator::new(Arc::new(HttpFetcher::new()), "http://graphite-web:8080")
//!     .with_prefix("prometheus.");
//! let query = Query::new(start_ms, end_ms, vec![LabelMatcher::equal("__name__", "up")]);
//! let series = translator.query(&query, None).await?;
//! ```

pub mod error;
pub mod fetcher;
pub mod interpolate;
pub mod translator;
pub mod types;

pub use error::{QueryError, Result};
pub use fetcher::{Fetcher, HttpFetcher};
pub use interpolate::interpolate;
pub use translator::{MAX_FETCH_WORKERS, QueryTranslator, ReadMode, tag_target};
pub use types::{
    CompiledMatcher, LabelMatcher, MatchType, Point, Query, QueryResult, ReadRequest,
    ReadResponse, TimeSeries,
};
