//! HTTP access to Graphite-web
//!
//! The translator only needs "GET this URL, give me the body". Keeping that
//! behind a trait lets tests answer from fixtures.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{QueryError, Result};

/// Fetches a URL and returns the response body
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url`; any non-success status is an error
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// Fetcher backed by a shared `reqwest` client
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with a default client
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| QueryError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.bytes().await.map_err(|e| QueryError::Fetch {
            url: url.to_string(),
            message: format!("failed to read response: {e}"),
        })
    }
}
