use async_trait::async_trait;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;
use std::time::Duration;
use tracing::trace;

use crate::error::{PulseboardError, PulseboardResult};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a poller gets its raw response body from.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Human-readable target, used in logs.
    fn describe(&self) -> String;

    /// Performs one request. Non-OK responses are errors.
    async fn fetch(&self) -> PulseboardResult<String>;
}

/// `GET`s a metrics endpoint with `reqwest`.
pub struct HttpMetricsSource {
    client: Client,
    url: String,
}

impl HttpMetricsSource {
    pub fn new(url: impl Into<String>) -> PulseboardResult<Self> {
        Self::with_timeout(url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> PulseboardResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PulseboardError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Shares an existing client, e.g. between several dashboards.
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl MetricsSource for HttpMetricsSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> PulseboardResult<String> {
        let response = self
            .client
            .get(&self.url)
            .header(CACHE_CONTROL, "no-store")
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PulseboardError::HttpStatus {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        let body = response.text().await?;
        trace!(url = %self.url, bytes = body.len(), "Fetched metrics payload");
        Ok(body)
    }
}
