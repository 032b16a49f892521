use reqwest::{Client, RequestBuilder};
use std::time::Duration;

use crate::error::{Error, Result};

pub mod candles;
pub mod spot_price;

/// Shared, connection-pooled client for the candle data API. Built once at
/// startup and passed into every pipeline invocation; the only per-request
/// state is the query string.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}/{}", self.base_url, path))
            .header("Authorization", &self.api_key)
    }
}
