use async_trait::async_trait;
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{Error, Result};

const API_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Spot price lookup for the chain's reference asset. Failures surface as
/// `Error::PriceLookup` and callers are expected to degrade, not abort.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpotPriceSource: Send + Sync {
    /// USD price of the given asset id.
    async fn usd_price(&self, asset_id: &str) -> Result<Decimal>;
}

#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    client: reqwest::Client,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: API_BASE_URL.to_string(),
        })
    }

}

#[async_trait]
impl SpotPriceSource for CoinGeckoClient {
    async fn usd_price(&self, asset_id: &str) -> Result<Decimal> {
        let url = format!("{}/simple/price", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("ids", asset_id), ("vs_currencies", "usd")])
            .send()
            .await
            .map_err(|e| Error::PriceLookup(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::PriceLookup(format!(
                "spot price API returned {}",
                status
            )));
        }

        let body: HashMap<String, HashMap<String, f64>> = response
            .json()
            .await
            .map_err(|e| Error::PriceLookup(e.to_string()))?;
        let price = body
            .get(asset_id)
            .and_then(|quotes| quotes.get("usd"))
            .copied()
            .ok_or_else(|| Error::PriceLookup(format!("no usd quote for {}", asset_id)))?;

        Decimal::from_f64(price)
            .ok_or_else(|| Error::PriceLookup(format!("unrepresentable price {}", price)))
    }
}
