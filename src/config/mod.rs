use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::models::market::{TimeBucket, Window};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub telegram: TelegramConfig,
    pub market: MarketConfig,
    pub rpc: RpcConfig,
    pub forecast: ForecastConfig,
    pub chart: ChartConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
    /// How long a pair-universe snapshot stays fresh before re-fetching.
    pub universe_cache_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MarketConfig {
    pub exchange_id: i64,
    pub chain_id: i64,
    /// Spot-price id of the chain's reference asset (e.g. "ethereum").
    pub reference_asset: String,
    pub trend_windows: Vec<Window>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcConfig {
    pub url: String,
    pub timeout_secs: u64,
    pub factory_address: String,
    pub wrapped_native_address: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ForecastConfig {
    pub horizon: usize,
    pub bucket: TimeBucket,
    /// Buckets per seasonal cycle; minimum viable history is twice this.
    pub seasonal_period: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChartConfig {
    pub width: u32,
    pub height: u32,
    pub cutoff: Window,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&config_str)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let raw = r#"
            [api]
            base_url = "https://example.org/api"
            api_key = "secret"
            timeout_secs = 30
            universe_cache_secs = 600

            [telegram]
            bot_token = "token"

            [market]
            exchange_id = 1
            chain_id = 1
            reference_asset = "ethereum"
            trend_windows = ["1h", "12h", "24h", "7d"]

            [rpc]
            url = "http://localhost:8545"
            timeout_secs = 15
            factory_address = "0x5c69bee701ef814a2b6a3edd4b1652cb9cc5aa6f"
            wrapped_native_address = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"

            [forecast]
            horizon = 30
            bucket = "15m"
            seasonal_period = 96

            [chart]
            width = 900
            height = 600
            cutoff = "72h"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.forecast.bucket, TimeBucket::M15);
        assert_eq!(config.market.trend_windows.len(), 4);
        assert_eq!(config.chart.cutoff.label(), "72h");
    }

    #[test]
    fn rejects_malformed_bucket() {
        let raw = r#"
            [forecast]
            horizon = 30
            bucket = "15min"
            seasonal_period = 96
        "#;
        #[derive(Deserialize)]
        struct Probe {
            #[allow(dead_code)]
            forecast: ForecastConfig,
        }
        assert!(toml::from_str::<Probe>(raw).is_err());
    }
}
