use anyhow::Result;
use clap::Parser;
use log::info;
use std::sync::Arc;
use std::time::Duration;

use candlecast::analytics::TrendAnalyzer;
use candlecast::api::candles::CandleRepository;
use candlecast::api::spot_price::CoinGeckoClient;
use candlecast::api::ApiClient;
use candlecast::chart::ChartRenderer;
use candlecast::cli::Cli;
use candlecast::config::Config;
use candlecast::forecast::Forecaster;
use candlecast::pipeline::{AnalysisPipeline, PipelineSettings};
use candlecast::resolver::PairResolver;
use candlecast::telegram::AnalysisBot;
use candlecast::token::EthRpcTokenReader;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    if cli.debug {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    info!("Starting candlecast bot...");

    // Load configuration
    let config_path = cli.config.unwrap_or_else(|| "config/config.toml".into());
    let config = match Config::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from {:?}: {}", config_path, e);
            return Err(anyhow::anyhow!("Configuration loading failed: {}", e));
        }
    };
    info!("Configuration loaded successfully.");

    // Secrets may come from the CLI or environment instead of the config file
    let api_key = std::env::var("TS_API_KEY").unwrap_or_else(|_| config.api.api_key.clone());
    let bot_token = cli
        .bot_token
        .or_else(|| std::env::var("BOT_TOKEN").ok())
        .unwrap_or_else(|| config.telegram.bot_token.clone());

    // Shared collaborators, constructed once and passed in explicitly
    let api_timeout = Duration::from_secs(config.api.timeout_secs);
    let api = ApiClient::new(config.api.base_url.clone(), api_key, api_timeout)?;
    let repository =
        CandleRepository::new(api, Duration::from_secs(config.api.universe_cache_secs));
    let resolver = PairResolver::new(config.market.exchange_id, config.market.chain_id);
    let forecaster = Forecaster::new(config.forecast.seasonal_period);
    let analyzer = TrendAnalyzer::new(config.market.trend_windows.clone());
    let renderer = ChartRenderer::new(config.chart.width, config.chart.height);
    let spot = Arc::new(CoinGeckoClient::new(api_timeout)?);
    let tokens = Arc::new(EthRpcTokenReader::new(
        config.rpc.url.clone(),
        config.rpc.factory_address.clone(),
        config.rpc.wrapped_native_address.clone(),
        Duration::from_secs(config.rpc.timeout_secs),
    )?);

    let settings = PipelineSettings {
        bucket: config.forecast.bucket,
        horizon: config.forecast.horizon,
        cutoff: config.chart.cutoff.clone(),
        reference_asset: config.market.reference_asset.clone(),
    };
    let pipeline = Arc::new(AnalysisPipeline::new(
        repository, resolver, forecaster, analyzer, renderer, spot, tokens, settings,
    ));
    info!("Analysis pipeline initialized.");

    let bot = Arc::new(AnalysisBot::new(bot_token, pipeline));
    info!("Starting Telegram command loop...");
    bot.run().await?;
    Ok(())
}
