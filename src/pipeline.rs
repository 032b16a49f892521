use chrono::{DateTime, Utc};
use log::{info, warn};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tokio::time::sleep;

use crate::analytics::TrendAnalyzer;
use crate::api::candles::CandleRepository;
use crate::api::spot_price::SpotPriceSource;
use crate::chart::ChartRenderer;
use crate::error::{Error, Result};
use crate::forecast::Forecaster;
use crate::models::market::{
    CandleSeries, ForecastSeries, SeriesColumn, Stats24h, TimeBucket, TrendReport, Window,
};
use crate::resolver::PairResolver;
use crate::token::TokenReader;

const MAX_FETCH_ATTEMPTS: u32 = 3;
const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Result of a `/pair` analysis: chart plus the raw 24h/peak stats.
pub struct PairAnalysis {
    pub image: Vec<u8>,
    pub stats_24h: Stats24h,
    pub peak_price: f64,
    pub peak_price_time: DateTime<Utc>,
}

/// Result of a `/ca` analysis: chart plus the full trend report.
pub struct TokenAnalysis {
    pub image: Vec<u8>,
    pub report: TrendReport,
}

/// Per-invocation settings shared by both analysis flows.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub bucket: TimeBucket,
    pub horizon: usize,
    pub cutoff: Window,
    pub reference_asset: String,
}

/// One analysis request runs through this pipeline: resolve the pair,
/// fetch candles, forecast and analyze concurrently, render the chart.
/// All collaborators are explicit dependencies constructed at startup.
pub struct AnalysisPipeline {
    repository: CandleRepository,
    resolver: PairResolver,
    forecaster: Forecaster,
    analyzer: TrendAnalyzer,
    renderer: ChartRenderer,
    spot: Arc<dyn SpotPriceSource>,
    tokens: Arc<dyn TokenReader>,
    settings: PipelineSettings,
}

impl AnalysisPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository: CandleRepository,
        resolver: PairResolver,
        forecaster: Forecaster,
        analyzer: TrendAnalyzer,
        renderer: ChartRenderer,
        spot: Arc<dyn SpotPriceSource>,
        tokens: Arc<dyn TokenReader>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            repository,
            resolver,
            forecaster,
            analyzer,
            renderer,
            spot,
            tokens,
            settings,
        }
    }

    /// Chart and 24h stats for a pair contract address.
    pub async fn analyse_pair(&self, pair_address: &str) -> Result<PairAnalysis> {
        let universe = self.repository.pair_universe().await?;
        let pair_id = self.resolver.resolve(&universe, pair_address)?;
        info!("analysing pair {} (id {})", pair_address, pair_id);

        let series = self.fetch_with_retry(pair_id).await?;
        let forecast = self.forecast(series.clone()).await?;
        let image = self
            .renderer
            .render(&series, &forecast, &self.settings.cutoff)?;

        // 24h window anchored to the newest candle, not wall-clock time
        let now = series.last().ts_utc;
        let stats_24h = TrendAnalyzer::stats_24h(&series, now, Decimal::ZERO);
        let peak = TrendAnalyzer::all_time_peak(&series);

        Ok(PairAnalysis {
            image,
            stats_24h,
            peak_price: peak.high,
            peak_price_time: peak.ts_utc,
        })
    }

    /// Chart and full analytics report for a token contract address.
    pub async fn analyse_token(&self, contract_address: &str) -> Result<TokenAnalysis> {
        let now = Utc::now();
        let pair_address = self.tokens.pair_address(contract_address).await?;
        let universe = self.repository.pair_universe().await?;
        let pair_id = self.resolver.resolve(&universe, &pair_address)?;
        info!(
            "analysing token {} via pool {} (id {})",
            contract_address, pair_address, pair_id
        );

        let series = self.fetch_with_retry(pair_id).await?;
        let total_supply = self.tokens.total_supply(contract_address).await?;
        let reserve = self.tokens.reference_reserve(contract_address).await?;

        // forecasting is CPU-bound, trend analysis awaits the price lookup;
        // neither depends on the other
        let forecast_task = self.forecast(series.clone());
        let report_fut = self.analyzer.report(
            &series,
            now,
            total_supply,
            reserve,
            self.spot.as_ref(),
            &self.settings.reference_asset,
        );
        let (forecast, report) = tokio::join!(forecast_task, report_fut);
        let forecast = forecast?;

        let image = self
            .renderer
            .render(&series, &forecast, &self.settings.cutoff)?;

        Ok(TokenAnalysis { image, report })
    }

    async fn forecast(&self, series: CandleSeries) -> Result<ForecastSeries> {
        let forecaster = self.forecaster;
        let horizon = self.settings.horizon;
        let bucket = self.settings.bucket;
        task::spawn_blocking(move || {
            forecaster.predict(&series, horizon, bucket, SeriesColumn::Close)
        })
        .await?
    }

    async fn fetch_with_retry(&self, pair_id: i64) -> Result<CandleSeries> {
        let mut delay = INITIAL_RETRY_DELAY;
        let mut attempt = 1;
        loop {
            match self
                .repository
                .fetch_candles(pair_id, self.settings.bucket, None, None)
                .await
            {
                Ok(series) => return Ok(series),
                Err(e) if retryable(&e) && attempt < MAX_FETCH_ATTEMPTS => {
                    warn!(
                        "candle fetch attempt {}/{} for pair {} failed: {}",
                        attempt, MAX_FETCH_ATTEMPTS, pair_id, e
                    );
                    sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn retryable(err: &Error) -> bool {
    matches!(
        err,
        Error::UpstreamUnavailable(_) | Error::EmptySeries(_)
    )
}
