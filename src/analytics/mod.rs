use chrono::{DateTime, Utc};
use log::warn;
use num_traits::FromPrimitive;
use rust_decimal::Decimal;

use crate::api::spot_price::SpotPriceSource;
use crate::models::market::{CandleRow, CandleSeries, Stats24h, TrendReport, TrendValue, Window};

const DAY_SECONDS: i64 = 86_400;

/// Windowed trend, 24h aggregate and peak statistics over one candle
/// series. Pure computation apart from the spot-price collaborator used
/// for the liquidity valuation.
#[derive(Debug, Clone)]
pub struct TrendAnalyzer {
    windows: Vec<Window>,
}

impl TrendAnalyzer {
    pub fn new(windows: Vec<Window>) -> Self {
        Self { windows }
    }

    /// Percentage change over one lookback window ending at `now`.
    /// Degenerate windows are undefined, never an error.
    pub fn window_trend(series: &CandleSeries, now: DateTime<Utc>, window: &Window) -> TrendValue {
        let cutoff = (now - window.duration()).timestamp();
        let slice = series.slice_from(cutoff);
        if slice.len() <= 1 {
            return TrendValue::Undefined;
        }
        let initial_price = slice[0].price;
        let final_price = slice[slice.len() - 1].price;
        if initial_price == 0.0 {
            return TrendValue::Undefined;
        }
        TrendValue::Change((final_price - initial_price) / initial_price * 100.0)
    }

    /// Aggregate flows and price extremes over the trailing 24 hours.
    /// Market caps are decimal-exact: peak/trough price x total supply.
    pub fn stats_24h(series: &CandleSeries, now: DateTime<Utc>, total_supply: Decimal) -> Stats24h {
        let slice = series.slice_from(now.timestamp() - DAY_SECONDS);

        let mut stats = Stats24h {
            volume: 0.0,
            buy_volume: 0.0,
            sell_volume: 0.0,
            transactions: 0,
            buy_transactions: 0,
            sell_transactions: 0,
            peak_price: 0.0,
            peak_mcap: Decimal::ZERO,
            low_price: 0.0,
            low_mcap: Decimal::ZERO,
        };
        if slice.is_empty() {
            return stats;
        }

        let mut peak = f64::MIN;
        let mut low = f64::MAX;
        for row in slice {
            stats.volume += row.volume;
            stats.buy_volume += row.buy_volume;
            stats.sell_volume += row.sell_volume;
            stats.transactions += row.tx_count;
            stats.buy_transactions += row.buy_count;
            stats.sell_transactions += row.sell_count;
            peak = peak.max(row.high);
            low = low.min(row.high);
        }

        stats.peak_price = peak;
        stats.low_price = low;
        stats.peak_mcap = market_cap(peak, total_supply);
        stats.low_mcap = market_cap(low, total_supply);
        stats
    }

    /// All-time peak of the high-price column and the first row reaching it.
    pub fn all_time_peak(series: &CandleSeries) -> &CandleRow {
        let mut peak = &series.rows()[0];
        for row in series.rows() {
            if row.high > peak.high {
                peak = row;
            }
        }
        peak
    }

    /// Full report for one analysis request. The spot-price lookup may
    /// fail; the report is still produced with liquidity unavailable.
    pub async fn report(
        &self,
        series: &CandleSeries,
        now: DateTime<Utc>,
        total_supply: Decimal,
        reserve: Decimal,
        spot: &dyn SpotPriceSource,
        reference_asset: &str,
    ) -> TrendReport {
        let trends = self
            .windows
            .iter()
            .map(|w| (w.label().to_string(), Self::window_trend(series, now, w)))
            .collect();

        let stats_24h = Self::stats_24h(series, now, total_supply);

        let peak_row = Self::all_time_peak(series);
        let peak_price_all = peak_row.high;
        let peak_mcap_all = market_cap(peak_price_all, total_supply);
        let peak_price_time = peak_row.ts_utc;

        let current_price = series.last().high;
        let current_mcap = market_cap(current_price, total_supply);

        let liquidity_usd = match spot.usd_price(reference_asset).await {
            Ok(price) => Some(reserve * price),
            Err(e) => {
                warn!("liquidity valuation unavailable: {}", e);
                None
            }
        };

        TrendReport {
            trends,
            stats_24h,
            current_price,
            current_mcap,
            peak_price_all,
            peak_mcap_all,
            peak_price_time,
            liquidity_usd,
        }
    }
}

fn market_cap(price: f64, total_supply: Decimal) -> Decimal {
    match Decimal::from_f64(price) {
        Some(price) => price * total_supply,
        None => Decimal::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::spot_price::MockSpotPriceSource;
    use crate::error::Error;
    use crate::models::market::CandleRow;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn row(ts: i64, price: f64) -> CandleRow {
        CandleRow {
            ts,
            ts_utc: Utc.timestamp_opt(ts, 0).unwrap(),
            open: price,
            high: price,
            low: price,
            close: price,
            price,
            volume: 10.0,
            buy_volume: 6.0,
            sell_volume: 4.0,
            tx_count: 3,
            buy_count: 2,
            sell_count: 1,
        }
    }

    fn at(ts: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(ts, 0).unwrap()
    }

    #[test]
    fn one_hour_trend_matches_hand_computation() {
        let series = CandleSeries::new(vec![row(0, 100.0), row(3600, 110.0)]).unwrap();
        let window: Window = "1h".parse().unwrap();
        let trend = TrendAnalyzer::window_trend(&series, at(3600), &window);
        assert_eq!(trend, TrendValue::Change(10.0));
    }

    #[test]
    fn single_row_window_is_undefined() {
        let series = CandleSeries::new(vec![row(0, 100.0), row(7200, 110.0)]).unwrap();
        let window: Window = "1h".parse().unwrap();
        let trend = TrendAnalyzer::window_trend(&series, at(7200), &window);
        assert_eq!(trend, TrendValue::Undefined);
    }

    #[test]
    fn empty_window_is_undefined() {
        let series = CandleSeries::new(vec![row(0, 100.0)]).unwrap();
        let window: Window = "1h".parse().unwrap();
        let trend = TrendAnalyzer::window_trend(&series, at(90_000), &window);
        assert_eq!(trend, TrendValue::Undefined);
    }

    #[test]
    fn zero_initial_price_is_undefined() {
        let series = CandleSeries::new(vec![row(0, 0.0), row(3600, 110.0)]).unwrap();
        let window: Window = "1h".parse().unwrap();
        let trend = TrendAnalyzer::window_trend(&series, at(3600), &window);
        assert_eq!(trend, TrendValue::Undefined);
    }

    #[test]
    fn stats_sum_the_trailing_day_only() {
        let old = row(0, 5.0);
        let recent_a = row(200_000, 1.0);
        let recent_b = row(200_900, 3.0);
        let series = CandleSeries::new(vec![old, recent_a, recent_b]).unwrap();

        let stats = TrendAnalyzer::stats_24h(&series, at(201_000), dec!(1000));
        assert_eq!(stats.volume, 20.0);
        assert_eq!(stats.buy_volume, 12.0);
        assert_eq!(stats.sell_volume, 8.0);
        assert_eq!(stats.transactions, 6);
        assert_eq!(stats.buy_transactions, 4);
        assert_eq!(stats.sell_transactions, 2);
        assert_eq!(stats.peak_price, 3.0);
        assert_eq!(stats.low_price, 1.0);
        assert_eq!(stats.peak_mcap, dec!(3000));
        assert_eq!(stats.low_mcap, dec!(1000));
    }

    #[test]
    fn market_cap_is_decimal_exact() {
        let mcap = market_cap(0.00001234, Decimal::from(1_000_000_000u64));
        assert_eq!(mcap, dec!(12340.0));
    }

    #[test]
    fn all_time_peak_takes_the_first_occurrence() {
        let mut first = row(0, 1.0);
        first.high = 9.0;
        let mut repeat = row(900, 1.0);
        repeat.high = 9.0;
        let series = CandleSeries::new(vec![first, row(100, 1.0), repeat]).unwrap();
        let peak = TrendAnalyzer::all_time_peak(&series);
        assert_eq!(peak.high, 9.0);
        assert_eq!(peak.ts, 0);
    }

    #[tokio::test]
    async fn report_survives_a_failed_price_lookup() {
        let series = CandleSeries::new(vec![row(0, 100.0), row(3600, 110.0)]).unwrap();
        let analyzer = TrendAnalyzer::new(vec!["1h".parse().unwrap(), "24h".parse().unwrap()]);

        let mut spot = MockSpotPriceSource::new();
        spot.expect_usd_price()
            .returning(|_| Err(Error::PriceLookup("down".into())));

        let report = analyzer
            .report(&series, at(3600), dec!(1000), dec!(5), &spot, "ethereum")
            .await;

        assert!(report.liquidity_usd.is_none());
        assert_eq!(report.trends.len(), 2);
        assert_eq!(report.trends[0].1, TrendValue::Change(10.0));
        assert_eq!(report.current_price, 110.0);
        assert_eq!(report.current_mcap, dec!(110000));
    }

    #[tokio::test]
    async fn liquidity_is_reserve_times_spot_price() {
        let series = CandleSeries::new(vec![row(0, 100.0), row(3600, 110.0)]).unwrap();
        let analyzer = TrendAnalyzer::new(vec!["1h".parse().unwrap()]);

        let mut spot = MockSpotPriceSource::new();
        spot.expect_usd_price().returning(|_| Ok(dec!(2000)));

        let report = analyzer
            .report(&series, at(3600), dec!(1000), dec!(5.5), &spot, "ethereum")
            .await;

        assert_eq!(report.liquidity_usd, Some(dec!(11000.0)));
    }
}
