use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};

/// One tradable pair from the pair-universe snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairEntry {
    pub address: String,
    pub exchange_id: i64,
    pub chain_id: i64,
    pub pair_id: i64,
}

/// Read-only snapshot of all tradable pairs. Refreshed by re-fetching,
/// never mutated in place.
#[derive(Debug, Clone)]
pub struct PairUniverse {
    entries: Vec<PairEntry>,
}

impl PairUniverse {
    pub fn new(entries: Vec<PairEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[PairEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Candle aggregation interval accepted by the data API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeBucket {
    M1,
    M5,
    M15,
    H1,
    H4,
    D1,
}

impl TimeBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeBucket::M1 => "1m",
            TimeBucket::M5 => "5m",
            TimeBucket::M15 => "15m",
            TimeBucket::H1 => "1h",
            TimeBucket::H4 => "4h",
            TimeBucket::D1 => "1d",
        }
    }

    pub fn seconds(&self) -> i64 {
        match self {
            TimeBucket::M1 => 60,
            TimeBucket::M5 => 300,
            TimeBucket::M15 => 900,
            TimeBucket::H1 => 3_600,
            TimeBucket::H4 => 14_400,
            TimeBucket::D1 => 86_400,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(self.seconds())
    }
}

impl FromStr for TimeBucket {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1m" => Ok(TimeBucket::M1),
            "5m" => Ok(TimeBucket::M5),
            "15m" => Ok(TimeBucket::M15),
            "1h" => Ok(TimeBucket::H1),
            "4h" => Ok(TimeBucket::H4),
            "1d" => Ok(TimeBucket::D1),
            other => Err(Error::validation(
                "time_bucket",
                format!("unknown bucket `{}`", other),
            )),
        }
    }
}

impl TryFrom<String> for TimeBucket {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<TimeBucket> for String {
    fn from(bucket: TimeBucket) -> String {
        bucket.as_str().to_string()
    }
}

/// Lookback window such as "1h", "12h", "24h" or "7d". Malformed strings
/// are rejected rather than guessed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Window {
    label: String,
    seconds: i64,
}

impl Window {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(self.seconds)
    }
}

impl FromStr for Window {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::validation("window", format!("unknown window `{}`", s));
        if !s.is_ascii() || s.len() < 2 {
            return Err(malformed());
        }
        let (digits, unit) = s.split_at(s.len() - 1);
        let count: i64 = digits.parse().map_err(|_| malformed())?;
        if count <= 0 {
            return Err(malformed());
        }
        let seconds = match unit {
            "h" => count * 3_600,
            "d" => count * 86_400,
            _ => return Err(malformed()),
        };
        Ok(Window {
            label: s.to_string(),
            seconds,
        })
    }
}

impl TryFrom<String> for Window {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Window> for String {
    fn from(window: Window) -> String {
        window.label
    }
}

/// One fixed-duration aggregation bucket of trade activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandleRow {
    pub ts: i64,
    pub ts_utc: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub price: f64,
    pub volume: f64,
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub tx_count: u64,
    pub buy_count: u64,
    pub sell_count: u64,
}

/// Ordered candle history for one pair. Timestamps are strictly increasing
/// and unique; every downstream computation relies on that.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    rows: Vec<CandleRow>,
}

impl CandleSeries {
    pub fn new(rows: Vec<CandleRow>) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::validation("rows", "candle series has no rows"));
        }
        for pair in rows.windows(2) {
            if pair[1].ts <= pair[0].ts {
                return Err(Error::validation(
                    "ts",
                    format!(
                        "timestamps not strictly increasing: {} then {}",
                        pair[0].ts, pair[1].ts
                    ),
                ));
            }
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[CandleRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn last(&self) -> &CandleRow {
        // nonempty by construction
        self.rows.last().expect("candle series is never empty")
    }

    /// Rows with timestamp >= the cutoff epoch second.
    pub fn slice_from(&self, cutoff_ts: i64) -> &[CandleRow] {
        let start = self.rows.partition_point(|r| r.ts < cutoff_ts);
        &self.rows[start..]
    }
}

/// Which column of the series a computation reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesColumn {
    Close,
    Price,
    High,
}

impl SeriesColumn {
    pub fn value(&self, row: &CandleRow) -> f64 {
        match self {
            SeriesColumn::Close => row.close,
            SeriesColumn::Price => row.price,
            SeriesColumn::High => row.high,
        }
    }
}

/// One predicted time bucket with its uncertainty bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub ts_utc: DateTime<Utc>,
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Forecast horizon; length always equals the requested horizon and the
/// first estimate equals the last known value of the input series.
#[derive(Debug, Clone)]
pub struct ForecastSeries {
    points: Vec<ForecastPoint>,
}

impl ForecastSeries {
    pub fn new(points: Vec<ForecastPoint>) -> Result<Self> {
        if points.is_empty() {
            return Err(Error::validation("points", "forecast series has no points"));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn first(&self) -> &ForecastPoint {
        self.points.first().expect("forecast series is never empty")
    }

    pub fn last(&self) -> &ForecastPoint {
        self.points.last().expect("forecast series is never empty")
    }
}

/// Percentage change over a lookback window. Degenerate windows (one row,
/// empty slice, zero initial price) are explicitly undefined, never NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TrendValue {
    Change(f64),
    Undefined,
}

impl TrendValue {
    pub fn is_defined(&self) -> bool {
        matches!(self, TrendValue::Change(_))
    }
}

impl std::fmt::Display for TrendValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendValue::Change(pct) => write!(f, "{:+.2}%", pct),
            TrendValue::Undefined => write!(f, "n/a"),
        }
    }
}

/// Aggregate statistics over the trailing 24 hours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats24h {
    pub volume: f64,
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub transactions: u64,
    pub buy_transactions: u64,
    pub sell_transactions: u64,
    pub peak_price: f64,
    pub peak_mcap: Decimal,
    pub low_price: f64,
    pub low_mcap: Decimal,
}

/// Full analytics report for one token/pair analysis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendReport {
    /// Window label -> percentage change, in configured window order.
    pub trends: Vec<(String, TrendValue)>,
    pub stats_24h: Stats24h,
    pub current_price: f64,
    pub current_mcap: Decimal,
    pub peak_price_all: f64,
    pub peak_mcap_all: Decimal,
    pub peak_price_time: DateTime<Utc>,
    /// None when the spot price lookup failed; the rest of the report
    /// is still delivered.
    pub liquidity_usd: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(ts: i64, close: f64) -> CandleRow {
        CandleRow {
            ts,
            ts_utc: Utc.timestamp_opt(ts, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            price: close,
            volume: 0.0,
            buy_volume: 0.0,
            sell_volume: 0.0,
            tx_count: 0,
            buy_count: 0,
            sell_count: 0,
        }
    }

    #[test]
    fn series_requires_strictly_increasing_timestamps() {
        let err = CandleSeries::new(vec![row(10, 1.0), row(10, 2.0)]).unwrap_err();
        assert!(matches!(err, Error::Validation { field, .. } if field == "ts"));

        let err = CandleSeries::new(vec![row(20, 1.0), row(10, 2.0)]).unwrap_err();
        assert!(matches!(err, Error::Validation { field, .. } if field == "ts"));

        assert!(CandleSeries::new(vec![row(10, 1.0), row(20, 2.0)]).is_ok());
    }

    #[test]
    fn series_rejects_empty() {
        assert!(CandleSeries::new(vec![]).is_err());
    }

    #[test]
    fn slice_from_is_inclusive() {
        let series = CandleSeries::new(vec![row(0, 1.0), row(3600, 2.0)]).unwrap();
        assert_eq!(series.slice_from(0).len(), 2);
        assert_eq!(series.slice_from(1).len(), 1);
        assert_eq!(series.slice_from(3601).len(), 0);
    }

    #[test]
    fn time_bucket_round_trips() {
        for s in ["1m", "5m", "15m", "1h", "4h", "1d"] {
            let bucket: TimeBucket = s.parse().unwrap();
            assert_eq!(bucket.as_str(), s);
        }
    }

    #[test]
    fn time_bucket_rejects_unknown() {
        let err = "3h".parse::<TimeBucket>().unwrap_err();
        assert!(matches!(err, Error::Validation { field, .. } if field == "time_bucket"));
    }

    #[test]
    fn window_parses_hours_and_days() {
        let w: Window = "24h".parse().unwrap();
        assert_eq!(w.duration(), Duration::hours(24));
        let w: Window = "7d".parse().unwrap();
        assert_eq!(w.duration(), Duration::days(7));
        assert_eq!(w.label(), "7d");
    }

    #[test]
    fn window_rejects_malformed() {
        for s in ["", "h", "7w", "-1h", "0d", "1.5h"] {
            assert!(s.parse::<Window>().is_err(), "accepted `{}`", s);
        }
    }

    #[test]
    fn trend_value_formats() {
        assert_eq!(TrendValue::Change(10.0).to_string(), "+10.00%");
        assert_eq!(TrendValue::Undefined.to_string(), "n/a");
    }
}
