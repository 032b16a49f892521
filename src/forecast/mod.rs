use crate::error::Result;
use crate::models::market::{CandleSeries, ForecastPoint, ForecastSeries, SeriesColumn, TimeBucket};

mod model;

pub use model::{FittedModel, ForecastBand, HoltWinters};

/// Produces a fixed-length forecast for one candle series. Every call fits
/// an independent model instance; nothing is shared between requests.
#[derive(Debug, Clone, Copy)]
pub struct Forecaster {
    seasonal_period: usize,
}

impl Forecaster {
    pub fn new(seasonal_period: usize) -> Self {
        Self { seasonal_period }
    }

    /// Fit on the chosen value column and predict `horizon` buckets past the
    /// end of the known series. The first estimate is pinned to the last
    /// known value so the historical and predicted segments join without a
    /// jump.
    pub fn predict(
        &self,
        series: &CandleSeries,
        horizon: usize,
        freq: TimeBucket,
        column: SeriesColumn,
    ) -> Result<ForecastSeries> {
        let values: Vec<f64> = series.rows().iter().map(|r| column.value(r)).collect();
        let fitted = HoltWinters::new(self.seasonal_period).fit(&values)?;

        let last = series.last();
        let step = freq.duration();
        let mut points: Vec<ForecastPoint> = fitted
            .forecast(horizon)
            .into_iter()
            .enumerate()
            .map(|(i, band)| ForecastPoint {
                ts_utc: last.ts_utc + step * (i as i32 + 1),
                estimate: band.estimate,
                lower: band.lower,
                upper: band.upper,
            })
            .collect();

        if let Some(first) = points.first_mut() {
            first.estimate = column.value(last);
        }

        ForecastSeries::new(points)
    }
}
