use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use plotters::prelude::*;
use plotters::series::DashedLineSeries;

use crate::error::{Error, Result};
use crate::models::market::{CandleRow, CandleSeries, ForecastSeries, Window};

const JPEG_QUALITY: u8 = 90;

/// Draws the known close series and the forecast band into a fresh raster
/// buffer and encodes it as JPEG. Each call owns its drawing context; no
/// canvas is shared between renders.
#[derive(Debug, Clone, Copy)]
pub struct ChartRenderer {
    width: u32,
    height: u32,
}

impl ChartRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn render(
        &self,
        series: &CandleSeries,
        forecast: &ForecastSeries,
        cutoff: &Window,
    ) -> Result<Vec<u8>> {
        let cutoff_time = series.last().ts_utc - cutoff.duration();
        let known: Vec<&CandleRow> = series
            .rows()
            .iter()
            .filter(|r| r.ts_utc > cutoff_time)
            .collect();
        // the last row is always newer than the cutoff
        let x_start = known[0].ts_utc;
        let x_end = forecast.last().ts_utc;
        let (y_min, y_max) = value_range(&known, forecast);

        let mut pixels = vec![0u8; (self.width * self.height * 3) as usize];
        {
            let root =
                BitMapBackend::with_buffer(&mut pixels, (self.width, self.height))
                    .into_drawing_area();
            root.fill(&WHITE).map_err(draw_err)?;

            let mut chart = ChartBuilder::on(&root)
                .margin(10)
                .x_label_area_size(40)
                .y_label_area_size(60)
                .build_cartesian_2d(x_start..x_end, y_min..y_max)
                .map_err(draw_err)?;

            chart
                .configure_mesh()
                .x_labels(8)
                .x_label_formatter(&|ts: &DateTime<Utc>| ts.format("%H:%M").to_string())
                .x_desc("Time")
                .y_desc("Close price")
                .draw()
                .map_err(draw_err)?;

            chart
                .draw_series(LineSeries::new(
                    known.iter().map(|r| (r.ts_utc, r.close)),
                    &BLACK,
                ))
                .map_err(draw_err)?
                .label("Known")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 12, y)], BLACK));

            chart
                .draw_series(LineSeries::new(
                    forecast.points().iter().map(|p| (p.ts_utc, p.estimate)),
                    &BLUE,
                ))
                .map_err(draw_err)?
                .label("Predicted")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 12, y)], BLUE));

            chart
                .draw_series(DashedLineSeries::new(
                    forecast.points().iter().map(|p| (p.ts_utc, p.upper)),
                    5,
                    3,
                    GREEN.stroke_width(1),
                ))
                .map_err(draw_err)?
                .label("Upper bound")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 12, y)], GREEN));

            chart
                .draw_series(DashedLineSeries::new(
                    forecast.points().iter().map(|p| (p.ts_utc, p.lower)),
                    5,
                    3,
                    RED.stroke_width(1),
                ))
                .map_err(draw_err)?
                .label("Lower bound")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 12, y)], RED));

            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()
                .map_err(draw_err)?;

            root.present().map_err(draw_err)?;
        }

        let mut encoded = Vec::new();
        JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY)
            .encode(&pixels, self.width, self.height, image::ColorType::Rgb8)
            .map_err(|e| Error::Render(e.to_string()))?;
        Ok(encoded)
    }
}

fn value_range(known: &[&CandleRow], forecast: &ForecastSeries) -> (f64, f64) {
    let mut min = f64::MAX;
    let mut max = f64::MIN;
    for row in known {
        min = min.min(row.close);
        max = max.max(row.close);
    }
    for point in forecast.points() {
        min = min.min(point.lower);
        max = max.max(point.upper);
    }
    // keep a degenerate flat range drawable
    let pad = ((max - min) * 0.05).max(max.abs() * 0.01).max(1e-9);
    (min - pad, max + pad)
}

fn draw_err<E: std::fmt::Display>(err: E) -> Error {
    Error::Render(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::market::ForecastPoint;
    use chrono::TimeZone;

    fn known_series(n: usize) -> CandleSeries {
        let rows = (0..n)
            .map(|i| {
                let ts = 1_700_000_000 + i as i64 * 900;
                let close = 100.0 + (i as f64 * 0.3).sin() * 4.0;
                CandleRow {
                    ts,
                    ts_utc: Utc.timestamp_opt(ts, 0).unwrap(),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    price: close,
                    volume: 10.0,
                    buy_volume: 5.0,
                    sell_volume: 5.0,
                    tx_count: 2,
                    buy_count: 1,
                    sell_count: 1,
                }
            })
            .collect();
        CandleSeries::new(rows).unwrap()
    }

    fn forecast_after(series: &CandleSeries, n: usize) -> ForecastSeries {
        let last = series.last();
        let points = (1..=n)
            .map(|h| ForecastPoint {
                ts_utc: last.ts_utc + chrono::Duration::minutes(15 * h as i64),
                estimate: last.close + h as f64 * 0.1,
                lower: last.close - 2.0,
                upper: last.close + 2.0 + h as f64 * 0.1,
            })
            .collect();
        ForecastSeries::new(points).unwrap()
    }

    #[test]
    fn rendered_chart_decodes_to_a_nonzero_image() {
        let series = known_series(96);
        let forecast = forecast_after(&series, 20);
        let renderer = ChartRenderer::new(640, 420);
        let cutoff: Window = "12h".parse().unwrap();

        let jpeg = renderer.render(&series, &forecast, &cutoff).unwrap();
        assert!(!jpeg.is_empty());

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 640);
        assert_eq!(decoded.height(), 420);
    }

    #[test]
    fn flat_series_still_renders() {
        let rows = (0..8)
            .map(|i| {
                let ts = 1_700_000_000 + i as i64 * 900;
                CandleRow {
                    ts,
                    ts_utc: Utc.timestamp_opt(ts, 0).unwrap(),
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 1.0,
                    price: 1.0,
                    volume: 0.0,
                    buy_volume: 0.0,
                    sell_volume: 0.0,
                    tx_count: 0,
                    buy_count: 0,
                    sell_count: 0,
                }
            })
            .collect();
        let series = CandleSeries::new(rows).unwrap();
        let forecast = forecast_after(&series, 4);
        let renderer = ChartRenderer::new(320, 200);
        let cutoff: Window = "1h".parse().unwrap();
        assert!(renderer.render(&series, &forecast, &cutoff).is_ok());
    }
}
