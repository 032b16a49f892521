use candlecast::models::market::{CandleRow, CandleSeries, PairEntry, PairUniverse};
use chrono::{TimeZone, Utc};

// Helper to create a single candle row with matching o/h/l/c/p values
pub fn create_test_row(ts: i64, price: f64) -> CandleRow {
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

// Helper to create an evenly spaced series from a price sequence
pub fn create_test_series(start_ts: i64, step: i64, prices: &[f64]) -> CandleSeries {
    let rows = prices
        .iter()
        .enumerate()
        .map(|(i, &price)| create_test_row(start_ts + i as i64 * step, price))
        .collect();
    CandleSeries::new(rows).expect("test series must be valid")
}

// Helper to create a small pair universe for resolver tests
pub fn create_test_universe() -> PairUniverse {
    PairUniverse::new(vec![
        PairEntry {
            address: "0x1111111111111111111111111111111111111111".to_string(),
            exchange_id: 1,
            chain_id: 1,
            pair_id: 101,
        },
        PairEntry {
            address: "0x1111111111111111111111111111111111111111".to_string(),
            exchange_id: 2,
            chain_id: 1,
            pair_id: 102,
        },
        PairEntry {
            address: "0x2222222222222222222222222222222222222222".to_string(),
            exchange_id: 1,
            chain_id: 1,
            pair_id: 201,
        },
    ])
}
