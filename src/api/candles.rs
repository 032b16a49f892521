use arrow::array::{Int32Array, Int64Array, StringArray, UInt32Array, UInt64Array};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use futures_util::StreamExt;
use log::{debug, info};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::models::market::{CandleRow, CandleSeries, PairEntry, PairUniverse, TimeBucket};
use crate::utils::cache::Snapshot;

/// One newline-delimited JSON record from the candle endpoint.
#[derive(Debug, Deserialize)]
struct RawCandle {
    ts: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
    bv: f64,
    sv: f64,
    tc: f64,
    b: f64,
    s: f64,
    p: f64,
}

impl RawCandle {
    fn into_row(self) -> Result<CandleRow> {
        let checks = [
            ("o", self.o),
            ("h", self.h),
            ("l", self.l),
            ("c", self.c),
            ("v", self.v),
            ("bv", self.bv),
            ("sv", self.sv),
            ("tc", self.tc),
            ("b", self.b),
            ("s", self.s),
            ("p", self.p),
        ];
        for (name, value) in checks {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::validation(
                    name,
                    format!("invalid value {} at ts {}", value, self.ts),
                ));
            }
        }
        let ts_utc = Utc
            .timestamp_opt(self.ts, 0)
            .single()
            .ok_or_else(|| Error::validation("ts", format!("timestamp {} out of range", self.ts)))?;
        Ok(CandleRow {
            ts: self.ts,
            ts_utc,
            open: self.o,
            high: self.h,
            low: self.l,
            close: self.c,
            price: self.p,
            volume: self.v,
            buy_volume: self.bv,
            sell_volume: self.sv,
            tx_count: self.tc.round() as u64,
            buy_count: self.b.round() as u64,
            sell_count: self.s.round() as u64,
        })
    }
}

/// Fetches candle rows and pair-universe snapshots from the data API and
/// materializes them into the typed series model. Does not retry; retry
/// policy belongs to the caller.
#[derive(Debug)]
pub struct CandleRepository {
    api: ApiClient,
    universe: Snapshot<PairUniverse>,
}

impl CandleRepository {
    pub fn new(api: ApiClient, universe_ttl: Duration) -> Self {
        Self {
            api,
            universe: Snapshot::new(universe_ttl),
        }
    }

    /// Stream candle rows for one pair and accumulate them into an ordered
    /// series with derived UTC timestamps.
    pub async fn fetch_candles(
        &self,
        pair_id: i64,
        bucket: TimeBucket,
        start_time: Option<i64>,
        end_time: Option<i64>,
    ) -> Result<CandleSeries> {
        let mut params: Vec<(&str, String)> = vec![
            ("pair_ids", pair_id.to_string()),
            ("time_bucket", bucket.as_str().to_string()),
        ];
        if let Some(start) = start_time {
            params.push(("start_time", start.to_string()));
        }
        if let Some(end) = end_time {
            params.push(("end_time", end.to_string()));
        }

        let response = self
            .api
            .get("candles-jsonl")
            .query(&params)
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "candle fetch returned {}",
                status
            )));
        }

        let mut rows = Vec::new();
        let mut pending: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;
            pending.extend_from_slice(&chunk);
            while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                append_row(&line[..pos], &mut rows)?;
            }
        }
        append_row(&pending, &mut rows)?;

        debug!("fetched {} candles for pair {}", rows.len(), pair_id);
        finalize_series(rows, pair_id)
    }

    /// The current pair-universe snapshot, re-fetched when stale. The
    /// returned snapshot is shared read-only; refreshes swap the reference.
    pub async fn pair_universe(&self) -> Result<Arc<PairUniverse>> {
        if let Some(snapshot) = self.universe.get().await {
            return Ok(snapshot);
        }

        debug!("pair universe missing or stale, fetching");
        let response = self
            .api
            .get("pair-universe")
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "pair universe fetch returned {}",
                status
            )));
        }
        let data = response
            .bytes()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;

        let universe = decode_universe(data)?;
        info!("pair universe refreshed: {} pairs", universe.len());
        Ok(self.universe.replace(universe).await)
    }
}

fn append_row(line: &[u8], rows: &mut Vec<CandleRow>) -> Result<()> {
    let trimmed: &[u8] = {
        let start = line.iter().position(|b| !b.is_ascii_whitespace());
        let end = line.iter().rposition(|b| !b.is_ascii_whitespace());
        match (start, end) {
            (Some(s), Some(e)) => &line[s..=e],
            _ => return Ok(()),
        }
    };
    let raw: RawCandle = serde_json::from_slice(trimmed)?;
    rows.push(raw.into_row()?);
    Ok(())
}

fn finalize_series(mut rows: Vec<CandleRow>, pair_id: i64) -> Result<CandleSeries> {
    if rows.is_empty() {
        return Err(Error::EmptySeries(format!("no candles for pair {}", pair_id)));
    }
    rows.sort_by_key(|r| r.ts);
    CandleSeries::new(rows)
}

/// Decode a columnar parquet pair-universe snapshot.
fn decode_universe(data: Bytes) -> Result<PairUniverse> {
    let parquet_err = |e: parquet::errors::ParquetError| {
        Error::validation("pair_universe", e.to_string())
    };
    let reader = ParquetRecordBatchReaderBuilder::try_new(data)
        .map_err(parquet_err)?
        .build()
        .map_err(parquet_err)?;

    let mut entries = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| Error::validation("pair_universe", e.to_string()))?;
        let addresses = string_column(&batch, "address")?;
        let exchange_ids = numeric_column(&batch, "exchange_id")?;
        let chain_ids = numeric_column(&batch, "chain_id")?;
        let pair_ids = numeric_column(&batch, "pair_id")?;
        for i in 0..batch.num_rows() {
            entries.push(PairEntry {
                address: addresses.value(i).to_string(),
                exchange_id: exchange_ids[i],
                chain_id: chain_ids[i],
                pair_id: pair_ids[i],
            });
        }
    }
    Ok(PairUniverse::new(entries))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| Error::validation(name, "missing or non-string column"))
}

fn numeric_column(batch: &RecordBatch, name: &str) -> Result<Vec<i64>> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| Error::validation(name, "missing column"))?;
    let any = column.as_any();
    if let Some(a) = any.downcast_ref::<Int64Array>() {
        return Ok((0..a.len()).map(|i| a.value(i)).collect());
    }
    if let Some(a) = any.downcast_ref::<Int32Array>() {
        return Ok((0..a.len()).map(|i| a.value(i) as i64).collect());
    }
    if let Some(a) = any.downcast_ref::<UInt32Array>() {
        return Ok((0..a.len()).map(|i| a.value(i) as i64).collect());
    }
    if let Some(a) = any.downcast_ref::<UInt64Array>() {
        return Ok((0..a.len()).map(|i| a.value(i) as i64).collect());
    }
    Err(Error::validation(
        name,
        format!("unsupported column type {:?}", column.data_type()),
    ))
}
