//! CSV file market data adapter.
//!
//! Reads `<dir>/<SYMBOL>_<interval>.csv` with a header row and columns
//! `timestamp,open,high,low,close,volume`. Timestamps may be RFC 3339 or
//! epoch milliseconds.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use crate::domain::error::BacktestError;
use crate::domain::ohlcv::{Bar, PriceSeries};
use crate::ports::data_port::{MarketDataPort, MIN_FETCH_BARS};

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, interval: &str) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, interval))
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ms) = value.parse::<i64>() {
        return DateTime::from_timestamp_millis(ms);
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl MarketDataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<PriceSeries, BacktestError> {
        let unavailable = |reason: String| BacktestError::DataUnavailable {
            symbol: symbol.to_string(),
            reason,
        };

        let path = self.csv_path(symbol, interval);
        let mut rdr = csv::Reader::from_path(&path)
            .map_err(|e| unavailable(format!("failed to read {}: {}", path.display(), e)))?;

        let mut bars = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| unavailable(format!("CSV parse error: {}", e)))?;

            let field = |idx: usize, name: &str| -> Result<f64, BacktestError> {
                record
                    .get(idx)
                    .ok_or_else(|| unavailable(format!("row {}: missing {} column", line + 1, name)))?
                    .trim()
                    .parse()
                    .map_err(|e| unavailable(format!("row {}: invalid {} value: {}", line + 1, name, e)))
            };

            let raw_ts = record
                .get(0)
                .ok_or_else(|| unavailable(format!("row {}: missing timestamp column", line + 1)))?;
            let timestamp = parse_timestamp(raw_ts).ok_or_else(|| {
                unavailable(format!("row {}: invalid timestamp '{}'", line + 1, raw_ts))
            })?;

            bars.push(Bar {
                timestamp,
                open: field(1, "open")?,
                high: field(2, "high")?,
                low: field(3, "low")?,
                close: field(4, "close")?,
                volume: field(5, "volume")?,
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        if bars.len() > limit {
            bars.drain(..bars.len() - limit);
        }

        if bars.len() < MIN_FETCH_BARS {
            return Err(unavailable(format!(
                "only {} bars available, need at least {}",
                bars.len(),
                MIN_FETCH_BARS
            )));
        }

        PriceSeries::new(symbol, bars)
    }
}
