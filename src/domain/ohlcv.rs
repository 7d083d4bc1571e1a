//! OHLCV bars and the immutable price series built from them.

use chrono::{DateTime, Utc};

use super::error::BacktestError;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Bars in strictly ascending timestamp order.
///
/// The bars cannot be modified once the series is built; slicing produces a
/// new series.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, BacktestError> {
        let symbol = symbol.into();
        if let Some(pos) = bars
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(BacktestError::DataUnavailable {
                symbol,
                reason: format!(
                    "timestamps not strictly ascending at bar {} ({})",
                    pos + 1,
                    bars[pos + 1].timestamp
                ),
            });
        }
        Ok(PriceSeries { symbol, bars })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Bars with `start <= timestamp < end`.
    pub fn slice(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> PriceSeries {
        let lo = self.bars.partition_point(|b| b.timestamp < start);
        let hi = self.bars.partition_point(|b| b.timestamp < end).max(lo);
        PriceSeries {
            symbol: self.symbol.clone(),
            bars: self.bars[lo..hi].to_vec(),
        }
    }

    /// Per-bar simple returns of close: `close[i] / close[i-1] - 1`.
    ///
    /// A non-positive previous close yields a return of 0 for that step.
    pub fn simple_returns(&self) -> Vec<f64> {
        self.bars
            .windows(2)
            .map(|w| {
                let prev = w[0].close;
                if prev > 0.0 {
                    (w[1].close - prev) / prev
                } else {
                    0.0
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn bar_at(hour: i64, close: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hour),
            open: close,
            high: close,
            low: close,
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn rejects_unordered_bars() {
        let err = PriceSeries::new("BTCUSDT", vec![bar_at(1, 100.0), bar_at(0, 101.0)])
            .unwrap_err();
        assert!(matches!(err, BacktestError::DataUnavailable { .. }));
    }

    #[test]
    fn rejects_duplicate_timestamps() {
        let result = PriceSeries::new("BTCUSDT", vec![bar_at(0, 100.0), bar_at(0, 101.0)]);
        assert!(result.is_err());
    }

    #[test]
    fn slice_is_half_open() {
        let bars: Vec<Bar> = (0..10).map(|h| bar_at(h, 100.0 + h as f64)).collect();
        let series = PriceSeries::new("BTCUSDT", bars).unwrap();
        let start = series.bars()[2].timestamp;
        let end = series.bars()[5].timestamp;

        let sliced = series.slice(start, end);
        assert_eq!(sliced.len(), 3);
        assert_eq!(sliced.first().unwrap().close, 102.0);
        assert_eq!(sliced.last().unwrap().close, 104.0);
        assert_eq!(sliced.symbol(), "BTCUSDT");
    }

    #[test]
    fn slice_outside_range_is_empty() {
        let bars: Vec<Bar> = (0..5).map(|h| bar_at(h, 100.0)).collect();
        let series = PriceSeries::new("BTCUSDT", bars).unwrap();
        let start = series.last().unwrap().timestamp + Duration::hours(1);
        assert!(series.slice(start, start + Duration::hours(5)).is_empty());
        // inverted range
        let first = series.first().unwrap().timestamp;
        assert!(series.slice(first + Duration::hours(3), first).is_empty());
    }

    #[test]
    fn simple_returns() {
        let series =
            PriceSeries::new("X", vec![bar_at(0, 100.0), bar_at(1, 110.0), bar_at(2, 99.0)])
                .unwrap();
        let returns = series.simple_returns();
        assert_eq!(returns.len(), 2);
        assert!((returns[0] - 0.10).abs() < 1e-12);
        assert!((returns[1] - (-0.10)).abs() < 1e-12);
    }

    #[test]
    fn simple_returns_zero_price_guard() {
        let series = PriceSeries::new("X", vec![bar_at(0, 0.0), bar_at(1, 10.0)]).unwrap();
        assert_eq!(series.simple_returns(), vec![0.0]);
    }
}
