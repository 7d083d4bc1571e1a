#![allow(dead_code)]

use barlab::domain::backtest::BacktestConfig;
use barlab::domain::error::BacktestError;
pub use barlab::domain::ohlcv::{Bar, PriceSeries};
use barlab::domain::signal::{Signal, SignalKind, SignalProvider};
use barlab::ports::data_port::MarketDataPort;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl MarketDataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        _interval: &str,
        limit: usize,
    ) -> Result<PriceSeries, BacktestError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(BacktestError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        let bars = self.data.get(symbol).cloned().unwrap_or_default();
        let skip = bars.len().saturating_sub(limit);
        PriceSeries::new(symbol, bars[skip..].to_vec())
    }
}

/// Replays a fixed script keyed by bar index (history length - 1).
pub struct ScriptedProvider {
    pub script: HashMap<usize, SignalKind>,
}

impl ScriptedProvider {
    pub fn new(script: &[(usize, SignalKind)]) -> Self {
        Self {
            script: script.iter().copied().collect(),
        }
    }

    /// Buy at bar 50, Sell at bar 60.
    pub fn round_trip() -> Self {
        Self::new(&[(50, SignalKind::Buy), (60, SignalKind::Sell)])
    }
}

impl SignalProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn evaluate(&self, history: &[Bar]) -> Result<Signal, BacktestError> {
        let idx = history.len() - 1;
        let kind = self.script.get(&idx).copied().unwrap_or(SignalKind::Hold);
        Ok(Signal::new(kind, None))
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub fn make_bar(hour: i64, close: f64) -> Bar {
    Bar {
        timestamp: t0() + Duration::hours(hour),
        open: close,
        high: close,
        low: close,
        close,
        volume: 1000.0,
    }
}

/// Hourly bars starting at [`t0`] with the given closes.
pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(i as i64, c))
        .collect()
}

pub fn series_from_closes(closes: &[f64]) -> PriceSeries {
    PriceSeries::new("TEST", bars_from_closes(closes)).unwrap()
}

pub fn flat_series(n: usize, price: f64) -> PriceSeries {
    series_from_closes(&vec![price; n])
}

/// 150 bars at 100 except bar 60, which closes at 110.
pub fn round_trip_series() -> PriceSeries {
    let mut closes = vec![100.0; 150];
    closes[60] = 110.0;
    series_from_closes(&closes)
}

/// A deterministic oscillating series with drift, enough to trigger crossovers.
pub fn wave_series(n: usize) -> PriceSeries {
    let closes: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64;
            100.0 + 15.0 * (x / 12.0).sin() + 4.0 * (x / 3.1).cos() + x * 0.02
        })
        .collect();
    series_from_closes(&closes)
}

pub fn fixture_config() -> BacktestConfig {
    BacktestConfig {
        initial_balance: 10_000.0,
        fee_rate: 0.001,
        slippage: 0.001,
        warmup: 50,
    }
}
