//! Backtest engine and event loop.
//!
//! Walks a price series bar by bar from the warm-up index, asks the signal
//! provider for a decision on each prefix and applies the transition table:
//!
//! | signal | flat       | long       | short       |
//! |--------|------------|------------|-------------|
//! | Buy    | open long  | no-op      | close short |
//! | Sell   | open short | close long | no-op       |
//! | Hold   | -          | -          | -           |
//!
//! A reversal is never implicit: closing a position leaves the run flat.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::{info, warn};

use super::error::BacktestError;
use super::execution::{self, ExecutionConfig};
use super::ohlcv::{Bar, PriceSeries};
use super::portfolio::{EquityPoint, Portfolio};
use super::position::{Side, Trade};
use super::signal::{Signal, SignalKind, SignalProvider};
use super::strategy::Strategy;

/// Bars required after the warm-up before a run is meaningful.
pub const MIN_BARS: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_balance: f64,
    pub fee_rate: f64,
    pub slippage: f64,
    pub warmup: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_balance: 10_000.0,
            fee_rate: 0.001,
            slippage: 0.001,
            warmup: 50,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), BacktestError> {
        if !(self.initial_balance > 0.0) || !self.initial_balance.is_finite() {
            return Err(BacktestError::invalid(
                "backtest",
                "initial_balance",
                "initial_balance must be positive",
            ));
        }
        if !(0.0..1.0).contains(&self.fee_rate) {
            return Err(BacktestError::invalid(
                "backtest",
                "fee_rate",
                "fee_rate must be in [0, 1)",
            ));
        }
        if !(0.0..1.0).contains(&self.slippage) {
            return Err(BacktestError::invalid(
                "backtest",
                "slippage",
                "slippage must be in [0, 1)",
            ));
        }
        Ok(())
    }

    pub fn execution(&self) -> ExecutionConfig {
        ExecutionConfig {
            fee_rate: self.fee_rate,
            slippage: self.slippage,
        }
    }

    pub fn minimum_bars(&self) -> usize {
        self.warmup + MIN_BARS
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub initial_balance: f64,
    pub final_balance: f64,
}

impl BacktestResult {
    pub fn total_return_pct(&self) -> f64 {
        (self.final_balance - self.initial_balance) / self.initial_balance * 100.0
    }
}

/// Run one simulation.
///
/// Pure over its inputs: the same series, provider and config always produce
/// the same ledger and equity curve.
pub fn run_backtest(
    series: &PriceSeries,
    provider: &dyn SignalProvider,
    config: &BacktestConfig,
) -> Result<BacktestResult, BacktestError> {
    config.validate()?;

    let bars = series.bars();
    let minimum = config.minimum_bars();
    if bars.len() < minimum {
        return Err(BacktestError::InsufficientData {
            bars: bars.len(),
            minimum,
        });
    }

    let exec = config.execution();
    let mut portfolio = Portfolio::new(config.initial_balance);

    portfolio.record_equity(
        initial_equity_time(bars, config.warmup),
        config.initial_balance,
    );

    for i in config.warmup..bars.len() {
        let bar = &bars[i];
        let signal = evaluate_or_hold(provider, &bars[..=i]);

        match (signal.kind, portfolio.position.as_ref().map(|p| p.side)) {
            (SignalKind::Buy, None) => {
                execution::enter_position(
                    &mut portfolio,
                    Side::Long,
                    bar.close,
                    bar.timestamp,
                    signal.indicator,
                    &exec,
                );
            }
            (SignalKind::Sell, None) => {
                execution::enter_position(
                    &mut portfolio,
                    Side::Short,
                    bar.close,
                    bar.timestamp,
                    signal.indicator,
                    &exec,
                );
            }
            (SignalKind::Buy, Some(Side::Short)) | (SignalKind::Sell, Some(Side::Long)) => {
                execution::exit_position(&mut portfolio, bar.close, bar.timestamp, &exec);
            }
            _ => {}
        }

        let equity = portfolio.total_equity(bar.close);
        portfolio.record_equity(bar.timestamp, equity);
    }

    if let Some(last) = bars.last() {
        execution::force_close(&mut portfolio, last.close, &exec);
    }

    let result = BacktestResult {
        trades: portfolio.trades,
        equity_curve: portfolio.equity_curve,
        initial_balance: portfolio.initial_balance,
        final_balance: portfolio.balance,
    };

    info!(
        strategy = provider.name(),
        symbol = series.symbol(),
        bars = bars.len(),
        trades = result.trades.len(),
        final_balance = result.final_balance,
        "backtest complete"
    );

    Ok(result)
}

/// Timestamp of the initial equity point: the last warm-up bar, or one bar
/// interval before the first bar when there is no warm-up.
fn initial_equity_time(bars: &[Bar], warmup: usize) -> DateTime<Utc> {
    let first = bars[0].timestamp;
    if warmup > 0 {
        return bars[warmup - 1].timestamp;
    }
    bars.get(1)
        .and_then(|next| first.checked_sub_signed(next.timestamp - first))
        .unwrap_or(first)
}

/// Evaluate the provider, substituting Hold when it fails.
pub(crate) fn evaluate_or_hold(provider: &dyn SignalProvider, history: &[Bar]) -> Signal {
    match provider.evaluate(history) {
        Ok(signal) => signal,
        Err(e) => {
            warn!(strategy = provider.name(), error = %e, "signal evaluation failed, holding");
            Signal::hold()
        }
    }
}

/// Run several strategies against the same series on the rayon pool.
///
/// Results come back in the order of `strategies`; each entry fails or
/// succeeds independently.
pub fn run_batch(
    strategies: &[Strategy],
    series: &PriceSeries,
    config: &BacktestConfig,
) -> Vec<Result<BacktestResult, BacktestError>> {
    strategies
        .par_iter()
        .map(|strategy| {
            strategy.validate()?;
            run_backtest(series, strategy, config)
        })
        .collect()
}
