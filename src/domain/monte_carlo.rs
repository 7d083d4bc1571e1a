//! Monte Carlo robustness check by return resampling.
//!
//! Each iteration draws the source series' bar returns with replacement,
//! compounds them into a synthetic path and replays the strategy over it
//! with a simplified long-only simulator. The spread of the resulting
//! returns shows how much of the historical result is path luck.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::info;

use super::backtest::{evaluate_or_hold, run_backtest, BacktestConfig};
use super::error::BacktestError;
use super::execution::POSITION_FRACTION;
use super::metrics::mean_and_stddev;
use super::ohlcv::{Bar, PriceSeries};
use super::signal::{SignalKind, SignalProvider};

#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloConfig {
    pub simulations: usize,
    /// Master seed. `None` draws a fresh one; the seed used is reported.
    pub seed: Option<u64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        MonteCarloConfig {
            simulations: 1000,
            seed: None,
        }
    }
}

impl MonteCarloConfig {
    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.simulations == 0 {
            return Err(BacktestError::invalid(
                "monte_carlo",
                "simulations",
                "simulations must be at least 1",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloResult {
    pub simulations: usize,
    pub seed: u64,
    pub mean_return: f64,
    pub std_return: f64,
    /// 5th percentile of simulated returns.
    pub var_95: f64,
    /// 1st percentile of simulated returns.
    pub var_99: f64,
    pub max_return: f64,
    pub min_return: f64,
    pub positive_fraction: f64,
    /// Full-fidelity return on the source series; not part of the distribution.
    pub actual_return: f64,
}

pub fn run_monte_carlo(
    provider: &dyn SignalProvider,
    series: &PriceSeries,
    backtest_config: &BacktestConfig,
    config: &MonteCarloConfig,
) -> Result<MonteCarloResult, BacktestError> {
    config.validate()?;
    if series.len() < 2 {
        return Err(BacktestError::InsufficientData {
            bars: series.len(),
            minimum: 2,
        });
    }

    let actual_return = run_backtest(series, provider, backtest_config)?.total_return_pct();

    let seed = config.seed.unwrap_or_else(rand::random);
    let mut master = StdRng::seed_from_u64(seed);
    let sub_seeds: Vec<u64> = (0..config.simulations).map(|_| master.r#gen()).collect();

    let returns = series.simple_returns();
    let bars = series.bars();

    let mut outcomes: Vec<f64> = sub_seeds
        .par_iter()
        .map(|&sub_seed| {
            let mut rng = StdRng::seed_from_u64(sub_seed);
            let path = synthesize_path(bars, &returns, &mut rng);
            run_reduced(
                provider,
                &path,
                backtest_config.warmup,
                backtest_config.initial_balance,
            )
        })
        .collect();

    let (mean_return, std_return) = mean_and_stddev(&outcomes);
    let positive = outcomes.iter().filter(|&&r| r > 0.0).count();
    outcomes.sort_by(f64::total_cmp);

    let result = MonteCarloResult {
        simulations: outcomes.len(),
        seed,
        mean_return,
        std_return,
        var_95: percentile_sorted(&outcomes, 5.0),
        var_99: percentile_sorted(&outcomes, 1.0),
        max_return: outcomes.last().copied().unwrap_or(0.0),
        min_return: outcomes.first().copied().unwrap_or(0.0),
        positive_fraction: positive as f64 / outcomes.len() as f64,
        actual_return,
    };

    info!(
        strategy = provider.name(),
        simulations = result.simulations,
        seed,
        mean_return = result.mean_return,
        var_95 = result.var_95,
        "monte carlo complete"
    );

    Ok(result)
}

/// Build a synthetic bar sequence the same length as `bars`.
///
/// Prices compound from the first close using returns drawn with
/// replacement. Timestamps and volume come from the source bar at the same
/// offset.
pub fn synthesize_path(bars: &[Bar], returns: &[f64], rng: &mut impl Rng) -> Vec<Bar> {
    let Some(first) = bars.first() else {
        return Vec::new();
    };

    let mut path = Vec::with_capacity(bars.len());
    let mut price = first.close;
    path.push(Bar {
        timestamp: first.timestamp,
        open: price,
        high: price,
        low: price,
        close: price,
        volume: first.volume,
    });

    for source in &bars[1..] {
        let prev = price;
        if !returns.is_empty() {
            price *= 1.0 + returns[rng.gen_range(0..returns.len())];
        }
        path.push(Bar {
            timestamp: source.timestamp,
            open: prev,
            high: prev.max(price),
            low: prev.min(price),
            close: price,
            volume: source.volume,
        });
    }

    path
}

/// Long-only replay without costs, returning total return in percent.
///
/// Buy while flat enters at the close. Sell while long books
/// `(price - entry) / entry * balance * POSITION_FRACTION`. A position still
/// open at the end is left unrealized.
fn run_reduced(
    provider: &dyn SignalProvider,
    bars: &[Bar],
    warmup: usize,
    initial_balance: f64,
) -> f64 {
    let mut balance = initial_balance;
    let mut entry: Option<f64> = None;

    for i in warmup..bars.len() {
        let price = bars[i].close;
        match (evaluate_or_hold(provider, &bars[..=i]).kind, entry) {
            (SignalKind::Buy, None) => entry = Some(price),
            (SignalKind::Sell, Some(entry_price)) => {
                if entry_price > 0.0 {
                    balance += (price - entry_price) / entry_price * balance * POSITION_FRACTION;
                }
                entry = None;
            }
            _ => {}
        }
    }

    (balance - initial_balance) / initial_balance * 100.0
}

/// Percentile of a sorted slice using linear interpolation; `p` in 0..=100.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}
