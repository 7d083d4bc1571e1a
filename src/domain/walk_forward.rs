//! Walk-forward evaluation.
//!
//! Windows are laid out backward from a fixed anchor, most recent first:
//!
//! ```text
//! train_start      train_end = test_start      test_end = anchor - k * test_len
//!     |---------------------|---------------------|
//! ```
//!
//! Every period is an independent simulation over its own slice of the
//! series. Nothing learned in one period carries into another.

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use tracing::info;

use super::backtest::{run_backtest, BacktestConfig};
use super::error::BacktestError;
use super::metrics::PerformanceReport;
use super::ohlcv::PriceSeries;
use super::signal::SignalProvider;

#[derive(Debug, Clone, PartialEq)]
pub struct WalkForwardConfig {
    pub anchor: DateTime<Utc>,
    pub train_len: Duration,
    pub test_len: Duration,
    pub periods: usize,
}

impl WalkForwardConfig {
    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.periods == 0 {
            return Err(BacktestError::invalid(
                "walk_forward",
                "periods",
                "periods must be at least 1",
            ));
        }
        if self.train_len <= Duration::zero() {
            return Err(BacktestError::invalid(
                "walk_forward",
                "train_days",
                "train window must be positive",
            ));
        }
        if self.test_len <= Duration::zero() {
            return Err(BacktestError::invalid(
                "walk_forward",
                "test_days",
                "test window must be positive",
            ));
        }
        Ok(())
    }
}

/// Date ranges of one period. Both ranges are half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkForwardWindow {
    /// 1 is the most recent period.
    pub period: usize,
    pub train_start: DateTime<Utc>,
    pub train_end: DateTime<Utc>,
    pub test_start: DateTime<Utc>,
    pub test_end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodResult {
    pub window: WalkForwardWindow,
    pub train_report: PerformanceReport,
    pub test_report: PerformanceReport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalkForwardSummary {
    pub periods: Vec<PeriodResult>,
    pub mean_test_return_pct: f64,
    pub mean_test_sharpe: f64,
    pub mean_train_return_pct: f64,
    pub mean_train_sharpe: f64,
    /// Fraction of periods whose test window returned more than zero.
    pub consistency_score: f64,
}

/// Lay out `config.periods` windows backward from the anchor.
///
/// Fails with a configuration error when a window would reach outside the
/// representable date range.
pub fn generate_windows(
    config: &WalkForwardConfig,
) -> Result<Vec<WalkForwardWindow>, BacktestError> {
    if config.periods == 0 {
        return Ok(Vec::new());
    }
    // the oldest window is the first to overflow
    window_for(config, config.periods - 1)?;
    (0..config.periods).map(|k| window_for(config, k)).collect()
}

fn window_for(config: &WalkForwardConfig, k: usize) -> Result<WalkForwardWindow, BacktestError> {
    let out_of_range = || {
        BacktestError::invalid(
            "walk_forward",
            "periods",
            format!("period {} falls outside the supported date range", k + 1),
        )
    };

    let offset = i32::try_from(k)
        .ok()
        .and_then(|k| config.test_len.checked_mul(k))
        .ok_or_else(out_of_range)?;
    let test_end = config
        .anchor
        .checked_sub_signed(offset)
        .ok_or_else(out_of_range)?;
    let test_start = test_end
        .checked_sub_signed(config.test_len)
        .ok_or_else(out_of_range)?;
    let train_start = test_start
        .checked_sub_signed(config.train_len)
        .ok_or_else(out_of_range)?;

    Ok(WalkForwardWindow {
        period: k + 1,
        train_start,
        train_end: test_start,
        test_start,
        test_end,
    })
}

/// Run every period on the rayon pool and aggregate.
///
/// Any period failing (typically a window with too few bars) fails the
/// whole evaluation, wrapped with the period number.
pub fn evaluate(
    provider: &dyn SignalProvider,
    series: &PriceSeries,
    backtest_config: &BacktestConfig,
    config: &WalkForwardConfig,
) -> Result<WalkForwardSummary, BacktestError> {
    config.validate()?;
    backtest_config.validate()?;

    let windows = generate_windows(config)?;
    let periods = windows
        .par_iter()
        .map(|window| {
            run_period(provider, series, backtest_config, window).map_err(|e| {
                BacktestError::WalkForwardPeriod {
                    period: window.period,
                    source: Box::new(e),
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let summary = summarize(periods);
    info!(
        strategy = provider.name(),
        periods = summary.periods.len(),
        mean_test_return_pct = summary.mean_test_return_pct,
        consistency = summary.consistency_score,
        "walk-forward complete"
    );
    Ok(summary)
}

fn run_period(
    provider: &dyn SignalProvider,
    series: &PriceSeries,
    backtest_config: &BacktestConfig,
    window: &WalkForwardWindow,
) -> Result<PeriodResult, BacktestError> {
    let train = series.slice(window.train_start, window.train_end);
    let test = series.slice(window.test_start, window.test_end);

    let train_result = run_backtest(&train, provider, backtest_config)?;
    let test_result = run_backtest(&test, provider, backtest_config)?;

    Ok(PeriodResult {
        window: *window,
        train_report: PerformanceReport::compute(&train_result),
        test_report: PerformanceReport::compute(&test_result),
    })
}

fn summarize(periods: Vec<PeriodResult>) -> WalkForwardSummary {
    let n = periods.len();
    if n == 0 {
        return WalkForwardSummary {
            periods,
            mean_test_return_pct: 0.0,
            mean_test_sharpe: 0.0,
            mean_train_return_pct: 0.0,
            mean_train_sharpe: 0.0,
            consistency_score: 0.0,
        };
    }

    let mean = |f: fn(&PeriodResult) -> f64| periods.iter().map(f).sum::<f64>() / n as f64;
    let mean_test_return_pct = mean(|p| p.test_report.total_return_pct);
    let mean_test_sharpe = mean(|p| p.test_report.sharpe_ratio);
    let mean_train_return_pct = mean(|p| p.train_report.total_return_pct);
    let mean_train_sharpe = mean(|p| p.train_report.sharpe_ratio);
    let positive = periods
        .iter()
        .filter(|p| p.test_report.total_return_pct > 0.0)
        .count();

    WalkForwardSummary {
        mean_test_return_pct,
        mean_test_sharpe,
        mean_train_return_pct,
        mean_train_sharpe,
        consistency_score: positive as f64 / n as f64,
        periods,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorKind;
    use crate::domain::ohlcv::Bar;
    use crate::domain::signal::{Signal, SignalKind};
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn hourly_series(closes: impl Iterator<Item = f64>) -> PriceSeries {
        let bars = closes
            .enumerate()
            .map(|(i, close)| Bar {
                timestamp: start() + Duration::hours(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect();
        PriceSeries::new("TEST", bars).unwrap()
    }

    /// Buys on the first bar it sees and never sells.
    struct AlwaysBuy;

    impl SignalProvider for AlwaysBuy {
        fn name(&self) -> &str {
            "always-buy"
        }

        fn evaluate(&self, _history: &[Bar]) -> Result<Signal, BacktestError> {
            Ok(Signal::new(SignalKind::Buy, None))
        }
    }

    /// Sells on the first bar it sees and never covers.
    struct AlwaysSell;

    impl SignalProvider for AlwaysSell {
        fn name(&self) -> &str {
            "always-sell"
        }

        fn evaluate(&self, _history: &[Bar]) -> Result<Signal, BacktestError> {
            Ok(Signal::new(SignalKind::Sell, None))
        }
    }

    fn no_costs() -> BacktestConfig {
        BacktestConfig {
            fee_rate: 0.0,
            slippage: 0.0,
            ..Default::default()
        }
    }

    fn config(anchor: DateTime<Utc>, periods: usize) -> WalkForwardConfig {
        WalkForwardConfig {
            anchor,
            train_len: Duration::hours(200),
            test_len: Duration::hours(200),
            periods,
        }
    }

    #[test]
    fn windows_walk_backward_from_anchor() {
        let anchor = start() + Duration::days(30);
        let cfg = WalkForwardConfig {
            anchor,
            train_len: Duration::days(10),
            test_len: Duration::days(5),
            periods: 3,
        };
        let windows = generate_windows(&cfg).unwrap();
        assert_eq!(windows.len(), 3);

        assert_eq!(windows[0].period, 1);
        assert_eq!(windows[0].test_end, anchor);
        assert_eq!(windows[0].test_start, anchor - Duration::days(5));
        assert_eq!(windows[0].train_end, windows[0].test_start);
        assert_eq!(windows[0].train_start, anchor - Duration::days(15));

        assert_eq!(windows[2].test_end, anchor - Duration::days(10));
        assert_eq!(windows[2].train_start, anchor - Duration::days(25));

        // test windows never overlap
        for pair in windows.windows(2) {
            assert_eq!(pair[1].test_end, pair[0].test_start);
        }
    }

    #[test]
    fn windows_beyond_date_range_are_a_config_error() {
        let series = hourly_series((0..800).map(|i| 100.0 + i as f64));
        let huge = WalkForwardConfig {
            anchor: series.last().unwrap().timestamp,
            train_len: Duration::days(90),
            test_len: Duration::try_days(100_000_000).unwrap(),
            periods: 1,
        };
        assert!(huge.validate().is_ok());
        let err = evaluate(&AlwaysBuy, &series, &no_costs(), &huge).unwrap_err();
        assert!(
            matches!(err, BacktestError::ConfigInvalid { ref key, .. } if key == "periods")
        );

        let many = WalkForwardConfig {
            periods: usize::MAX,
            ..config(series.last().unwrap().timestamp, 1)
        };
        let err = generate_windows(&many).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn validation_rejects_degenerate_config() {
        let mut cfg = config(start(), 0);
        assert!(cfg.validate().is_err());
        cfg.periods = 2;
        assert!(cfg.validate().is_ok());
        cfg.test_len = Duration::zero();
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn rising_market_is_fully_consistent() {
        let series = hourly_series((0..800).map(|i| 100.0 + i as f64));
        let anchor = series.last().unwrap().timestamp + Duration::hours(1);
        let summary = evaluate(&AlwaysBuy, &series, &no_costs(), &config(anchor, 3)).unwrap();

        assert_eq!(summary.periods.len(), 3);
        assert_eq!(summary.periods[0].window.period, 1);
        assert!((summary.consistency_score - 1.0).abs() < f64::EPSILON);
        assert!(summary.mean_test_return_pct > 0.0);
        assert!(summary.mean_train_return_pct > 0.0);
    }

    #[test]
    fn short_into_steep_rally_has_zero_consistency() {
        // price more than doubles inside each test window, so the short's
        // size * (2 * entry - exit) settlement ends below the initial balance
        let series = hourly_series((0..800).map(|i| 100.0 * 1.01f64.powi(i)));
        let anchor = series.last().unwrap().timestamp + Duration::hours(1);
        let summary = evaluate(&AlwaysSell, &series, &no_costs(), &config(anchor, 3)).unwrap();
        assert_eq!(summary.consistency_score, 0.0);
        assert!(summary.mean_test_return_pct < 0.0);
    }

    #[test]
    fn short_window_fails_with_period_number() {
        let series = hourly_series((0..800).map(|i| 100.0 + i as f64));
        let anchor = series.last().unwrap().timestamp + Duration::hours(1);
        // the fourth period's training window runs off the front of the series
        let err = evaluate(&AlwaysBuy, &series, &no_costs(), &config(anchor, 4)).unwrap_err();
        assert!(matches!(err, BacktestError::WalkForwardPeriod { period: 4, .. }));
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
    }

    #[test]
    fn summary_of_nothing_is_zero() {
        let summary = summarize(Vec::new());
        assert_eq!(summary.consistency_score, 0.0);
        assert_eq!(summary.mean_test_return_pct, 0.0);
    }
}
