//! Strategy definitions and their signal logic.

use super::error::BacktestError;
use super::indicator::{calculate_rsi, calculate_sma};
use super::ohlcv::Bar;
use super::signal::{Signal, SignalKind, SignalProvider};

#[derive(Debug, Clone, PartialEq)]
pub enum StrategyKind {
    SmaCrossover {
        short_period: usize,
        long_period: usize,
    },
    Rsi {
        period: usize,
        oversold: f64,
        overbought: f64,
    },
}

impl StrategyKind {
    pub fn sma_crossover() -> Self {
        StrategyKind::SmaCrossover {
            short_period: 10,
            long_period: 50,
        }
    }

    pub fn rsi() -> Self {
        StrategyKind::Rsi {
            period: 14,
            oversold: 30.0,
            overbought: 70.0,
        }
    }

    /// Config identifier, as accepted by `[strategy] kind`.
    pub fn id(&self) -> &'static str {
        match self {
            StrategyKind::SmaCrossover { .. } => "sma_crossover",
            StrategyKind::Rsi { .. } => "rsi",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub name: String,
    pub kind: StrategyKind,
}

impl Strategy {
    pub fn new(name: impl Into<String>, kind: StrategyKind) -> Self {
        Strategy {
            name: name.into(),
            kind,
        }
    }

    pub fn validate(&self) -> Result<(), BacktestError> {
        match self.kind {
            StrategyKind::SmaCrossover {
                short_period,
                long_period,
            } => {
                if short_period == 0 {
                    return Err(BacktestError::invalid(
                        "strategy",
                        "short_period",
                        "short_period must be at least 1",
                    ));
                }
                if short_period >= long_period {
                    return Err(BacktestError::invalid(
                        "strategy",
                        "short_period",
                        format!(
                            "short_period ({short_period}) must be less than long_period ({long_period})"
                        ),
                    ));
                }
            }
            StrategyKind::Rsi {
                period,
                oversold,
                overbought,
            } => {
                if period == 0 {
                    return Err(BacktestError::invalid(
                        "strategy",
                        "rsi_period",
                        "rsi_period must be at least 1",
                    ));
                }
                if !(0.0 < oversold && oversold < overbought && overbought < 100.0) {
                    return Err(BacktestError::invalid(
                        "strategy",
                        "oversold",
                        "thresholds must satisfy 0 < oversold < overbought < 100",
                    ));
                }
            }
        }
        Ok(())
    }

    fn evaluation_error(&self, reason: impl Into<String>) -> BacktestError {
        BacktestError::StrategyEvaluation {
            strategy: self.name.clone(),
            reason: reason.into(),
        }
    }
}

impl SignalProvider for Strategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, history: &[Bar]) -> Result<Signal, BacktestError> {
        if let Some(bar) = history.iter().find(|b| !b.close.is_finite()) {
            return Err(self.evaluation_error(format!(
                "non-finite close at {}",
                bar.timestamp
            )));
        }

        match self.kind {
            StrategyKind::SmaCrossover {
                short_period,
                long_period,
            } => Ok(sma_crossover_signal(history, short_period, long_period)),
            StrategyKind::Rsi {
                period,
                oversold,
                overbought,
            } => Ok(rsi_signal(history, period, oversold, overbought)),
        }
    }
}

fn sma_crossover_signal(history: &[Bar], short_period: usize, long_period: usize) -> Signal {
    let needed = long_period + 1;
    if short_period == 0 || history.len() < needed {
        return Signal::hold();
    }

    // Only the last two values of each average matter.
    let closes: Vec<f64> = history[history.len() - needed..]
        .iter()
        .map(|b| b.close)
        .collect();
    let short = calculate_sma(&closes, short_period);
    let long = calculate_sma(&closes, long_period);

    let n = closes.len();
    let (Some(prev_short), Some(curr_short), Some(prev_long), Some(curr_long)) =
        (short[n - 2], short[n - 1], long[n - 2], long[n - 1])
    else {
        return Signal::hold();
    };

    let kind = if prev_short < prev_long && curr_short > curr_long {
        SignalKind::Buy
    } else if prev_short > prev_long && curr_short < curr_long {
        SignalKind::Sell
    } else {
        SignalKind::Hold
    };

    Signal::new(kind, Some(curr_short))
}

fn rsi_signal(history: &[Bar], period: usize, oversold: f64, overbought: f64) -> Signal {
    let closes: Vec<f64> = history.iter().map(|b| b.close).collect();
    let Some(rsi) = calculate_rsi(&closes, period).last().copied().flatten() else {
        return Signal::hold();
    };

    let kind = if rsi > overbought {
        SignalKind::Sell
    } else if rsi < oversold {
        SignalKind::Buy
    } else {
        SignalKind::Hold
    };

    Signal::new(kind, Some(rsi))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bars(closes: &[f64]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: start + Duration::hours(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect()
    }

    fn sma(short_period: usize, long_period: usize) -> Strategy {
        Strategy::new(
            "SMA",
            StrategyKind::SmaCrossover {
                short_period,
                long_period,
            },
        )
    }

    #[test]
    fn validate_rejects_short_not_below_long() {
        let err = sma(50, 50).validate().unwrap_err();
        assert!(
            matches!(err, BacktestError::ConfigInvalid { ref key, .. } if key == "short_period")
        );
        assert!(sma(60, 50).validate().is_err());
        assert!(sma(10, 50).validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_periods() {
        assert!(sma(0, 5).validate().is_err());
        let rsi = Strategy::new(
            "RSI",
            StrategyKind::Rsi {
                period: 0,
                oversold: 30.0,
                overbought: 70.0,
            },
        );
        assert!(rsi.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_rsi_thresholds() {
        let rsi = Strategy::new(
            "RSI",
            StrategyKind::Rsi {
                period: 14,
                oversold: 70.0,
                overbought: 30.0,
            },
        );
        assert!(rsi.validate().is_err());
        assert!(Strategy::new("RSI", StrategyKind::rsi()).validate().is_ok());
    }

    #[test]
    fn sma_holds_without_enough_history() {
        let history = bars(&[100.0; 5]);
        let signal = sma(2, 5).evaluate(&history).unwrap();
        assert_eq!(signal, Signal::hold());
    }

    #[test]
    fn sma_golden_cross_buys() {
        // short SMA(2) dips under SMA(4) then crosses above on the last bar
        let history = bars(&[10.0, 10.0, 10.0, 9.0, 8.0, 12.0]);
        let signal = sma(2, 4).evaluate(&history).unwrap();
        assert_eq!(signal.kind, SignalKind::Buy);
        assert!((signal.indicator.unwrap() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn sma_death_cross_sells() {
        let history = bars(&[10.0, 10.0, 10.0, 11.0, 12.0, 8.0]);
        let signal = sma(2, 4).evaluate(&history).unwrap();
        assert_eq!(signal.kind, SignalKind::Sell);
    }

    #[test]
    fn sma_flat_prices_hold() {
        let history = bars(&[100.0; 60]);
        let signal = Strategy::new("SMA", StrategyKind::sma_crossover())
            .evaluate(&history)
            .unwrap();
        assert_eq!(signal.kind, SignalKind::Hold);
        assert_eq!(signal.indicator, Some(100.0));
    }

    #[test]
    fn rsi_oversold_buys_and_overbought_sells() {
        let strategy = Strategy::new("RSI", StrategyKind::rsi());

        let falling: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        assert_eq!(strategy.evaluate(&bars(&falling)).unwrap().kind, SignalKind::Buy);

        let rising: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let signal = strategy.evaluate(&bars(&rising)).unwrap();
        assert_eq!(signal.kind, SignalKind::Sell);
        assert_eq!(signal.indicator, Some(100.0));
    }

    #[test]
    fn rsi_flat_prices_hold() {
        let strategy = Strategy::new("RSI", StrategyKind::rsi());
        let signal = strategy.evaluate(&bars(&[100.0; 30])).unwrap();
        assert_eq!(signal, Signal::hold());
    }

    #[test]
    fn non_finite_close_is_an_evaluation_error() {
        let mut history = bars(&[100.0; 60]);
        history[30].close = f64::NAN;
        let err = sma(10, 50).evaluate(&history).unwrap_err();
        assert!(matches!(err, BacktestError::StrategyEvaluation { ref strategy, .. } if strategy == "SMA"));
    }

    #[test]
    fn kind_ids() {
        assert_eq!(StrategyKind::sma_crossover().id(), "sma_crossover");
        assert_eq!(StrategyKind::rsi().id(), "rsi");
    }
}
