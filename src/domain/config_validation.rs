//! Configuration validation.
//!
//! Validates every section a command reads before any data is fetched or
//! simulated. Keys absent from the file fall back to the same defaults the
//! CLI builders use, so a passing check means the builders will succeed.

use chrono::{DateTime, Utc};

use crate::domain::error::BacktestError;
use crate::ports::config_port::ConfigPort;

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    match config.get_string("data", "symbol") {
        Some(s) if !s.trim().is_empty() => {}
        _ => {
            return Err(BacktestError::ConfigMissing {
                section: "data".to_string(),
                key: "symbol".to_string(),
            })
        }
    }
    if let Some(interval) = config.get_string("data", "interval") {
        if interval.trim().is_empty() {
            return Err(BacktestError::invalid(
                "data",
                "interval",
                "interval must not be empty",
            ));
        }
    }
    if config.get_int("data", "limit", 1000) < 1 {
        return Err(BacktestError::invalid(
            "data",
            "limit",
            "limit must be at least 1",
        ));
    }
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let balance = config.get_double("backtest", "initial_balance", 10_000.0);
    if balance <= 0.0 {
        return Err(BacktestError::invalid(
            "backtest",
            "initial_balance",
            "initial_balance must be positive",
        ));
    }
    for key in ["fee_rate", "slippage"] {
        let value = config.get_double("backtest", key, 0.001);
        if !(0.0..1.0).contains(&value) {
            return Err(BacktestError::invalid(
                "backtest",
                key,
                format!("{key} must be in [0, 1)"),
            ));
        }
    }
    if config.get_int("backtest", "warmup", 50) < 0 {
        return Err(BacktestError::invalid(
            "backtest",
            "warmup",
            "warmup must be non-negative",
        ));
    }
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let kind = config
        .get_string("strategy", "kind")
        .ok_or_else(|| BacktestError::ConfigMissing {
            section: "strategy".to_string(),
            key: "kind".to_string(),
        })?;

    match kind.trim() {
        "sma_crossover" => {
            let short = config.get_int("strategy", "short_period", 10);
            let long = config.get_int("strategy", "long_period", 50);
            if short < 1 {
                return Err(BacktestError::invalid(
                    "strategy",
                    "short_period",
                    "short_period must be at least 1",
                ));
            }
            if short >= long {
                return Err(BacktestError::invalid(
                    "strategy",
                    "short_period",
                    format!("short_period ({short}) must be less than long_period ({long})"),
                ));
            }
        }
        "rsi" => {
            if config.get_int("strategy", "rsi_period", 14) < 1 {
                return Err(BacktestError::invalid(
                    "strategy",
                    "rsi_period",
                    "rsi_period must be at least 1",
                ));
            }
            let oversold = config.get_double("strategy", "oversold", 30.0);
            let overbought = config.get_double("strategy", "overbought", 70.0);
            if !(0.0 < oversold && oversold < overbought && overbought < 100.0) {
                return Err(BacktestError::invalid(
                    "strategy",
                    "oversold",
                    "thresholds must satisfy 0 < oversold < overbought < 100",
                ));
            }
        }
        other => {
            return Err(BacktestError::invalid(
                "strategy",
                "kind",
                format!("unknown strategy kind '{other}' (expected sma_crossover or rsi)"),
            ))
        }
    }
    Ok(())
}

pub fn validate_walk_forward_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    for (key, default) in [("train_days", 90), ("test_days", 30)] {
        if config.get_int("walk_forward", key, default) < 1 {
            return Err(BacktestError::invalid(
                "walk_forward",
                key,
                format!("{key} must be at least 1"),
            ));
        }
    }
    if config.get_int("walk_forward", "periods", 4) < 1 {
        return Err(BacktestError::invalid(
            "walk_forward",
            "periods",
            "periods must be at least 1",
        ));
    }
    parse_anchor(config)?;
    Ok(())
}

pub fn validate_monte_carlo_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    if config.get_int("monte_carlo", "simulations", 1000) < 1 {
        return Err(BacktestError::invalid(
            "monte_carlo",
            "simulations",
            "simulations must be at least 1",
        ));
    }
    parse_seed(config)?;
    Ok(())
}

/// `[walk_forward] anchor` as RFC 3339; absent means "use the last bar".
pub fn parse_anchor(config: &dyn ConfigPort) -> Result<Option<DateTime<Utc>>, BacktestError> {
    config
        .get_string("walk_forward", "anchor")
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            DateTime::parse_from_rfc3339(s.trim())
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    BacktestError::invalid(
                        "walk_forward",
                        "anchor",
                        format!("invalid anchor '{s}', expected RFC 3339 ({e})"),
                    )
                })
        })
        .transpose()
}

/// `[monte_carlo] seed` as an unsigned integer; absent means unseeded.
pub fn parse_seed(config: &dyn ConfigPort) -> Result<Option<u64>, BacktestError> {
    config
        .get_string("monte_carlo", "seed")
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.trim().parse::<u64>().map_err(|_| {
                BacktestError::invalid(
                    "monte_carlo",
                    "seed",
                    format!("seed must be a non-negative integer, got '{s}'"),
                )
            })
        })
        .transpose()
}
