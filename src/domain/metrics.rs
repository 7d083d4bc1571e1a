//! Performance metrics and statistics.
//!
//! A report is a pure function of a finished run. When the ledger is empty
//! every derived rate and ratio is exactly 0; only the balances and total
//! return are reported.

use chrono::{DateTime, Utc};

use super::backtest::BacktestResult;
use super::portfolio::EquityPoint;
use super::position::Trade;

pub const PERIODS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PerformanceReport {
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_return: f64,
    pub total_return_pct: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: f64,
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub volatility: f64,
    pub annualized_return: f64,
    pub calmar_ratio: f64,
    pub avg_trade_pnl: f64,
    pub avg_trade_return_pct: f64,
    pub avg_hold_time_hours: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub total_fees: f64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl PerformanceReport {
    pub fn compute(result: &BacktestResult) -> Self {
        let initial_balance = result.initial_balance;
        let final_balance = result.final_balance;
        let total_return = final_balance - initial_balance;
        let total_return_pct = if initial_balance > 0.0 {
            total_return / initial_balance * 100.0
        } else {
            0.0
        };

        let base = PerformanceReport {
            initial_balance,
            final_balance,
            total_return,
            total_return_pct,
            start_time: result.equity_curve.first().map(|p| p.time),
            end_time: result.equity_curve.last().map(|p| p.time),
            ..Default::default()
        };

        let trades = &result.trades;
        if trades.is_empty() {
            return base;
        }

        let n = trades.len() as f64;
        let mut winning_trades = 0usize;
        let mut losing_trades = 0usize;
        let mut gross_profit = 0.0_f64;
        let mut loss_sum = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;

        for trade in trades {
            let pnl = trade.pnl;
            if pnl > 0.0 {
                winning_trades += 1;
                gross_profit += pnl;
                largest_win = largest_win.max(pnl);
            } else {
                losing_trades += 1;
                loss_sum += pnl;
                largest_loss = largest_loss.max(pnl.abs());
            }
        }

        // No losing trades: floor of 1 keeps the ratio finite.
        let gross_loss = if losing_trades > 0 { loss_sum.abs() } else { 1.0 };
        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_pct) = compute_drawdown(&result.equity_curve);
        let returns = equity_returns(&result.equity_curve);
        let (sharpe_ratio, volatility) = compute_risk_adjusted(&returns);
        let annualized_return = compute_annualized_return(&result.equity_curve);
        let calmar_ratio = if max_drawdown_pct > 0.0 {
            annualized_return / (max_drawdown_pct / 100.0)
        } else {
            0.0
        };

        PerformanceReport {
            total_trades: trades.len(),
            winning_trades,
            losing_trades,
            win_rate: winning_trades as f64 / n,
            gross_profit,
            gross_loss,
            profit_factor,
            max_drawdown,
            max_drawdown_pct,
            sharpe_ratio,
            volatility,
            annualized_return,
            calmar_ratio,
            avg_trade_pnl: trades.iter().map(|t| t.pnl).sum::<f64>() / n,
            avg_trade_return_pct: trades.iter().map(|t| t.return_pct).sum::<f64>() / n,
            avg_hold_time_hours: trades.iter().map(Trade::holding_hours).sum::<f64>() / n,
            largest_win,
            largest_loss,
            total_fees: trades.iter().map(Trade::fees).sum(),
            ..base
        }
    }

    /// Sharpe ratio times total return %, used to rank competing runs.
    pub fn ranking_score(&self) -> f64 {
        self.sharpe_ratio * self.total_return_pct
    }
}

/// Sort named reports best first by [`PerformanceReport::ranking_score`].
/// Ties keep their input order.
pub fn rank_reports<T>(reports: &mut [(T, PerformanceReport)]) {
    reports.sort_by(|a, b| b.1.ranking_score().total_cmp(&a.1.ranking_score()));
}

/// Largest decline from the running peak, as (absolute, percent of peak).
fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, f64) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0.0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_dd_pct = 0.0_f64;

    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        }
        let dd = peak - point.equity;
        let dd_pct = if peak > 0.0 { dd / peak * 100.0 } else { 0.0 };
        max_dd = max_dd.max(dd);
        max_dd_pct = max_dd_pct.max(dd_pct);
    }

    (max_dd, max_dd_pct)
}

/// Per-bar simple returns of the equity curve.
pub fn equity_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 {
                (w[1].equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect()
}

/// Population mean and standard deviation.
pub fn mean_and_stddev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Annualized (Sharpe, volatility); Sharpe is 0 when returns do not vary.
fn compute_risk_adjusted(returns: &[f64]) -> (f64, f64) {
    let (mean, stddev) = mean_and_stddev(returns);
    let annualizer = PERIODS_PER_YEAR.sqrt();
    let sharpe = if stddev > 0.0 {
        mean / stddev * annualizer
    } else {
        0.0
    };
    (sharpe, stddev * annualizer)
}

fn compute_annualized_return(equity_curve: &[EquityPoint]) -> f64 {
    let (Some(first), Some(last)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    if first.equity <= 0.0 {
        return 0.0;
    }
    let periods = equity_curve.len() as f64;
    let annualized = (last.equity / first.equity).powf(PERIODS_PER_YEAR / periods) - 1.0;
    if annualized.is_finite() { annualized } else { 0.0 }
}
