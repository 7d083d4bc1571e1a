//! Fill simulation: slippage, sizing, fees and cash settlement.
//!
//! Opening a position only charges the entry fee to the balance; closing
//! credits the realized pnl together with the entry notional.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::portfolio::Portfolio;
use super::position::{Position, Side};

/// Fraction of the balance committed to a new position. The remainder is a
/// buffer for fees and slippage.
pub const POSITION_FRACTION: f64 = 0.95;

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub fee_rate: f64,
    pub slippage: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            fee_rate: 0.001,
            slippage: 0.001,
        }
    }
}

/// Fee charged on a fill: size * price * fee_rate.
pub fn calculate_fee(size: f64, price: f64, fee_rate: f64) -> f64 {
    size * price * fee_rate
}

/// Execution price when buying (long entry, short cover): price moves against us upward.
pub fn apply_slippage_buy(market_price: f64, slippage: f64) -> f64 {
    market_price * (1.0 + slippage)
}

/// Execution price when selling (long exit, short entry): price moves against us downward.
pub fn apply_slippage_sell(market_price: f64, slippage: f64) -> f64 {
    market_price * (1.0 - slippage)
}

fn entry_price(side: Side, market_price: f64, slippage: f64) -> f64 {
    match side {
        Side::Long => apply_slippage_buy(market_price, slippage),
        Side::Short => apply_slippage_sell(market_price, slippage),
    }
}

fn exit_price(side: Side, market_price: f64, slippage: f64) -> f64 {
    match side {
        Side::Long => apply_slippage_sell(market_price, slippage),
        Side::Short => apply_slippage_buy(market_price, slippage),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        size: f64,
        execution_price: f64,
        fee: f64,
    },
    InsufficientCapital,
}

/// Open a position on `side` at the bar's close.
///
/// 1. Apply slippage against the trader
/// 2. size = 0.95 * balance / execution price
/// 3. fee = size * execution price * fee_rate
/// 4. Deduct the fee from the balance
pub fn enter_position(
    portfolio: &mut Portfolio,
    side: Side,
    market_price: f64,
    time: DateTime<Utc>,
    indicator: Option<f64>,
    config: &ExecutionConfig,
) -> EntryResult {
    let execution_price = entry_price(side, market_price, config.slippage);
    if portfolio.balance <= 0.0 || !(execution_price > 0.0) {
        return EntryResult::InsufficientCapital;
    }

    let size = POSITION_FRACTION * portfolio.balance / execution_price;
    let fee = calculate_fee(size, execution_price, config.fee_rate);
    portfolio.balance -= fee;

    debug!(?side, size, price = execution_price, fee, %time, "opened position");

    portfolio.open_position(Position {
        side,
        size,
        entry_price: execution_price,
        entry_time: time,
        entry_fee: fee,
        entry_indicator: indicator,
    });

    EntryResult::Entered {
        size,
        execution_price,
        fee,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitResult {
    pub side: Side,
    pub exit_price: f64,
    pub exit_fee: f64,
    pub pnl: f64,
}

/// Close the open position at the bar's close and append the trade to the
/// ledger. Returns `None` when flat.
pub fn exit_position(
    portfolio: &mut Portfolio,
    market_price: f64,
    time: DateTime<Utc>,
    config: &ExecutionConfig,
) -> Option<ExitResult> {
    let position = portfolio.take_position()?;
    let side = position.side;
    let price = exit_price(side, market_price, config.slippage);
    let exit_fee = calculate_fee(position.size, price, config.fee_rate);
    let notional = position.notional();

    let trade = position.close(price, time, exit_fee);
    let pnl = trade.pnl;
    portfolio.balance += pnl + notional;

    debug!(?side, price, fee = exit_fee, pnl, %time, "closed position");
    portfolio.record_trade(trade);

    Some(ExitResult {
        side,
        exit_price: price,
        exit_fee,
        pnl,
    })
}

/// Settle a position still open when the series ends.
///
/// Slippage applies but no exit fee, and the result is folded into the
/// balance without being added to the trade ledger.
pub fn force_close(
    portfolio: &mut Portfolio,
    market_price: f64,
    config: &ExecutionConfig,
) -> Option<f64> {
    let position = portfolio.take_position()?;
    let price = exit_price(position.side, market_price, config.slippage);
    let pnl = position.gross_pnl(price);
    portfolio.balance += pnl + position.notional();

    debug!(side = ?position.side, price, pnl, "force-closed position at series end");
    Some(pnl)
}
