//! Per-run account state and equity tracking.

use chrono::{DateTime, Utc};

use super::position::{Position, Trade};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub time: DateTime<Utc>,
    pub equity: f64,
}

/// Mutable state of one simulation run: balance, the open position (at most
/// one), the trade ledger and the equity curve. Never shared between runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub balance: f64,
    pub initial_balance: f64,
    pub position: Option<Position>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_balance: f64) -> Self {
        Portfolio {
            balance: initial_balance,
            initial_balance,
            position: None,
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    pub fn open_position(&mut self, position: Position) {
        debug_assert!(self.position.is_none(), "pyramiding is not supported");
        self.position = Some(position);
    }

    pub fn take_position(&mut self) -> Option<Position> {
        self.position.take()
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn record_equity(&mut self, time: DateTime<Utc>, equity: f64) {
        self.equity_curve.push(EquityPoint { time, equity });
    }

    /// Balance plus the mark-to-market value of the open position.
    pub fn total_equity(&self, price: f64) -> f64 {
        self.balance
            + self
                .position
                .as_ref()
                .map_or(0.0, |pos| pos.mark_to_market(price))
    }
}
