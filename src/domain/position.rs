//! Open positions and the closed trades they turn into.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Long,
    Short,
}

/// The single open position of a simulation run.
///
/// Closing consumes the position, so a closed position cannot be reused.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub side: Side,
    pub size: f64,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub entry_fee: f64,
    pub entry_indicator: Option<f64>,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == Side::Long
    }

    pub fn is_short(&self) -> bool {
        self.side == Side::Short
    }

    pub fn notional(&self) -> f64 {
        self.size * self.entry_price
    }

    /// Value the position contributes to equity at `price`.
    ///
    /// Shorts use the linear `size * (2 * entry - price)` valuation.
    pub fn mark_to_market(&self, price: f64) -> f64 {
        match self.side {
            Side::Long => self.size * price,
            Side::Short => self.size * (2.0 * self.entry_price - price),
        }
    }

    /// Price pnl at `exit_price`, before fees.
    pub fn gross_pnl(&self, exit_price: f64) -> f64 {
        match self.side {
            Side::Long => (exit_price - self.entry_price) * self.size,
            Side::Short => (self.entry_price - exit_price) * self.size,
        }
    }

    /// Turn the position into a closed trade. `pnl` is net of the exit fee
    /// only; the entry fee was paid out of the balance on entry.
    pub fn close(self, exit_price: f64, exit_time: DateTime<Utc>, exit_fee: f64) -> Trade {
        let pnl = self.gross_pnl(exit_price) - exit_fee;
        let notional = self.notional();
        let return_pct = if notional > 0.0 {
            pnl / notional * 100.0
        } else {
            0.0
        };

        Trade {
            side: self.side,
            size: self.size,
            entry_price: self.entry_price,
            exit_price,
            entry_time: self.entry_time,
            exit_time,
            entry_fee: self.entry_fee,
            exit_fee,
            pnl,
            return_pct,
            entry_indicator: self.entry_indicator,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub side: Side,
    pub size: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_fee: f64,
    pub exit_fee: f64,
    pub pnl: f64,
    pub return_pct: f64,
    pub entry_indicator: Option<f64>,
}

impl Trade {
    pub fn holding_duration(&self) -> Duration {
        self.exit_time - self.entry_time
    }

    pub fn holding_hours(&self) -> f64 {
        self.holding_duration().num_seconds() as f64 / 3600.0
    }

    pub fn fees(&self) -> f64 {
        self.entry_fee + self.exit_fee
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
    }

    fn sample_long_position() -> Position {
        Position {
            side: Side::Long,
            size: 10.0,
            entry_price: 50.0,
            entry_time: t0(),
            entry_fee: 0.5,
            entry_indicator: Some(48.0),
        }
    }

    fn sample_short_position() -> Position {
        Position {
            side: Side::Short,
            size: 10.0,
            entry_price: 100.0,
            entry_time: t0(),
            entry_fee: 1.0,
            entry_indicator: None,
        }
    }

    #[test]
    fn side_predicates() {
        assert!(sample_long_position().is_long());
        assert!(!sample_long_position().is_short());
        assert!(sample_short_position().is_short());
    }

    #[test]
    fn mark_to_market_long() {
        let pos = sample_long_position();
        assert!((pos.mark_to_market(55.0) - 550.0).abs() < f64::EPSILON);
    }

    #[test]
    fn mark_to_market_short_linear() {
        let pos = sample_short_position();
        // 10 * (200 - 90)
        assert!((pos.mark_to_market(90.0) - 1100.0).abs() < f64::EPSILON);
        assert!((pos.mark_to_market(110.0) - 900.0).abs() < f64::EPSILON);
    }

    #[test]
    fn gross_pnl_both_sides() {
        assert!((sample_long_position().gross_pnl(55.0) - 50.0).abs() < f64::EPSILON);
        assert!((sample_long_position().gross_pnl(45.0) + 50.0).abs() < f64::EPSILON);
        assert!((sample_short_position().gross_pnl(90.0) - 100.0).abs() < f64::EPSILON);
        assert!((sample_short_position().gross_pnl(110.0) + 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn close_long_into_trade() {
        let exit_time = t0() + Duration::hours(6);
        let trade = sample_long_position().close(55.0, exit_time, 0.55);

        assert_eq!(trade.side, Side::Long);
        assert!((trade.pnl - 49.45).abs() < 1e-9);
        assert!((trade.return_pct - 49.45 / 500.0 * 100.0).abs() < 1e-9);
        assert!((trade.fees() - 1.05).abs() < 1e-9);
        assert_eq!(trade.entry_indicator, Some(48.0));
        assert_eq!(trade.holding_duration(), Duration::hours(6));
        assert!((trade.holding_hours() - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn close_short_into_trade() {
        let exit_time = t0() + Duration::minutes(90);
        let trade = sample_short_position().close(90.0, exit_time, 0.9);
        assert!((trade.pnl - 99.1).abs() < 1e-9);
        assert!((trade.holding_hours() - 1.5).abs() < f64::EPSILON);
    }
}
