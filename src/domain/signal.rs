//! Trading signals and the provider seam that produces them.

use super::error::BacktestError;
use super::ohlcv::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub kind: SignalKind,
    pub indicator: Option<f64>,
}

impl Signal {
    pub fn new(kind: SignalKind, indicator: Option<f64>) -> Self {
        Signal { kind, indicator }
    }

    pub fn hold() -> Self {
        Signal {
            kind: SignalKind::Hold,
            indicator: None,
        }
    }
}

/// Maps a price-history prefix to a signal.
///
/// `history` always ends at the bar being decided on; implementations must
/// not assume access to anything later. Evaluation must be pure so a single
/// provider can be shared across parallel simulations.
pub trait SignalProvider: Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, history: &[Bar]) -> Result<Signal, BacktestError>;
}
