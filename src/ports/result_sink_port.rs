//! Result sink port trait.

use crate::domain::error::BacktestError;
use crate::domain::metrics::PerformanceReport;
use crate::domain::position::Trade;

/// Destination for finished runs. Success or failure only; nothing is read
/// back.
pub trait ResultSink {
    fn store(
        &self,
        name: &str,
        report: &PerformanceReport,
        trades: &[Trade],
    ) -> Result<(), BacktestError>;
}
