//! Market data port trait.

use crate::domain::error::BacktestError;
use crate::domain::ohlcv::PriceSeries;

/// Source of historical bars.
///
/// Implementations return bars in ascending time order and fail with
/// [`BacktestError::DataUnavailable`] when the fetch fails or yields fewer
/// than [`MIN_FETCH_BARS`] bars.
pub trait MarketDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<PriceSeries, BacktestError>;
}

pub const MIN_FETCH_BARS: usize = 100;
