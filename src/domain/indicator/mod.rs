//! Technical indicators computed over close prices.
//!
//! Each calculator returns one entry per input price; `None` marks points
//! still inside the indicator's warm-up or where the value is undefined.

pub mod rsi;
pub mod sma;

pub use rsi::calculate_rsi;
pub use sma::calculate_sma;
