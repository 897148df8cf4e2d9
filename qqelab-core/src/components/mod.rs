//! Component traits shared by the backtest and live paths.
//!
//! - Indicator: bar history in, numeric series out
//! - Order router: where the strategy driver sends its buy and close orders

pub mod indicator;
pub mod router;

pub use indicator::{Indicator, IndicatorValues, Source};
pub use router::{AccountSnapshot, OrderAck, OrderError, OrderRouter};
