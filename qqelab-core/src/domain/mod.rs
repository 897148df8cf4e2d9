//! Domain types for qqelab

pub mod bar;
pub mod fill;
pub mod order;
pub mod trade;

pub use bar::Bar;
pub use fill::Fill;
pub use order::{OrderRequest, OrderSide};
pub use trade::TradeRecord;
