//! Order requests handed to an order router.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// A market order request.
///
/// `size: None` on a sell means "close the whole position"; live relays
/// resolve the quantity on the exchange side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub side: OrderSide,
    pub symbol: String,
    pub size: Option<f64>,
    /// Reference price (the bar close the decision was made on).
    pub price: Option<f64>,
    /// Relay routing: exchange name (e.g. "binance", "mimic").
    pub exchange: String,
    /// Relay routing: account or subaccount name.
    pub account: String,
    /// Relay routing: market in `BASE/QUOTE` form.
    pub asset: String,
}

impl OrderRequest {
    pub fn is_close_all(&self) -> bool {
        self.side == OrderSide::Sell && self.size.is_none()
    }
}
