//! Simulated broker for backtests.
//!
//! Market orders fill synchronously at the decision bar's close. The broker
//! tracks cash and one net long position; a close-all sell liquidates it.

use qqelab_core::{AccountSnapshot, Bar, Fill, OrderAck, OrderError, OrderRequest, OrderRouter, OrderSide};
use tracing::trace;

const CASH_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct SimulatedBroker {
    cash: f64,
    quantity: f64,
    /// Commission as a percent of notional (0.1 = 0.1%).
    commission_pct: f64,
    fills: Vec<Fill>,
}

impl SimulatedBroker {
    pub fn new(initial_cash: f64, commission_pct: f64) -> Self {
        Self {
            cash: initial_cash,
            quantity: 0.0,
            commission_pct,
            fills: Vec::new(),
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    /// Cash plus the position marked at `price`.
    pub fn equity(&self, price: f64) -> f64 {
        self.cash + self.quantity * price
    }

    fn commission(&self, notional: f64) -> f64 {
        notional * self.commission_pct / 100.0
    }
}

impl OrderRouter for SimulatedBroker {
    fn submit(
        &mut self,
        request: &OrderRequest,
        bar_index: usize,
        bar: &Bar,
    ) -> Result<OrderAck, OrderError> {
        let price = bar.close;
        let (side, quantity) = match request.side {
            OrderSide::Buy => {
                let quantity = request.size.unwrap_or(0.0);
                if !(quantity.is_finite() && quantity > 0.0) {
                    return Err(OrderError::InvalidSize(quantity));
                }
                let notional = quantity * price;
                let needed = notional + self.commission(notional);
                // An all-in stake can overshoot the cash by float rounding only.
                if needed > self.cash * (1.0 + CASH_TOLERANCE) {
                    return Err(OrderError::InsufficientCash {
                        needed,
                        available: self.cash,
                    });
                }
                self.cash = (self.cash - needed).max(0.0);
                self.quantity += quantity;
                (OrderSide::Buy, quantity)
            }
            OrderSide::Sell => {
                if self.quantity <= 0.0 {
                    return Err(OrderError::NoPosition(request.symbol.clone()));
                }
                let quantity = match request.size {
                    Some(size) if size > 0.0 => size.min(self.quantity),
                    Some(size) => return Err(OrderError::InvalidSize(size)),
                    None => self.quantity,
                };
                let notional = quantity * price;
                self.cash += notional - self.commission(notional);
                self.quantity -= quantity;
                (OrderSide::Sell, quantity)
            }
        };

        let fill = Fill {
            bar_index,
            timestamp: bar.timestamp,
            symbol: request.symbol.clone(),
            side,
            price,
            quantity,
            commission: self.commission(quantity * price),
        };
        trace!(bar = bar_index, side = %side, price, quantity, cash = self.cash, "fill");
        self.fills.push(fill.clone());
        Ok(OrderAck::Filled(fill))
    }

    fn account(&self, mark_price: f64) -> AccountSnapshot {
        AccountSnapshot {
            cash: Some(self.cash),
            value: Some(self.equity(mark_price)),
        }
    }
}
