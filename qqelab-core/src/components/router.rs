//! Order routing: the strategy driver's only way out to a broker.
//!
//! Backtests route to a synchronous simulated broker that fills at the bar
//! close. Live runs route to a queue drained by a background worker, so
//! `submit` returns before the order reaches the exchange.

use crate::domain::{Bar, Fill, OrderRequest};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while routing or submitting an order.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("insufficient cash: need {needed:.4}, have {available:.4}")]
    InsufficientCash { needed: f64, available: f64 },
    #[error("no open position to close for {0}")]
    NoPosition(String),
    #[error("invalid order size {0}")]
    InvalidSize(f64),
    #[error("order queue is closed")]
    QueueClosed,
    #[error("failed to spawn order worker: {0}")]
    Spawn(String),
    #[error("order worker panicked")]
    WorkerPanicked,
    #[error("order submission failed: {0}")]
    Submission(String),
}

/// What the router did with an order.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderAck {
    /// Filled synchronously (simulated broker).
    Filled(Fill),
    /// Accepted for asynchronous submission.
    Queued,
}

impl OrderAck {
    pub fn fill(&self) -> Option<&Fill> {
        match self {
            OrderAck::Filled(fill) => Some(fill),
            OrderAck::Queued => None,
        }
    }
}

/// Account valuation as seen by the router.
///
/// Live routers do not track the exchange balance, so both fields are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub cash: Option<f64>,
    pub value: Option<f64>,
}

/// Trait for order routers.
pub trait OrderRouter {
    /// Route one market order decided on `bar`.
    fn submit(
        &mut self,
        request: &OrderRequest,
        bar_index: usize,
        bar: &Bar,
    ) -> Result<OrderAck, OrderError>;

    /// Account snapshot, marking any position at `mark_price`.
    fn account(&self, mark_price: f64) -> AccountSnapshot;
}
