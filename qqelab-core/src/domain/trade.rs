//! TradeRecord: one closed trade cycle, flattened for analytics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A complete cycle: first entry → single exit.
///
/// A cycle may contain several scale-in entries; `entry_price` is their
/// size-weighted average and `entries` their count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,

    // ── Entry ──
    pub entry_bar: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub entries: usize,

    // ── Exit ──
    pub exit_bar: usize,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,

    // ── Size ──
    pub quantity: f64,

    // ── PnL ──
    pub gross_pnl: f64,
    pub commission: f64,
    pub net_pnl: f64,

    // ── Duration ──
    pub bars_held: usize,
}

impl TradeRecord {
    /// Return on the trade as a fraction of entry cost.
    pub fn return_pct(&self) -> f64 {
        if self.entry_price == 0.0 || self.quantity == 0.0 {
            return 0.0;
        }
        self.net_pnl / (self.entry_price * self.quantity)
    }

    pub fn is_winner(&self) -> bool {
        self.net_pnl > 0.0
    }
}
