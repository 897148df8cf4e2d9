//! Position and trade-cycle bookkeeping.
//!
//! A cycle runs from the first entry to the single exit that closes it.
//! Entries are kept as (price, size) pairs scoped to the open cycle and
//! cleared when it closes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scale-in entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub price: f64,
    pub size: f64,
}

/// Summary of one closed cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleSummary {
    /// 1-based cycle number.
    pub cycle: u32,
    pub entries: Vec<Entry>,
    pub opened_bar: usize,
    pub opened_at: DateTime<Utc>,
    pub closed_bar: usize,
    pub closed_at: DateTime<Utc>,
    pub exit_price: f64,
    pub average_entry: f64,
    pub total_size: f64,
    /// (exit - average entry) * total size.
    pub profit: f64,
    pub total_profit: f64,
    pub average_profit_per_cycle: f64,
    pub buys: u32,
    pub max_buys_per_cycle: u32,
    pub total_buys: u32,
    pub secs_since_start: i64,
    pub secs_since_open: i64,
}

/// Open/closed flag, the current cycle's entries, and running counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    entries: Vec<Entry>,
    current_cycle_buys: u32,
    max_buys_per_cycle: u32,
    total_buys: u32,
    trade_cycles: u32,
    total_profit: f64,
    last_profit: f64,
    position_opened_at: Option<DateTime<Utc>>,
    opened_bar: Option<usize>,
    started_at: Option<DateTime<Utc>>,
}

impl PositionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the first bar time seen. Later calls are no-ops.
    pub fn mark_started(&mut self, at: DateTime<Utc>) {
        self.started_at.get_or_insert(at);
    }

    pub fn is_open(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entry_prices(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.price).collect()
    }

    pub fn sizes(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.size).collect()
    }

    pub fn total_size(&self) -> f64 {
        self.entries.iter().map(|e| e.size).sum()
    }

    /// Size-weighted mean entry price; `None` while flat.
    pub fn average_entry_price(&self) -> Option<f64> {
        let total = self.total_size();
        if self.entries.is_empty() || total == 0.0 {
            return None;
        }
        let cost: f64 = self.entries.iter().map(|e| e.price * e.size).sum();
        Some(cost / total)
    }

    pub fn current_cycle_buys(&self) -> u32 {
        self.current_cycle_buys
    }

    pub fn max_buys_per_cycle(&self) -> u32 {
        self.max_buys_per_cycle
    }

    pub fn total_buys(&self) -> u32 {
        self.total_buys
    }

    pub fn trade_cycles(&self) -> u32 {
        self.trade_cycles
    }

    pub fn total_profit(&self) -> f64 {
        self.total_profit
    }

    pub fn last_profit(&self) -> f64 {
        self.last_profit
    }

    pub fn position_opened_at(&self) -> Option<DateTime<Utc>> {
        self.position_opened_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Append an entry to the open cycle, opening one if flat.
    pub fn open_entry(&mut self, price: f64, size: f64, bar_index: usize, at: DateTime<Utc>) {
        if self.entries.is_empty() {
            self.position_opened_at = Some(at);
            self.opened_bar = Some(bar_index);
        }
        self.entries.push(Entry { price, size });
        self.current_cycle_buys += 1;
        self.total_buys += 1;
        self.max_buys_per_cycle = self.max_buys_per_cycle.max(self.current_cycle_buys);
    }

    /// Close the open cycle at `exit_price`, returning its summary.
    ///
    /// Returns `None` (and changes nothing) when flat.
    pub fn close_cycle(
        &mut self,
        exit_price: f64,
        bar_index: usize,
        at: DateTime<Utc>,
    ) -> Option<CycleSummary> {
        let average_entry = self.average_entry_price()?;
        let total_size = self.total_size();
        let profit = (exit_price - average_entry) * total_size;

        self.last_profit = profit;
        self.total_profit += profit;
        self.trade_cycles += 1;

        let opened_at = self.position_opened_at.unwrap_or(at);
        let started_at = self.started_at.unwrap_or(opened_at);
        let summary = CycleSummary {
            cycle: self.trade_cycles,
            entries: std::mem::take(&mut self.entries),
            opened_bar: self.opened_bar.unwrap_or(bar_index),
            opened_at,
            closed_bar: bar_index,
            closed_at: at,
            exit_price,
            average_entry,
            total_size,
            profit,
            total_profit: self.total_profit,
            average_profit_per_cycle: self.total_profit / f64::from(self.trade_cycles),
            buys: self.current_cycle_buys,
            max_buys_per_cycle: self.max_buys_per_cycle,
            total_buys: self.total_buys,
            secs_since_start: (at - started_at).num_seconds(),
            secs_since_open: (at - opened_at).num_seconds(),
        };

        self.current_cycle_buys = 0;
        self.position_opened_at = None;
        self.opened_bar = None;
        Some(summary)
    }
}
