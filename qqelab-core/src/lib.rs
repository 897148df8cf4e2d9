//! qqelab core: domain types, indicators, signal evaluation, strategy driver.
//!
//! This crate holds the strategy itself:
//! - Domain types (bars, order requests, fills, trade records)
//! - Indicators (EMA, RSI, ATR, WMA, Hull MA, QQE line, volume oscillator)
//! - Signal evaluator: enter/exit per bar, pure over the bar window
//! - Position state: scale-in entries and trade-cycle counters
//! - Strategy driver: one action per bar through an order router
//! - Live order queue: a background worker draining submissions in order

pub mod components;
pub mod domain;
pub mod indicators;
pub mod order_queue;
pub mod position;
pub mod signal;
pub mod strategy;

pub use components::{
    AccountSnapshot, Indicator, IndicatorValues, OrderAck, OrderError, OrderRouter,
};
pub use domain::{Bar, Fill, OrderRequest, OrderSide, TradeRecord};
pub use order_queue::{OrderQueue, OrderSubmitter, QueuedRouter, WorkerReport};
pub use position::{CycleSummary, Entry, PositionState};
pub use signal::{
    Evaluation, IndicatorState, Signal, SignalEvaluator, SignalParams, SkipReason, VolumeBaseline,
};
pub use strategy::{BarOutcome, DriverConfig, RunMode, StrategyDriver, StrategyError};
