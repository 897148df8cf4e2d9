//! Strategy driver: owns position state and turns signals into orders.
//!
//! One `on_bar` call per bar: evaluate, then at most one enter or one exit.
//! Order routing errors are not recovered here; they surface as
//! `StrategyError` and end the run.

use crate::components::{AccountSnapshot, IndicatorValues, OrderError, OrderRouter};
use crate::domain::{Bar, OrderRequest, OrderSide};
use crate::position::{CycleSummary, PositionState};
use crate::signal::{SignalEvaluator, SkipReason};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Errors from the strategy driver.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("order routing failed: {0}")]
    Order(#[from] OrderError),
    #[error("bar index {index} out of range for {len} bars")]
    BarOutOfRange { index: usize, len: usize },
    #[error("computed entry size {0} is not positive")]
    InvalidSize(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Backtest,
    Live,
}

/// Sizing and order routing settings for the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    pub mode: RunMode,
    pub symbol: String,
    /// Backtest: fraction of cash staked per entry.
    pub percent_sizer: f64,
    /// Backtest: broker commission in percent, reserved out of the stake.
    #[serde(default)]
    pub commission_pct: f64,
    /// Live: fixed order amount per entry.
    pub amount: f64,
    pub exchange: String,
    pub account: String,
    /// Market in `BASE/QUOTE` form.
    pub asset: String,
}

/// What happened on one bar.
#[derive(Debug, Clone, PartialEq)]
pub enum BarOutcome {
    Skipped(SkipReason),
    Idle,
    Entered { price: f64, size: f64 },
    Exited(CycleSummary),
}

pub struct StrategyDriver {
    config: DriverConfig,
    evaluator: SignalEvaluator,
    position: PositionState,
    acted_this_bar: bool,
}

impl StrategyDriver {
    pub fn new(config: DriverConfig, evaluator: SignalEvaluator) -> Self {
        Self {
            config,
            evaluator,
            position: PositionState::new(),
            acted_this_bar: false,
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &SignalEvaluator {
        &self.evaluator
    }

    pub fn position(&self) -> &PositionState {
        &self.position
    }

    /// Process bar `t`. `indicators` must cover `bars[..=t]`.
    pub fn on_bar(
        &mut self,
        bars: &[Bar],
        t: usize,
        indicators: &IndicatorValues,
        router: &mut dyn OrderRouter,
    ) -> Result<BarOutcome, StrategyError> {
        let bar = bars.get(t).ok_or(StrategyError::BarOutOfRange {
            index: t,
            len: bars.len(),
        })?;
        self.acted_this_bar = false;
        self.position.mark_started(bar.timestamp);

        let evaluation =
            self.evaluator
                .evaluate_at(bars, t, indicators, self.position.is_open());
        let signal = evaluation.signal;

        if let Some(reason) = evaluation.skipped {
            return Ok(BarOutcome::Skipped(reason));
        }

        if signal.enter && !self.acted_this_bar {
            self.acted_this_bar = true;
            return self.enter(t, bar, router);
        }
        if signal.exit && !self.acted_this_bar {
            self.acted_this_bar = true;
            return self.exit(t, bar, router);
        }
        Ok(BarOutcome::Idle)
    }

    /// Stake for a new entry. `None` when a backtest account has no cash left.
    fn entry_size(&self, bar: &Bar, router: &dyn OrderRouter) -> Result<Option<f64>, StrategyError> {
        let size = match self.config.mode {
            RunMode::Backtest => {
                let cash = router.account(bar.close).cash.unwrap_or(0.0);
                if cash <= 0.0 {
                    return Ok(None);
                }
                let cost_per_unit = bar.close * (1.0 + self.config.commission_pct / 100.0);
                cash * self.config.percent_sizer / cost_per_unit
            }
            RunMode::Live => self.config.amount,
        };
        if !(size.is_finite() && size > 0.0) {
            return Err(StrategyError::InvalidSize(size));
        }
        Ok(Some(size))
    }

    fn request(&self, side: OrderSide, size: Option<f64>, price: Option<f64>) -> OrderRequest {
        OrderRequest {
            side,
            symbol: self.config.symbol.clone(),
            size,
            price,
            exchange: self.config.exchange.clone(),
            account: self.config.account.clone(),
            asset: self.config.asset.clone(),
        }
    }

    fn enter(
        &mut self,
        t: usize,
        bar: &Bar,
        router: &mut dyn OrderRouter,
    ) -> Result<BarOutcome, StrategyError> {
        let Some(size) = self.entry_size(bar, router)? else {
            debug!(bar = t, "no cash left for another entry");
            return Ok(BarOutcome::Idle);
        };
        let price = bar.close;

        let request = match self.config.mode {
            RunMode::Backtest => self.request(OrderSide::Buy, Some(size), Some(price)),
            RunMode::Live => self.request(OrderSide::Buy, Some(size), None),
        };
        // Position state only changes once the router has taken the order.
        router.submit(&request, t, bar)?;
        self.position.open_entry(price, size, t, bar.timestamp);

        let account = router.account(price);
        debug!(
            target: "trade_monitor",
            bar = t,
            time = %bar.timestamp,
            price,
            size,
            cash = account.cash,
            value = account.value,
            "entry"
        );
        Ok(BarOutcome::Entered { price, size })
    }

    fn exit(
        &mut self,
        t: usize,
        bar: &Bar,
        router: &mut dyn OrderRouter,
    ) -> Result<BarOutcome, StrategyError> {
        let request = self.request(OrderSide::Sell, None, None);
        router.submit(&request, t, bar)?;

        let Some(summary) = self.position.close_cycle(bar.close, t, bar.timestamp) else {
            return Ok(BarOutcome::Idle);
        };
        info!(
            target: "trade_monitor",
            bar = t,
            time = %bar.timestamp,
            exit_price = summary.exit_price,
            average_entry = summary.average_entry,
            size = summary.total_size,
            cycle_profit = summary.profit,
            total_profit = summary.total_profit,
            cycles = summary.cycle,
            avg_profit_per_cycle = summary.average_profit_per_cycle,
            secs_since_start = summary.secs_since_start,
            secs_since_open = summary.secs_since_open,
            max_buys_per_cycle = summary.max_buys_per_cycle,
            total_buys = summary.total_buys,
            "exit"
        );
        Ok(BarOutcome::Exited(summary))
    }

    /// Log the final account state and return it.
    pub fn finish(&self, router: &dyn OrderRouter, last_close: Option<f64>) -> AccountSnapshot {
        let snapshot = router.account(last_close.unwrap_or(0.0));
        info!(
            target: "trade_monitor",
            final_value = snapshot.value,
            cash = snapshot.cash,
            cycles = self.position.trade_cycles(),
            total_profit = self.position.total_profit(),
            open = self.position.is_open(),
            "strategy stopped"
        );
        snapshot
    }
}
