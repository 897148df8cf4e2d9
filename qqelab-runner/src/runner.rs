//! Backtest runner: wires together config, evaluator, driver, broker, and metrics.
//!
//! Indicators are precomputed once over the whole series; the driver then
//! runs bar by bar against the simulated broker and equity is marked to each
//! bar's close.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use qqelab_core::{
    BarOutcome, CycleSummary, IndicatorValues, RunMode, SkipReason, StrategyDriver, StrategyError,
    TradeRecord,
};

use crate::broker::SimulatedBroker;
use crate::config::{ConfigError, QqeConfig};
use crate::data_loader::{LoadError, LoadedData};
use crate::metrics::{periods_per_year, PerformanceMetrics};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("strategy error at bar {bar}: {source}")]
    Strategy {
        bar: usize,
        #[source]
        source: StrategyError,
    },
    #[error("no bars to run on")]
    NoBars,
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// One point of the equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// BLAKE3 over the config hash and the dataset hash.
    pub run_id: String,
    pub config: QqeConfig,
    pub symbol: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub bar_count: usize,
    pub warmup_bars: usize,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    pub cycles: Vec<CycleSummary>,
    /// Size of a cycle still open after the last bar (marked, not counted).
    pub open_position_size: f64,
    pub skipped_zero_atr: usize,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Deterministic run id from config and data.
pub fn run_id(config: &QqeConfig, dataset_hash: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(config.config_hash().as_bytes());
    hasher.update(dataset_hash.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Run a backtest over pre-loaded bars. No I/O.
pub fn run_backtest(config: &QqeConfig, data: &LoadedData) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let bars = &data.bars;
    let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
        return Err(RunError::NoBars);
    };

    let evaluator = config.evaluator();
    let warmup_bars = evaluator.warmup();
    let indicators = IndicatorValues::compute(bars, &evaluator.indicators());

    let mut driver = StrategyDriver::new(config.driver_config(RunMode::Backtest), evaluator);
    let mut broker =
        SimulatedBroker::new(config.backtest.initial_cash, config.backtest.commission_pct);
    let mut equity_curve = Vec::with_capacity(bars.len());
    let mut cycles = Vec::new();
    let mut skipped_zero_atr = 0usize;

    for (t, bar) in bars.iter().enumerate() {
        let outcome = driver
            .on_bar(bars, t, &indicators, &mut broker)
            .map_err(|source| RunError::Strategy { bar: t, source })?;
        match outcome {
            BarOutcome::Exited(summary) => cycles.push(summary),
            BarOutcome::Skipped(SkipReason::ZeroAtr) => skipped_zero_atr += 1,
            _ => {}
        }
        equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            equity: broker.equity(bar.close),
        });
    }
    driver.finish(&broker, Some(last.close));

    let trades = extract_trades(&cycles, &broker, &first.symbol);
    let equity: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
    let timestamps: Vec<_> = bars.iter().map(|b| b.timestamp).collect();
    let metrics = PerformanceMetrics::compute(
        &equity,
        &trades,
        config.backtest.initial_cash,
        periods_per_year(&timestamps),
    );

    info!(
        symbol = %first.symbol,
        bars = bars.len(),
        trades = trades.len(),
        final_value = metrics.final_value,
        pnl = metrics.pnl,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id: run_id(config, &data.dataset_hash),
        config: config.clone(),
        symbol: first.symbol.clone(),
        start: first.timestamp,
        end: last.timestamp,
        bar_count: bars.len(),
        warmup_bars,
        dataset_hash: data.dataset_hash.clone(),
        has_synthetic: data.has_synthetic,
        metrics,
        trades,
        equity_curve,
        cycles,
        open_position_size: driver.position().total_size(),
        skipped_zero_atr,
    })
}

/// One trade record per closed cycle, with commissions from the broker's fills.
fn extract_trades(cycles: &[CycleSummary], broker: &SimulatedBroker, symbol: &str) -> Vec<TradeRecord> {
    cycles
        .iter()
        .map(|c| {
            let commission: f64 = broker
                .fills()
                .iter()
                .filter(|f| f.bar_index >= c.opened_bar && f.bar_index <= c.closed_bar)
                .map(|f| f.commission)
                .sum();
            TradeRecord {
                symbol: symbol.to_string(),
                entry_bar: c.opened_bar,
                entry_time: c.opened_at,
                entry_price: c.average_entry,
                entries: c.entries.len(),
                exit_bar: c.closed_bar,
                exit_time: c.closed_at,
                exit_price: c.exit_price,
                quantity: c.total_size,
                gross_pnl: c.profit,
                commission,
                net_pnl: c.profit - commission,
                bars_held: c.closed_bar - c.opened_bar,
            }
        })
        .collect()
}
