//! qqelab runner: backtest and live orchestration around `qqelab-core`.
//!
//! - TOML config with validation
//! - CSV and synthetic bar loading
//! - Simulated broker and the backtest loop
//! - Performance metrics and trade analyzer stats
//! - Artifact export (manifest, equity/trade CSVs, markdown report)
//! - Binance kline polling, relay order submission and the live loop

pub mod broker;
pub mod config;
pub mod data_loader;
pub mod live;
pub mod metrics;
pub mod relay;
pub mod reporting;
pub mod runner;

pub use broker::SimulatedBroker;
pub use config::{ConfigError, QqeConfig};
pub use data_loader::{load_bars, load_csv, load_synthetic, LoadError, LoadOptions, LoadedData};
pub use live::{run_live, BarPoller, BinanceKlines, LiveError, LiveLimits, LiveSummary};
pub use metrics::{PerformanceMetrics, TradeStats};
pub use relay::{DryRunSubmitter, RelayPayload, RelaySubmitter};
pub use reporting::{load_run, render_markdown, ArtifactManager, ArtifactPaths, RunManifest};
pub use runner::{run_backtest, BacktestResult, EquityPoint, RunError};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn results_are_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
        assert_send::<PerformanceMetrics>();
        assert_sync::<PerformanceMetrics>();
        assert_send::<RunManifest>();
        assert_sync::<RunManifest>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<QqeConfig>();
        assert_sync::<QqeConfig>();
        assert_send::<LoadOptions>();
        assert_sync::<LoadOptions>();
    }

    #[test]
    fn submitters_can_move_to_the_worker() {
        assert_send::<RelaySubmitter>();
        assert_send::<DryRunSubmitter>();
    }
}
