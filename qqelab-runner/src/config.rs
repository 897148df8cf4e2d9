//! TOML configuration for backtest and live runs.
//!
//! ```toml
//! [backtest]
//! symbol = "RVNUSDT"
//! data = "data/RVNUSDT-15m.csv"
//! start = "2022-01-01"
//! end = "2022-06-30"
//! initial_cash = 1000.0
//!
//! [strategy]
//! percent_sizer = 0.01
//! hull_length = 53
//! baseline = "current_osc"
//!
//! [live]
//! coin = "FLOKI"
//! collateral = "USDT"
//! exchange = "mimic"
//! account = "binance_floki"
//! amount = 11.0
//! ```
//!
//! Every field has a default, so an empty file is a valid config.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use qqelab_core::{DriverConfig, RunMode, SignalEvaluator, SignalParams};

/// Errors from config loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Full run configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QqeConfig {
    pub backtest: BacktestSection,
    pub strategy: StrategySection,
    pub live: LiveSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    pub symbol: String,
    /// CSV price table. Ignored when `synthetic` is set.
    pub data: Option<PathBuf>,
    /// Inclusive date range filter.
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub initial_cash: f64,
    /// Commission charged on each fill, in percent of notional.
    pub commission_pct: f64,
    /// Generate a seeded random walk instead of reading `data`.
    pub synthetic: bool,
    pub synthetic_bars: usize,
    pub interval_minutes: i64,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            symbol: "RVNUSDT".into(),
            data: None,
            start: None,
            end: None,
            initial_cash: 1000.0,
            commission_pct: 0.0,
            synthetic: false,
            synthetic_bars: 2000,
            interval_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySection {
    /// Fraction of cash staked per backtest entry.
    pub percent_sizer: f64,
    #[serde(flatten)]
    pub signal: SignalParams,
}

impl Default for StrategySection {
    fn default() -> Self {
        Self {
            percent_sizer: 0.01,
            signal: SignalParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveSection {
    pub coin: String,
    pub collateral: String,
    pub exchange: String,
    pub account: String,
    /// Fixed order amount per entry.
    pub amount: f64,
    /// Kline interval, e.g. "15m".
    pub interval: String,
    /// Backfill depth on startup.
    pub lookback_minutes: i64,
    pub poll_secs: u64,
    /// Trailing bar window the indicators are recomputed over.
    pub max_window: usize,
    pub queue_capacity: usize,
    /// Relay webhook. Orders are only logged when unset.
    pub relay_url: Option<String>,
    pub binance_url: String,
}

impl Default for LiveSection {
    fn default() -> Self {
        Self {
            coin: "FLOKI".into(),
            collateral: "USDT".into(),
            exchange: "mimic".into(),
            account: "binance_floki".into(),
            amount: 11.0,
            interval: "15m".into(),
            lookback_minutes: 6 * 15,
            poll_secs: 30,
            max_window: 500,
            queue_capacity: 64,
            relay_url: None,
            binance_url: "https://api.binance.com".into(),
        }
    }
}

impl LiveSection {
    /// Exchange symbol, e.g. "FLOKIUSDT".
    pub fn symbol(&self) -> String {
        format!("{}{}", self.coin, self.collateral)
    }

    /// Relay market, e.g. "FLOKI/USDT".
    pub fn asset(&self) -> String {
        format!("{}/{}", self.coin, self.collateral)
    }
}

impl QqeConfig {
    /// Load and validate a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.strategy.signal;
        let periods = [
            ("volume_short", s.volume_short),
            ("volume_long", s.volume_long),
            ("qqe_period", s.qqe_period),
            ("qqe_fast", s.qqe_fast),
            ("hull_length", s.hull_length),
            ("ema_length", s.ema_length),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(invalid(format!("strategy.{name} must be > 0")));
            }
        }
        if !(s.qqe_q > 0.0) {
            return Err(invalid(format!("strategy.qqe_q must be > 0, got {}", s.qqe_q)));
        }
        let sizer = self.strategy.percent_sizer;
        if !(sizer > 0.0 && sizer <= 1.0) {
            return Err(invalid(format!(
                "strategy.percent_sizer must be in (0, 1], got {sizer}"
            )));
        }

        let b = &self.backtest;
        if let (Some(start), Some(end)) = (b.start, b.end) {
            if start > end {
                return Err(invalid(format!(
                    "backtest date range is empty: start {start} > end {end}"
                )));
            }
        }
        if !(b.initial_cash > 0.0) {
            return Err(invalid("backtest.initial_cash must be > 0".into()));
        }
        if !(b.commission_pct >= 0.0) {
            return Err(invalid("backtest.commission_pct must be >= 0".into()));
        }
        if b.interval_minutes <= 0 {
            return Err(invalid("backtest.interval_minutes must be > 0".into()));
        }

        let l = &self.live;
        if !(l.amount > 0.0) {
            return Err(invalid(format!("live.amount must be > 0, got {}", l.amount)));
        }
        let warmup = SignalEvaluator::new(s.clone()).warmup();
        if l.max_window <= warmup {
            return Err(invalid(format!(
                "live.max_window ({}) must exceed the indicator warmup ({warmup})",
                l.max_window
            )));
        }
        if l.queue_capacity == 0 {
            return Err(invalid("live.queue_capacity must be > 0".into()));
        }
        Ok(())
    }

    /// Driver settings for the given mode.
    pub fn driver_config(&self, mode: RunMode) -> DriverConfig {
        let symbol = match mode {
            RunMode::Backtest => self.backtest.symbol.clone(),
            RunMode::Live => self.live.symbol(),
        };
        DriverConfig {
            mode,
            symbol,
            percent_sizer: self.strategy.percent_sizer,
            commission_pct: self.backtest.commission_pct,
            amount: self.live.amount,
            exchange: self.live.exchange.clone(),
            account: self.live.account.clone(),
            asset: self.live.asset(),
        }
    }

    pub fn evaluator(&self) -> SignalEvaluator {
        SignalEvaluator::new(self.strategy.signal.clone())
    }

    /// Content hash of the config (BLAKE3 over its canonical JSON).
    pub fn config_hash(&self) -> String {
        // Serializing plain data structs cannot fail.
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

fn invalid(msg: String) -> ConfigError {
    ConfigError::Invalid(msg)
}
