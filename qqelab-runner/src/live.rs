//! Live forward-trading loop.
//!
//! Bars come from a [`BarPoller`]; orders leave through an [`OrderQueue`]
//! worker so bar processing never blocks on the relay.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use qqelab_core::{
    Bar, BarOutcome, IndicatorValues, OrderError, OrderQueue, OrderSubmitter, QueuedRouter,
    RunMode, StrategyDriver, StrategyError,
};

use crate::config::{ConfigError, QqeConfig};

#[derive(Debug, Error)]
pub enum LiveError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("kline endpoint returned HTTP {0}")]
    Status(u16),
    #[error("malformed kline response: {0}")]
    Parse(String),
    #[error("order worker failed: {0}")]
    Order(#[from] OrderError),
    #[error("strategy failed: {0}")]
    Strategy(#[from] StrategyError),
}

/// Source of closed bars for the live loop.
pub trait BarPoller {
    /// History used to seed the indicator window. Not traded on.
    fn backfill(&mut self) -> Result<Vec<Bar>, LiveError>;

    /// Closed bars that appeared since the previous call, oldest first.
    fn poll(&mut self) -> Result<Vec<Bar>, LiveError>;
}

/// Polls Binance's public `/api/v3/klines` endpoint.
pub struct BinanceKlines {
    client: reqwest::blocking::Client,
    base_url: String,
    symbol: String,
    interval: String,
    lookback_minutes: i64,
    last_open: Option<DateTime<Utc>>,
}

impl BinanceKlines {
    pub fn new(
        base_url: impl Into<String>,
        symbol: impl Into<String>,
        interval: impl Into<String>,
        lookback_minutes: i64,
    ) -> Result<Self, LiveError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            symbol: symbol.into(),
            interval: interval.into(),
            lookback_minutes,
            last_open: None,
        })
    }

    pub fn from_config(config: &QqeConfig) -> Result<Self, LiveError> {
        let live = &config.live;
        Self::new(
            live.binance_url.trim_end_matches('/'),
            live.symbol(),
            live.interval.clone(),
            live.lookback_minutes,
        )
    }

    fn fetch(&mut self, start: DateTime<Utc>) -> Result<Vec<Bar>, LiveError> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let start_ms = start.timestamp_millis().to_string();
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("symbol", self.symbol.as_str()),
                ("interval", self.interval.as_str()),
                ("startTime", start_ms.as_str()),
                ("limit", "1000"),
            ])
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(LiveError::Status(status.as_u16()));
        }
        let body = resp.text()?;
        let bars = parse_klines(&self.symbol, &body, Utc::now())?;

        let fresh: Vec<Bar> = bars
            .into_iter()
            .filter(|b| self.last_open.map_or(true, |last| b.timestamp > last))
            .collect();
        if let Some(last) = fresh.last() {
            self.last_open = Some(last.timestamp);
        }
        debug!(symbol = %self.symbol, fresh = fresh.len(), "fetched klines");
        Ok(fresh)
    }
}

impl BarPoller for BinanceKlines {
    fn backfill(&mut self) -> Result<Vec<Bar>, LiveError> {
        let start = Utc::now() - ChronoDuration::minutes(self.lookback_minutes);
        self.fetch(start)
    }

    fn poll(&mut self) -> Result<Vec<Bar>, LiveError> {
        let start = match self.last_open {
            Some(last) => last + ChronoDuration::milliseconds(1),
            None => Utc::now() - ChronoDuration::minutes(self.lookback_minutes),
        };
        self.fetch(start)
    }
}

/// Parse a kline array response, keeping only klines closed before `now`.
///
/// Each kline is `[open_time, open, high, low, close, volume, close_time, ...]`
/// with times in epoch milliseconds and prices as decimal strings.
pub fn parse_klines(symbol: &str, body: &str, now: DateTime<Utc>) -> Result<Vec<Bar>, LiveError> {
    let rows: Vec<Vec<Value>> =
        serde_json::from_str(body).map_err(|e| LiveError::Parse(e.to_string()))?;
    let mut bars = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        if row.len() < 7 {
            return Err(LiveError::Parse(format!("kline {i} has {} fields", row.len())));
        }
        let close_time = millis(&row[6], i)?;
        if close_time >= now {
            continue;
        }
        bars.push(Bar {
            timestamp: millis(&row[0], i)?,
            symbol: symbol.to_string(),
            open: number(&row[1], i)?,
            high: number(&row[2], i)?,
            low: number(&row[3], i)?,
            close: number(&row[4], i)?,
            volume: number(&row[5], i)?,
        });
    }
    Ok(bars)
}

fn millis(value: &Value, row: usize) -> Result<DateTime<Utc>, LiveError> {
    value
        .as_i64()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .ok_or_else(|| LiveError::Parse(format!("kline {row}: bad timestamp {value}")))
}

fn number(value: &Value, row: usize) -> Result<f64, LiveError> {
    let parsed = match value {
        Value::String(s) => s.parse::<f64>().ok(),
        other => other.as_f64(),
    };
    parsed.ok_or_else(|| LiveError::Parse(format!("kline {row}: bad number {value}")))
}

/// Pacing and termination of the live loop.
#[derive(Debug, Clone)]
pub struct LiveLimits {
    pub poll_interval: Duration,
    /// Stop after this many polls. Runs until an error when `None`.
    pub max_polls: Option<usize>,
}

impl LiveLimits {
    pub fn from_config(config: &QqeConfig, max_polls: Option<usize>) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.live.poll_secs),
            max_polls,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveSummary {
    pub polls: usize,
    pub bars_processed: usize,
    pub entries: usize,
    pub cycles: usize,
    /// Orders the worker delivered.
    pub submitted: usize,
    pub total_profit: f64,
    pub open_position_size: f64,
    pub last_bar: Option<DateTime<Utc>>,
}

/// Run the live loop until `limits.max_polls` or the first error.
///
/// The order queue is always shut down before returning. A worker
/// submission failure takes precedence over the loop's own result.
pub fn run_live<P, S>(
    config: &QqeConfig,
    poller: &mut P,
    submitter: S,
    limits: &LiveLimits,
) -> Result<LiveSummary, LiveError>
where
    P: BarPoller + ?Sized,
    S: OrderSubmitter + 'static,
{
    config.validate()?;
    let evaluator = config.evaluator();
    let mut driver = StrategyDriver::new(config.driver_config(RunMode::Live), evaluator);

    info!(
        symbol = %driver.config().symbol,
        submitter = submitter.name(),
        max_window = config.live.max_window,
        "starting live loop"
    );
    let queue = OrderQueue::spawn(submitter, config.live.queue_capacity)?;
    let mut router = QueuedRouter::new(queue);

    let outcome = live_loop(config, poller, &mut driver, &mut router, limits);
    // The relay holds the live account; only strategy counters are logged.
    driver.finish(&router, None);
    let report = router.shutdown();

    match (outcome, report.into_result()) {
        (_, Err(worker_err)) => Err(LiveError::Order(worker_err)),
        (Err(err), Ok(_)) => Err(err),
        (Ok(mut summary), Ok(submitted)) => {
            summary.submitted = submitted;
            info!(
                polls = summary.polls,
                bars = summary.bars_processed,
                cycles = summary.cycles,
                submitted,
                total_profit = summary.total_profit,
                "live loop stopped"
            );
            Ok(summary)
        }
    }
}

fn live_loop<P: BarPoller + ?Sized>(
    config: &QqeConfig,
    poller: &mut P,
    driver: &mut StrategyDriver,
    router: &mut QueuedRouter,
    limits: &LiveLimits,
) -> Result<LiveSummary, LiveError> {
    let indicators = driver.evaluator().indicators();
    let max_window = config.live.max_window;

    let mut window = poller.backfill()?;
    window.sort_by_key(|b| b.timestamp);
    trim_window(&mut window, max_window);
    info!(bars = window.len(), "seeded bar window");

    let mut summary = LiveSummary::default();
    loop {
        if limits.max_polls.is_some_and(|max| summary.polls >= max) {
            break;
        }
        if summary.polls > 0 && !limits.poll_interval.is_zero() {
            std::thread::sleep(limits.poll_interval);
        }
        let fresh = poller.poll()?;
        summary.polls += 1;

        for bar in fresh {
            if window.last().is_some_and(|last| bar.timestamp <= last.timestamp) {
                warn!(time = %bar.timestamp, "ignoring out-of-order bar");
                continue;
            }
            window.push(bar);
            trim_window(&mut window, max_window);

            let values = IndicatorValues::compute(&window, &indicators);
            let t = window.len() - 1;
            match driver.on_bar(&window, t, &values, router)? {
                BarOutcome::Entered { .. } => summary.entries += 1,
                BarOutcome::Exited(_) => summary.cycles += 1,
                BarOutcome::Skipped(reason) => debug!(?reason, "bar skipped"),
                BarOutcome::Idle => {}
            }
            summary.bars_processed += 1;
            summary.last_bar = Some(window[t].timestamp);
        }
    }

    summary.total_profit = driver.position().total_profit();
    summary.open_position_size = driver.position().total_size();
    Ok(summary)
}

fn trim_window(window: &mut Vec<Bar>, max_window: usize) {
    if window.len() > max_window {
        let excess = window.len() - max_window;
        window.drain(..excess);
    }
}
