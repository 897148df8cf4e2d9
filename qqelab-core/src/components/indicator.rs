//! Indicator trait and precomputed indicator values container.
//!
//! Indicators are pure functions: bar history in, numeric series out.
//! Backtests precompute them once before the bar loop; the live loop
//! recomputes them over its trailing window on every closed bar. Both paths
//! read the result through `IndicatorValues`.

use crate::domain::Bar;
use std::collections::HashMap;

/// Trait for indicators.
///
/// Indicators take a full bar series and produce a numeric output series of
/// the same length. The first `lookback()` values should be `f64::NAN` (warmup).
///
/// # Look-ahead contamination guard
/// No indicator value at bar t may depend on price data from bar t+1 or later.
/// Every indicator must pass the truncated-vs-full series test.
pub trait Indicator: Send + Sync {
    /// Series key (e.g., "hma_53", "qqe_6_5_3").
    fn name(&self) -> &str;

    /// Number of bars needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Which bar field a single-input indicator reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Close,
    Volume,
}

impl Source {
    pub fn prefix(&self) -> &'static str {
        match self {
            Source::Close => "close",
            Source::Volume => "volume",
        }
    }

    pub fn extract(&self, bars: &[Bar]) -> Vec<f64> {
        match self {
            Source::Close => bars.iter().map(|b| b.close).collect(),
            Source::Volume => bars.iter().map(|b| b.volume).collect(),
        }
    }
}

/// Container for precomputed indicator values.
///
/// Built once per bar window, then queried by bar index.
#[derive(Debug, Clone, Default)]
pub struct IndicatorValues {
    series: HashMap<String, Vec<f64>>,
}

impl IndicatorValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute every indicator over `bars` and collect the series by name.
    pub fn compute(bars: &[Bar], indicators: &[Box<dyn Indicator>]) -> Self {
        let mut iv = Self::new();
        for indicator in indicators {
            let series = indicator.compute(bars);
            debug_assert_eq!(
                series.len(),
                bars.len(),
                "indicator '{}' produced {} values for {} bars",
                indicator.name(),
                series.len(),
                bars.len()
            );
            iv.insert(indicator.name(), series);
        }
        iv
    }

    /// Insert a named indicator series.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.series.insert(name.into(), values);
    }

    /// Get the indicator value at a specific bar index (NaN included).
    pub fn get(&self, name: &str, bar_index: usize) -> Option<f64> {
        self.series
            .get(name)
            .and_then(|v| v.get(bar_index).copied())
    }

    /// Like `get`, but warmup NaNs read as `None`.
    pub fn valid(&self, name: &str, bar_index: usize) -> Option<f64> {
        self.get(name, bar_index).filter(|v| !v.is_nan())
    }

    /// Number of indicator series stored.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
