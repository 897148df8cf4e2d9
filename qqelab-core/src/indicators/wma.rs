//! Weighted Moving Average (WMA).
//!
//! Linearly weighted: the newest value weighs `period`, the oldest weighs 1.
//! WMA[t] = sum_{k=0}^{period-1} (period-k) * x[t-k] / (period*(period+1)/2)
//! Lookback: period - 1. NaN anywhere in the window → NaN.

use crate::components::indicator::{Indicator, Source};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Wma {
    period: usize,
    name: String,
}

impl Wma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "WMA period must be >= 1");
        Self {
            period,
            name: format!("wma_{period}"),
        }
    }
}

impl Indicator for Wma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        wma_of_series(&Source::Close.extract(bars), self.period)
    }
}

/// WMA over an arbitrary series.
pub fn wma_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < period {
        return result;
    }

    let denom = (period * (period + 1)) as f64 / 2.0;
    for t in (period - 1)..n {
        let window = &values[t + 1 - period..=t];
        let weighted: f64 = window
            .iter()
            .enumerate()
            .map(|(k, v)| (k + 1) as f64 * v)
            .sum();
        // NaN in the window propagates through the sum.
        result[t] = weighted / denom;
    }

    result
}
