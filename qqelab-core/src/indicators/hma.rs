//! Hull Moving Average (HMA).
//!
//! HMA = WMA(2 * WMA(close, n/2) - WMA(close, n), floor(sqrt(n)))
//! Both derived lengths are clamped to at least 1.
//! Lookback: (n - 1) + (floor(sqrt(n)) - 1).

use crate::components::indicator::{Indicator, Source};
use crate::domain::Bar;
use crate::indicators::wma::wma_of_series;

#[derive(Debug, Clone)]
pub struct Hma {
    period: usize,
    name: String,
}

impl Hma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "HMA period must be >= 1");
        Self {
            period,
            name: format!("hma_{period}"),
        }
    }

    fn half_period(&self) -> usize {
        (self.period / 2).max(1)
    }

    fn sqrt_period(&self) -> usize {
        ((self.period as f64).sqrt().floor() as usize).max(1)
    }
}

impl Indicator for Hma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        (self.period - 1) + (self.sqrt_period() - 1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes = Source::Close.extract(bars);
        let half = wma_of_series(&closes, self.half_period());
        let full = wma_of_series(&closes, self.period);
        let raw: Vec<f64> = half
            .iter()
            .zip(&full)
            .map(|(h, f)| 2.0 * h - f)
            .collect();
        wma_of_series(&raw, self.sqrt_period())
    }
}
