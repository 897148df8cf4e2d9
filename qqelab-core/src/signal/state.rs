use crate::components::IndicatorValues;
use serde::{Deserialize, Serialize};

use super::evaluator::SignalEvaluator;

/// Snapshot of every derived value at one bar. NaN during warmup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorState {
    pub volume_short: f64,
    pub volume_long: f64,
    pub volume_osc: f64,
    pub rsi: f64,
    pub atr: f64,
    /// Damped average range: EMA of ATR minus q.
    pub dar: f64,
    pub qqe: f64,
    pub hma: f64,
    pub ema: f64,
}

impl IndicatorState {
    /// All-NaN state, e.g. for bars outside the computed series.
    pub fn empty() -> Self {
        Self {
            volume_short: f64::NAN,
            volume_long: f64::NAN,
            volume_osc: f64::NAN,
            rsi: f64::NAN,
            atr: f64::NAN,
            dar: f64::NAN,
            qqe: f64::NAN,
            hma: f64::NAN,
            ema: f64::NAN,
        }
    }

    /// Read the snapshot at `t` from precomputed series.
    pub fn read(evaluator: &SignalEvaluator, indicators: &IndicatorValues, t: usize) -> Self {
        let keys = evaluator.keys();
        let at = |name: &str| indicators.get(name, t).unwrap_or(f64::NAN);
        Self {
            volume_short: at(&keys.volume_short),
            volume_long: at(&keys.volume_long),
            volume_osc: at(&keys.volume_osc),
            rsi: at(&keys.rsi),
            atr: at(&keys.atr),
            dar: at(&keys.dar),
            qqe: at(&keys.qqe),
            hma: at(&keys.hma),
            ema: at(&keys.ema),
        }
    }
}
