use crate::components::{Indicator, IndicatorValues};
use crate::domain::Bar;
use crate::indicators::{Ema, Hma, Qqe, QqeLine, VolumeOscLine, VolumeOscillator};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Evaluation, IndicatorState, Signal, SkipReason};

/// What the previous bar's volume oscillator is compared against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeBaseline {
    /// The oscillator at the current bar: volume momentum must be fading
    /// (enter) or building (exit) relative to one bar ago.
    #[default]
    CurrentOsc,
    /// A fixed zero line: short volume EMA above or below the long one.
    Zero,
}

/// Evaluator parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalParams {
    pub volume_short: usize,
    pub volume_long: usize,
    pub qqe_period: usize,
    pub qqe_fast: usize,
    pub qqe_q: f64,
    pub hull_length: usize,
    pub ema_length: usize,
    pub baseline: VolumeBaseline,
    /// Emit a debug record of RSI, DAR, ATR and QQE for every bar.
    pub debug: bool,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            volume_short: 5,
            volume_long: 10,
            qqe_period: 6,
            qqe_fast: 5,
            qqe_q: 3.0,
            hull_length: 53,
            ema_length: 20,
            baseline: VolumeBaseline::CurrentOsc,
            debug: false,
        }
    }
}

/// Series names the evaluator reads from `IndicatorValues`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesKeys {
    pub volume_short: String,
    pub volume_long: String,
    pub volume_osc: String,
    pub rsi: String,
    pub atr: String,
    pub dar: String,
    pub qqe: String,
    pub hma: String,
    pub ema: String,
}

/// Reduces the indicator set to an enter/exit signal per bar.
///
/// Enter (flat only):    qqe[t-1] > 0 && close[t] > hma[t] && osc[t-1] > baseline[t]
/// Exit (open only):     qqe[t-1] > 0 && close[t] < hma[t] && osc[t-1] < baseline[t]
///
/// A bar whose ATR is exactly zero is skipped.
#[derive(Debug, Clone)]
pub struct SignalEvaluator {
    params: SignalParams,
    keys: SeriesKeys,
}

impl SignalEvaluator {
    pub fn new(params: SignalParams) -> Self {
        let keys = {
            let ind = Self::build_indicators(&params);
            let name = |i: usize| ind[i].name().to_string();
            SeriesKeys {
                volume_short: name(0),
                volume_long: name(1),
                volume_osc: name(2),
                rsi: name(3),
                atr: name(4),
                dar: name(5),
                qqe: name(6),
                hma: name(7),
                ema: name(8),
            }
        };
        Self { params, keys }
    }

    pub fn params(&self) -> &SignalParams {
        &self.params
    }

    pub fn keys(&self) -> &SeriesKeys {
        &self.keys
    }

    /// The indicator set this evaluator reads, in `SeriesKeys` order.
    pub fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        Self::build_indicators(&self.params)
    }

    fn build_indicators(p: &SignalParams) -> Vec<Box<dyn Indicator>> {
        vec![
            Box::new(VolumeOscillator::new(p.volume_short, p.volume_long, VolumeOscLine::Short)),
            Box::new(VolumeOscillator::new(p.volume_short, p.volume_long, VolumeOscLine::Long)),
            Box::new(VolumeOscillator::new(p.volume_short, p.volume_long, VolumeOscLine::Osc)),
            Box::new(Qqe::new(p.qqe_period, p.qqe_fast, p.qqe_q, QqeLine::Rsi)),
            Box::new(Qqe::new(p.qqe_period, p.qqe_fast, p.qqe_q, QqeLine::Atr)),
            Box::new(Qqe::new(p.qqe_period, p.qqe_fast, p.qqe_q, QqeLine::Dar)),
            Box::new(Qqe::new(p.qqe_period, p.qqe_fast, p.qqe_q, QqeLine::Qqe)),
            Box::new(Hma::new(p.hull_length)),
            Box::new(Ema::new(p.ema_length)),
        ]
    }

    /// Index of the first bar that can produce a signal.
    ///
    /// The trend average is read at t; the QQE line and the oscillator at t-1.
    pub fn warmup(&self) -> usize {
        let p = &self.params;
        let hma = Hma::new(p.hull_length).lookback();
        let qqe = Qqe::new(p.qqe_period, p.qqe_fast, p.qqe_q, QqeLine::Qqe).lookback();
        let osc = VolumeOscillator::osc(p.volume_short, p.volume_long).lookback();
        hma.max(qqe + 1).max(osc + 1)
    }

    /// Evaluate the last bar of `bars`, computing indicators over the window.
    pub fn evaluate(&self, bars: &[Bar], position_open: bool) -> Evaluation {
        if bars.is_empty() {
            return Evaluation::skip(SkipReason::Warmup, IndicatorState::empty());
        }
        let indicators = IndicatorValues::compute(bars, &self.indicators());
        self.evaluate_at(bars, bars.len() - 1, &indicators, position_open)
    }

    /// Evaluate bar `t` from precomputed series.
    ///
    /// Only `bars[..=t]` and indicator values at t and t-1 are read.
    pub fn evaluate_at(
        &self,
        bars: &[Bar],
        t: usize,
        indicators: &IndicatorValues,
        position_open: bool,
    ) -> Evaluation {
        let state = IndicatorState::read(self, indicators, t);

        if self.params.debug {
            debug!(
                bar = t,
                rsi = state.rsi,
                dar = state.dar,
                atr = state.atr,
                qqe = state.qqe,
                "qqe state"
            );
        }

        if state.atr == 0.0 {
            debug!(bar = t, "atr is zero, skipping bar");
            return Evaluation::skip(SkipReason::ZeroAtr, state);
        }

        let Some(prev) = t.checked_sub(1) else {
            return Evaluation::skip(SkipReason::Warmup, state);
        };
        let keys = &self.keys;
        let close = bars.get(t).map(|b| b.close).filter(|c| c.is_finite());
        let hma = indicators.valid(&keys.hma, t);
        let qqe_prev = indicators.valid(&keys.qqe, prev);
        let osc_prev = indicators.valid(&keys.volume_osc, prev);
        let baseline = match self.params.baseline {
            VolumeBaseline::CurrentOsc => indicators.valid(&keys.volume_osc, t),
            VolumeBaseline::Zero => Some(0.0),
        };

        let (Some(close), Some(hma), Some(qqe_prev), Some(osc_prev), Some(baseline)) =
            (close, hma, qqe_prev, osc_prev, baseline)
        else {
            return Evaluation::skip(SkipReason::Warmup, state);
        };

        let momentum = qqe_prev > 0.0;
        let signal = Signal {
            enter: !position_open && momentum && close > hma && osc_prev > baseline,
            exit: position_open && momentum && close < hma && osc_prev < baseline,
        };

        Evaluation {
            signal,
            skipped: None,
            state,
        }
    }
}

impl Default for SignalEvaluator {
    fn default() -> Self {
        Self::new(SignalParams::default())
    }
}
