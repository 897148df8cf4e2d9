//! Signal evaluation: QQE momentum, Hull trend and volume oscillator reduced
//! to an enter/exit pair for one bar.
//!
//! The evaluator is a pure function of the bar window plus an
//! "is a position open" flag. It never touches position state.

mod evaluator;
mod state;

pub use evaluator::{SeriesKeys, SignalEvaluator, SignalParams, VolumeBaseline};
pub use state::IndicatorState;

use serde::{Deserialize, Serialize};

/// Entry/exit decision for one bar.
///
/// `enter` is only ever set while flat, `exit` only while a position is open,
/// so at most one of them is true.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub enter: bool,
    pub exit: bool,
}

impl Signal {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_none(&self) -> bool {
        !self.enter && !self.exit
    }
}

/// Why a bar produced no evaluation at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Some input is still inside its lookback window.
    Warmup,
    /// ATR is exactly zero on the current bar.
    ZeroAtr,
}

/// Result of evaluating one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub signal: Signal,
    pub skipped: Option<SkipReason>,
    pub state: IndicatorState,
}

impl Evaluation {
    pub(crate) fn skip(reason: SkipReason, state: IndicatorState) -> Self {
        Self {
            signal: Signal::none(),
            skipped: Some(reason),
            state,
        }
    }
}
