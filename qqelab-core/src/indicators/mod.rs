//! Concrete indicator implementations.
//!
//! All indicators implement the `Indicator` trait from `components::indicator`.
//! Multi-series indicators (volume oscillator, QQE) are exposed as separate
//! named instances per line, keeping the single-series `Indicator` trait
//! unchanged.

pub mod atr;
pub mod ema;
pub mod hma;
pub mod qqe;
pub mod rsi;
pub mod volume_osc;
pub mod wma;

pub use atr::Atr;
pub use ema::Ema;
pub use hma::Hma;
pub use qqe::{Qqe, QqeLine};
pub use rsi::Rsi;
pub use volume_osc::{VolumeOscLine, VolumeOscillator};
pub use wma::Wma;

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLV at 15-minute spacing: open = prev_close (or close
/// for first bar), high = max(open,close) + 1.0, low = min(open,close) - 1.0,
/// volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    let volumes = vec![1000.0; closes.len()];
    make_bars_with_volume(closes, &volumes)
}

/// Like [`make_bars`] with an explicit volume per bar.
#[cfg(test)]
pub fn make_bars_with_volume(closes: &[f64], volumes: &[f64]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .zip(volumes)
        .enumerate()
        .map(|(i, (&close, &volume))| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: base + chrono::Duration::minutes(15 * i as i64),
                symbol: "TEST".to_string(),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
