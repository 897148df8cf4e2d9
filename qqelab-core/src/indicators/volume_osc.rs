//! Volume oscillator.
//!
//! osc = (EMA_short(volume) - EMA_long(volume)) / EMA_long(volume) * 100,
//! exactly 0 when EMA_long <= 0.
//!
//! Three output lines share one instance type; each line is its own
//! indicator so it lands under its own key in `IndicatorValues`.

use crate::components::indicator::{Indicator, Source};
use crate::domain::Bar;
use crate::indicators::ema::ema_of_series;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeOscLine {
    Short,
    Long,
    Osc,
}

#[derive(Debug, Clone)]
pub struct VolumeOscillator {
    short_len: usize,
    long_len: usize,
    line: VolumeOscLine,
    name: String,
}

impl VolumeOscillator {
    pub fn new(short_len: usize, long_len: usize, line: VolumeOscLine) -> Self {
        assert!(
            short_len >= 1 && long_len >= 1,
            "volume oscillator lengths must be >= 1"
        );
        let name = match line {
            VolumeOscLine::Short => format!("vosc_short_{short_len}"),
            VolumeOscLine::Long => format!("vosc_long_{long_len}"),
            VolumeOscLine::Osc => format!("vosc_{short_len}_{long_len}"),
        };
        Self {
            short_len,
            long_len,
            line,
            name,
        }
    }

    /// The oscillator line itself.
    pub fn osc(short_len: usize, long_len: usize) -> Self {
        Self::new(short_len, long_len, VolumeOscLine::Osc)
    }
}

impl Indicator for VolumeOscillator {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        match self.line {
            VolumeOscLine::Short => self.short_len - 1,
            VolumeOscLine::Long => self.long_len - 1,
            VolumeOscLine::Osc => self.short_len.max(self.long_len) - 1,
        }
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let volumes = Source::Volume.extract(bars);
        match self.line {
            VolumeOscLine::Short => ema_of_series(&volumes, self.short_len),
            VolumeOscLine::Long => ema_of_series(&volumes, self.long_len),
            VolumeOscLine::Osc => {
                let short = ema_of_series(&volumes, self.short_len);
                let long = ema_of_series(&volumes, self.long_len);
                short
                    .iter()
                    .zip(&long)
                    .map(|(&s, &l)| volume_oscillator(s, l))
                    .collect()
            }
        }
    }
}

/// Percentage spread of the short volume EMA over the long one.
///
/// Returns exactly 0.0 when `long <= 0`. NaN inputs (warmup) stay NaN.
pub fn volume_oscillator(short: f64, long: f64) -> f64 {
    if short.is_nan() || long.is_nan() {
        return f64::NAN;
    }
    if long <= 0.0 {
        return 0.0;
    }
    (short - long) / long * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars_with_volume, DEFAULT_EPSILON};

    #[test]
    fn zero_long_ema_gives_zero() {
        assert_eq!(volume_oscillator(5.0, 0.0), 0.0);
        assert_eq!(volume_oscillator(5.0, -1.0), 0.0);
    }

    #[test]
    fn nan_propagates() {
        assert!(volume_oscillator(f64::NAN, 10.0).is_nan());
        assert!(volume_oscillator(1.0, f64::NAN).is_nan());
    }

    #[test]
    fn percentage_spread() {
        assert_approx(volume_oscillator(110.0, 100.0), 10.0, DEFAULT_EPSILON);
        assert_approx(volume_oscillator(90.0, 100.0), -10.0, DEFAULT_EPSILON);
    }

    #[test]
    fn constant_volume_is_flat() {
        let closes = vec![100.0; 20];
        let volumes = vec![500.0; 20];
        let bars = make_bars_with_volume(&closes, &volumes);
        let osc = VolumeOscillator::osc(5, 10);
        let result = osc.compute(&bars);
        assert!(result[8].is_nan());
        for v in &result[9..] {
            assert_approx(*v, 0.0, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn zero_volume_series_is_zero_not_nan() {
        let closes = vec![100.0; 12];
        let volumes = vec![0.0; 12];
        let bars = make_bars_with_volume(&closes, &volumes);
        let result = VolumeOscillator::osc(5, 10).compute(&bars);
        assert_eq!(result[11], 0.0);
    }

    #[test]
    fn rising_volume_is_positive() {
        let closes = vec![100.0; 20];
        let volumes: Vec<f64> = (1..=20).map(|v| v as f64 * 100.0).collect();
        let bars = make_bars_with_volume(&closes, &volumes);
        let result = VolumeOscillator::osc(5, 10).compute(&bars);
        assert!(result[19] > 0.0);
    }

    #[test]
    fn line_names() {
        assert_eq!(VolumeOscillator::new(5, 10, VolumeOscLine::Short).name(), "vosc_short_5");
        assert_eq!(VolumeOscillator::new(5, 10, VolumeOscLine::Long).name(), "vosc_long_10");
        assert_eq!(VolumeOscillator::osc(5, 10).name(), "vosc_5_10");
    }
}
