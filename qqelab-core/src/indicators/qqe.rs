//! QQE composite momentum line.
//!
//! rsi = RSI(close, period)
//! atr = ATR(fast)
//! dar = EMA(atr - q, 2*period - 1) where atr > 0, else 0
//! qqe = rsi + dar when rsi != 0 and dar != 0, else 0
//!
//! Each of the four lines is exposed as its own indicator instance.

use crate::components::indicator::Indicator;
use crate::domain::Bar;
use crate::indicators::atr::Atr;
use crate::indicators::ema::ema_of_series;
use crate::indicators::rsi::Rsi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QqeLine {
    Rsi,
    Atr,
    Dar,
    Qqe,
}

#[derive(Debug, Clone)]
pub struct Qqe {
    period: usize,
    fast: usize,
    q: f64,
    line: QqeLine,
    name: String,
}

impl Qqe {
    pub fn new(period: usize, fast: usize, q: f64, line: QqeLine) -> Self {
        assert!(period >= 1 && fast >= 1, "QQE periods must be >= 1");
        let name = match line {
            QqeLine::Rsi => format!("qqe_rsi_{period}"),
            QqeLine::Atr => format!("qqe_atr_{fast}"),
            QqeLine::Dar => format!("qqe_dar_{period}_{fast}_{q}"),
            QqeLine::Qqe => format!("qqe_{period}_{fast}_{q}"),
        };
        Self {
            period,
            fast,
            q,
            line,
            name,
        }
    }

    fn dar_period(&self) -> usize {
        2 * self.period - 1
    }

    fn dar_series(&self, atr: &[f64]) -> Vec<f64> {
        let shifted: Vec<f64> = atr.iter().map(|a| a - self.q).collect();
        let smoothed = ema_of_series(&shifted, self.dar_period());
        atr.iter()
            .zip(&smoothed)
            .map(|(&a, &d)| {
                if a.is_nan() {
                    f64::NAN
                } else if a > 0.0 {
                    d
                } else {
                    0.0
                }
            })
            .collect()
    }
}

impl Indicator for Qqe {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        let dar = self.fast + self.dar_period() - 1;
        match self.line {
            QqeLine::Rsi => self.period,
            QqeLine::Atr => self.fast,
            QqeLine::Dar => dar,
            QqeLine::Qqe => self.period.max(dar),
        }
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        match self.line {
            QqeLine::Rsi => Rsi::new(self.period).compute(bars),
            QqeLine::Atr => Atr::new(self.fast).compute(bars),
            QqeLine::Dar => self.dar_series(&Atr::new(self.fast).compute(bars)),
            QqeLine::Qqe => {
                let rsi = Rsi::new(self.period).compute(bars);
                let dar = self.dar_series(&Atr::new(self.fast).compute(bars));
                rsi.iter()
                    .zip(&dar)
                    .map(|(&r, &d)| qqe_value(r, d))
                    .collect()
            }
        }
    }
}

/// Combine RSI and DAR into the QQE line. Either input at zero gates the
/// line to zero.
pub fn qqe_value(rsi: f64, dar: f64) -> f64 {
    if rsi.is_nan() || dar.is_nan() {
        return f64::NAN;
    }
    if rsi != 0.0 && dar != 0.0 {
        rsi + dar
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    fn zigzag(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + (i % 4) as f64 * 5.0 - (i % 3) as f64 * 2.0)
            .collect()
    }

    #[test]
    fn qqe_value_gating() {
        assert_eq!(qqe_value(0.0, 4.0), 0.0);
        assert_eq!(qqe_value(60.0, 0.0), 0.0);
        assert_approx(qqe_value(60.0, 4.0), 64.0, DEFAULT_EPSILON);
        assert_approx(qqe_value(60.0, -2.5), 57.5, DEFAULT_EPSILON);
        assert!(qqe_value(f64::NAN, 1.0).is_nan());
    }

    #[test]
    fn flat_bars_gate_dar_to_zero() {
        // Fully flat OHLC: ATR = 0 → DAR = 0 → QQE = 0.
        let mut bars = make_bars(&[100.0; 30]);
        for b in &mut bars {
            b.high = 100.0;
            b.low = 100.0;
        }
        let q = Qqe::new(6, 5, 3.0, QqeLine::Qqe);
        let dar = Qqe::new(6, 5, 3.0, QqeLine::Dar).compute(&bars);
        let qqe = q.compute(&bars);
        for t in 5..30 {
            assert_eq!(dar[t], 0.0, "dar at {t}");
        }
        for t in 6..30 {
            assert_eq!(qqe[t], 0.0, "qqe at {t}");
        }
    }

    #[test]
    fn dar_is_ema_of_shifted_atr() {
        let bars = make_bars(&zigzag(40));
        let atr = Qqe::new(6, 5, 3.0, QqeLine::Atr).compute(&bars);
        let dar = Qqe::new(6, 5, 3.0, QqeLine::Dar).compute(&bars);
        let shifted: Vec<f64> = atr.iter().map(|a| a - 3.0).collect();
        let expected = ema_of_series(&shifted, 11);
        for t in 0..40 {
            if expected[t].is_nan() {
                assert!(dar[t].is_nan());
            } else {
                assert_approx(dar[t], expected[t], DEFAULT_EPSILON);
            }
        }
    }

    #[test]
    fn qqe_is_rsi_plus_dar_after_warmup() {
        let bars = make_bars(&zigzag(40));
        let rsi = Qqe::new(6, 5, 3.0, QqeLine::Rsi).compute(&bars);
        let dar = Qqe::new(6, 5, 3.0, QqeLine::Dar).compute(&bars);
        let q = Qqe::new(6, 5, 3.0, QqeLine::Qqe);
        let qqe = q.compute(&bars);
        let lb = q.lookback();
        assert!(qqe[lb - 1].is_nan());
        for t in lb..40 {
            assert_approx(qqe[t], qqe_value(rsi[t], dar[t]), DEFAULT_EPSILON);
        }
    }

    #[test]
    fn default_lookback() {
        // dar: ATR(5) valid at 5, EMA(11) seeded 10 bars later.
        let q = Qqe::new(6, 5, 3.0, QqeLine::Qqe);
        assert_eq!(q.lookback(), 15);
        assert_eq!(q.name(), "qqe_6_5_3");
    }
}
