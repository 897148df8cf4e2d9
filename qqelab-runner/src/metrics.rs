//! Performance metrics: pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity curve and/or trade list in, scalar out.
//! Bars are intraday and markets trade around the clock, so ratios are
//! annualized with a periods-per-year figure derived from the bar spacing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use qqelab_core::TradeRecord;

const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 3600.0;

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub initial_value: f64,
    pub final_value: f64,
    /// final_value - initial_value.
    pub pnl: f64,
    pub total_return: f64,
    /// Negative fraction, e.g. -0.15 for a 15% drawdown.
    pub max_drawdown: f64,
    /// Largest peak-to-trough fall, in account currency.
    pub max_drawdown_money: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub sqn: f64,
    pub periods_per_year: f64,
    pub trades: TradeStats,
}

/// Trade analyzer statistics over closed cycles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    pub total: usize,
    pub won: usize,
    pub lost: usize,
    pub win_rate: f64,
    pub gross_pnl: f64,
    pub net_pnl: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub avg_bars_held: f64,
}

impl TradeStats {
    pub fn compute(trades: &[TradeRecord]) -> Self {
        let wins: Vec<f64> = trades.iter().filter(|t| t.is_winner()).map(|t| t.net_pnl).collect();
        let losses: Vec<f64> = trades.iter().filter(|t| !t.is_winner()).map(|t| t.net_pnl).collect();
        Self {
            total: trades.len(),
            won: wins.len(),
            lost: losses.len(),
            win_rate: win_rate(trades),
            gross_pnl: trades.iter().map(|t| t.gross_pnl).sum(),
            net_pnl: trades.iter().map(|t| t.net_pnl).sum(),
            avg_win: mean_f64(&wins),
            avg_loss: mean_f64(&losses),
            profit_factor: profit_factor(trades),
            max_consecutive_wins: max_consecutive_wins(trades),
            max_consecutive_losses: max_consecutive_losses(trades),
            avg_bars_held: mean_f64(&trades.iter().map(|t| t.bars_held as f64).collect::<Vec<_>>()),
        }
    }
}

impl PerformanceMetrics {
    /// Compute all metrics from an equity curve and trade list.
    pub fn compute(
        equity_curve: &[f64],
        trades: &[TradeRecord],
        initial_capital: f64,
        periods_per_year: f64,
    ) -> Self {
        let final_value = equity_curve.last().copied().unwrap_or(initial_capital);
        Self {
            initial_value: initial_capital,
            final_value,
            pnl: final_value - initial_capital,
            total_return: total_return(equity_curve),
            max_drawdown: max_drawdown(equity_curve),
            max_drawdown_money: max_drawdown_money(equity_curve),
            sharpe: sharpe_ratio(equity_curve, 0.0, periods_per_year),
            sortino: sortino_ratio(equity_curve, 0.0, periods_per_year),
            sqn: sqn(trades),
            periods_per_year,
            trades: TradeStats::compute(trades),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Bars per year implied by the median spacing of `timestamps`.
///
/// Falls back to 15-minute bars when fewer than two timestamps are given.
pub fn periods_per_year(timestamps: &[DateTime<Utc>]) -> f64 {
    let mut gaps: Vec<i64> = timestamps
        .windows(2)
        .map(|w| (w[1] - w[0]).num_seconds())
        .filter(|&s| s > 0)
        .collect();
    if gaps.is_empty() {
        return SECONDS_PER_YEAR / 900.0;
    }
    gaps.sort_unstable();
    let median = gaps[gaps.len() / 2] as f64;
    SECONDS_PER_YEAR / median
}

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&initial), Some(&final_eq)) if equity_curve.len() >= 2 && initial > 0.0 => {
            (final_eq - initial) / initial
        }
        _ => 0.0,
    }
}

/// Annualized Sharpe ratio from per-bar returns.
///
/// Sharpe = mean(bar returns - rf) / std(bar returns) * sqrt(periods_per_year).
/// Returns 0.0 if variance is zero or fewer than 2 bars.
pub fn sharpe_ratio(equity_curve: &[f64], risk_free_rate: f64, periods_per_year: f64) -> f64 {
    let returns = bar_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let bar_rf = risk_free_rate / periods_per_year;
    let excess: Vec<f64> = returns.iter().map(|r| r - bar_rf).collect();
    let mean = mean_f64(&excess);
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    (mean / std) * periods_per_year.sqrt()
}

/// Annualized Sortino ratio (downside deviation only).
pub fn sortino_ratio(equity_curve: &[f64], risk_free_rate: f64, periods_per_year: f64) -> f64 {
    let returns = bar_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let bar_rf = risk_free_rate / periods_per_year;
    let excess: Vec<f64> = returns.iter().map(|r| r - bar_rf).collect();
    let mean = mean_f64(&excess);

    let downside_sq: Vec<f64> = excess.iter().filter(|&&r| r < 0.0).map(|r| r * r).collect();
    if downside_sq.is_empty() {
        return 0.0;
    }

    let downside_std = (downside_sq.iter().sum::<f64>() / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    (mean / downside_std) * periods_per_year.sqrt()
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

/// Maximum drawdown in account currency (non-negative).
pub fn max_drawdown_money(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        max_dd = max_dd.max(peak - eq);
    }
    max_dd
}

/// System Quality Number: sqrt(n) * mean(net pnl) / std(net pnl).
///
/// Returns 0.0 with fewer than two trades or zero dispersion.
pub fn sqn(trades: &[TradeRecord]) -> f64 {
    if trades.len() < 2 {
        return 0.0;
    }
    let pnl: Vec<f64> = trades.iter().map(|t| t.net_pnl).collect();
    let std = std_dev(&pnl);
    if std < 1e-15 {
        return 0.0;
    }
    (trades.len() as f64).sqrt() * mean_f64(&pnl) / std
}

/// Win rate: fraction of trades that were winners.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Profit factor: gross profits / gross losses.
///
/// Capped at 100.0 for edge cases (all winners, zero losses).
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades
        .iter()
        .filter(|t| t.net_pnl > 0.0)
        .map(|t| t.net_pnl)
        .sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.net_pnl < 0.0)
        .map(|t| t.net_pnl.abs())
        .sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

/// Maximum consecutive winning trades.
pub fn max_consecutive_wins(trades: &[TradeRecord]) -> usize {
    max_consecutive(trades, true)
}

/// Maximum consecutive losing trades.
pub fn max_consecutive_losses(trades: &[TradeRecord]) -> usize {
    max_consecutive(trades, false)
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Per-bar simple returns from an equity curve.
pub fn bar_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn max_consecutive(trades: &[TradeRecord], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for trade in trades {
        if trade.is_winner() == winners {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn make_trade(net_pnl: f64) -> TradeRecord {
        let t = Utc.with_ymd_and_hms(2022, 1, 3, 0, 0, 0).unwrap();
        TradeRecord {
            symbol: "RVNUSDT".into(),
            entry_bar: 0,
            entry_time: t,
            entry_price: 100.0,
            entries: 1,
            exit_bar: 5,
            exit_time: t + Duration::minutes(75),
            exit_price: 100.0 + net_pnl / 50.0,
            quantity: 50.0,
            gross_pnl: net_pnl,
            commission: 0.0,
            net_pnl,
            bars_held: 5,
        }
    }

    // ── Periods per year ──

    #[test]
    fn fifteen_minute_bars() {
        let t = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
        let ts: Vec<_> = (0..10).map(|i| t + Duration::minutes(15 * i)).collect();
        assert!((periods_per_year(&ts) - 35_064.0).abs() < 1e-6);
    }

    #[test]
    fn periods_per_year_ignores_a_gap() {
        let t = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
        let mut ts: Vec<_> = (0..10).map(|i| t + Duration::hours(i)).collect();
        ts.push(t + Duration::days(3));
        assert!((periods_per_year(&ts) - 8_766.0).abs() < 1e-6);
    }

    // ── Total return ──

    #[test]
    fn total_return_positive() {
        let eq = vec![1000.0, 1005.0, 1010.0, 1100.0];
        assert!((total_return(&eq) - 0.1).abs() < 1e-10);
    }

    #[test]
    fn total_return_single_bar() {
        assert_eq!(total_return(&[1000.0]), 0.0);
        assert_eq!(total_return(&[]), 0.0);
    }

    // ── Sharpe / Sortino ──

    #[test]
    fn sharpe_constant_equity_is_zero() {
        let eq = vec![1000.0; 100];
        assert_eq!(sharpe_ratio(&eq, 0.0, 35_064.0), 0.0);
    }

    #[test]
    fn sharpe_scales_with_sqrt_periods() {
        let mut eq = vec![1000.0];
        for i in 1..200 {
            let r = if i % 2 == 0 { 1.002 } else { 0.9995 };
            eq.push(eq[i - 1] * r);
        }
        let daily = sharpe_ratio(&eq, 0.0, 365.0);
        let hourly = sharpe_ratio(&eq, 0.0, 365.0 * 24.0);
        assert!(daily > 0.0);
        assert!((hourly / daily - 24.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn sortino_no_downside_is_zero() {
        let eq: Vec<f64> = (0..100).map(|i| 1000.0 + i as f64).collect();
        assert_eq!(sortino_ratio(&eq, 0.0, 365.0), 0.0);
    }

    // ── Drawdown ──

    #[test]
    fn max_drawdown_known() {
        let eq = vec![1000.0, 1100.0, 900.0, 950.0];
        let expected = (900.0 - 1100.0) / 1100.0;
        assert!((max_drawdown(&eq) - expected).abs() < 1e-10);
        assert!((max_drawdown_money(&eq) - 200.0).abs() < 1e-10);
    }

    #[test]
    fn max_drawdown_monotonic_increase() {
        let eq: Vec<f64> = (0..100).map(|i| 1000.0 + i as f64).collect();
        assert_eq!(max_drawdown(&eq), 0.0);
        assert_eq!(max_drawdown_money(&eq), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    // ── SQN ──

    #[test]
    fn sqn_known_value() {
        // pnl 1, 2, 3: mean 2, sample std 1 → sqrt(3) * 2
        let trades = vec![make_trade(1.0), make_trade(2.0), make_trade(3.0)];
        assert!((sqn(&trades) - 3.0_f64.sqrt() * 2.0).abs() < 1e-10);
    }

    #[test]
    fn sqn_needs_two_trades() {
        assert_eq!(sqn(&[make_trade(5.0)]), 0.0);
        assert_eq!(sqn(&[make_trade(5.0), make_trade(5.0)]), 0.0);
    }

    // ── Trade stats ──

    #[test]
    fn trade_stats_mixed() {
        let trades = vec![
            make_trade(10.0),
            make_trade(20.0),
            make_trade(-5.0),
            make_trade(-5.0),
            make_trade(-5.0),
            make_trade(30.0),
        ];
        let stats = TradeStats::compute(&trades);
        assert_eq!(stats.total, 6);
        assert_eq!(stats.won, 3);
        assert_eq!(stats.lost, 3);
        assert!((stats.win_rate - 0.5).abs() < 1e-10);
        assert!((stats.net_pnl - 45.0).abs() < 1e-10);
        assert!((stats.avg_win - 20.0).abs() < 1e-10);
        assert!((stats.avg_loss + 5.0).abs() < 1e-10);
        assert!((stats.profit_factor - 4.0).abs() < 1e-10);
        assert_eq!(stats.max_consecutive_wins, 2);
        assert_eq!(stats.max_consecutive_losses, 3);
        assert!((stats.avg_bars_held - 5.0).abs() < 1e-10);
    }

    #[test]
    fn profit_factor_caps_without_losses() {
        assert_eq!(profit_factor(&[make_trade(5.0)]), 100.0);
        assert_eq!(profit_factor(&[]), 0.0);
    }

    #[test]
    fn compute_reports_final_value_and_pnl() {
        let eq = vec![1000.0, 990.0, 1016.0];
        let m = PerformanceMetrics::compute(&eq, &[make_trade(16.0)], 1000.0, 35_064.0);
        assert_eq!(m.final_value, 1016.0);
        assert!((m.pnl - 16.0).abs() < 1e-10);
        assert!((m.max_drawdown_money - 10.0).abs() < 1e-10);
        assert_eq!(m.trades.total, 1);
    }
}
