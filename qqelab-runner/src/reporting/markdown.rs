//! Markdown report generator.

use std::fmt::Write;

use qqelab_core::TradeRecord;

use super::artifacts::RunManifest;

/// Render the run summary and trade tape.
pub fn render_markdown(manifest: &RunManifest, trades: &[TradeRecord]) -> String {
    let m = &manifest.metrics;
    let s = &m.trades;
    let mut report = String::new();

    // Writing into a String cannot fail; results are ignored below.
    let _ = write!(
        report,
        "# qqelab Run Report\n\n\
Run ID: `{}`\n\n\
- Symbol: {}\n\
- Period: {} → {} ({} bars, warmup {})\n",
        manifest.run_id,
        manifest.symbol,
        manifest.start.format("%Y-%m-%d %H:%M"),
        manifest.end.format("%Y-%m-%d %H:%M"),
        manifest.bar_count,
        manifest.warmup_bars,
    );
    if manifest.has_synthetic {
        report.push_str("- **Data: SYNTHETIC** (seeded random walk)\n");
    }

    let _ = write!(
        report,
        "\n## Summary\n\
- Starting value: {:.2}\n\
- Final value: {:.2}\n\
- P/L: {:+.2}\n\
- Total Return: {:+.2}%\n\
- Max Drawdown: {:.2}% ({:.2})\n\
- Sharpe: {:.2}\n\
- Sortino: {:.2}\n\
- SQN: {:.2}\n",
        m.initial_value,
        m.final_value,
        m.pnl,
        m.total_return * 100.0,
        m.max_drawdown * 100.0,
        m.max_drawdown_money,
        m.sharpe,
        m.sortino,
        m.sqn,
    );

    let _ = write!(
        report,
        "\n## Trades\n\
- Closed: {} (won {}, lost {})\n\
- Win Rate: {:.1}%\n\
- Net PnL: {:+.4}\n\
- Avg win / loss: {:+.4} / {:+.4}\n\
- Profit Factor: {:.2}\n\
- Longest streaks: {} wins, {} losses\n",
        s.total,
        s.won,
        s.lost,
        s.win_rate * 100.0,
        s.net_pnl,
        s.avg_win,
        s.avg_loss,
        s.profit_factor,
        s.max_consecutive_wins,
        s.max_consecutive_losses,
    );
    if manifest.open_position_size > 0.0 {
        let _ = writeln!(
            report,
            "- Open at end: {:.6} units (marked to market, not counted)",
            manifest.open_position_size
        );
    }
    if manifest.skipped_zero_atr > 0 {
        let _ = writeln!(report, "- Bars skipped for zero ATR: {}", manifest.skipped_zero_atr);
    }

    if !trades.is_empty() {
        let mut sorted: Vec<&TradeRecord> = trades.iter().collect();
        sorted.sort_by(|a, b| b.net_pnl.total_cmp(&a.net_pnl));

        report.push_str("\n## Trade Tape\n\n### Top Winners\n");
        push_trade_table(&mut report, sorted.iter().take(5).filter(|t| t.is_winner()));
        report.push_str("\n### Top Losers\n");
        push_trade_table(&mut report, sorted.iter().rev().take(5).filter(|t| !t.is_winner()));
    }
    report
}

fn push_trade_table<'a>(report: &mut String, trades: impl Iterator<Item = &'a &'a TradeRecord>) {
    report.push_str("| Entry | Exit | Entries | Avg Entry | Exit Price | Size | PnL | Return |\n");
    report.push_str("|-------|------|---------|-----------|------------|------|-----|--------|\n");
    for t in trades {
        let _ = writeln!(
            report,
            "| {} | {} | {} | {:.6} | {:.6} | {:.4} | {:+.4} | {:+.2}% |",
            t.entry_time.format("%Y-%m-%d %H:%M"),
            t.exit_time.format("%Y-%m-%d %H:%M"),
            t.entries,
            t.entry_price,
            t.exit_price,
            t.quantity,
            t.net_pnl,
            t.return_pct() * 100.0,
        );
    }
}
