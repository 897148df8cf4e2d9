//! CSV in, artifacts out.

use std::io::Write;

use chrono::NaiveDate;
use qqelab_runner::data_loader::generate_synthetic_bars;
use qqelab_runner::{
    load_bars, load_csv, load_run, load_synthetic, run_backtest, ArtifactManager, LoadOptions,
    QqeConfig,
};

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()
}

fn write_price_table(n: usize) -> tempfile::NamedTempFile {
    let bars = generate_synthetic_bars("RVNUSDT", start(), n, 15);
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "datetime,open,high,low,close,volume").unwrap();
    for b in &bars {
        writeln!(
            file,
            "{},{},{},{},{},{}",
            b.timestamp.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        )
        .unwrap();
    }
    file.flush().unwrap();
    file
}

#[test]
fn csv_round_trips_synthetic_bars() {
    let file = write_price_table(300);
    let loaded = load_csv(file.path(), "RVNUSDT", &LoadOptions::default()).unwrap();
    let synthetic = load_synthetic("RVNUSDT", start(), 300, 15);
    assert_eq!(loaded.bars, synthetic.bars);
    assert_eq!(loaded.dataset_hash, synthetic.dataset_hash);
    assert!(!loaded.has_synthetic);
}

#[test]
fn config_date_range_limits_the_run() {
    let file = write_price_table(96 * 4);
    let mut config = QqeConfig::default();
    config.backtest.data = Some(file.path().to_path_buf());
    config.backtest.start = NaiveDate::from_ymd_opt(2022, 1, 2);
    config.backtest.end = NaiveDate::from_ymd_opt(2022, 1, 3);

    let data = load_bars(&config.backtest).unwrap();
    assert_eq!(data.bars.len(), 96 * 2);

    let result = run_backtest(&config, &data).unwrap();
    assert_eq!(result.start.date_naive(), NaiveDate::from_ymd_opt(2022, 1, 2).unwrap());
    assert_eq!(result.end.date_naive(), NaiveDate::from_ymd_opt(2022, 1, 3).unwrap());
}

#[test]
fn artifacts_are_written_and_reloaded() {
    let file = write_price_table(1200);
    let config = QqeConfig::default();
    let data = load_csv(file.path(), "RVNUSDT", &LoadOptions::default()).unwrap();
    let result = run_backtest(&config, &data).unwrap();

    let out = tempfile::tempdir().unwrap();
    let manager = ArtifactManager::new(out.path()).unwrap();
    let paths = manager.save_run(&result).unwrap();

    assert_eq!(paths.run_dir, out.path().join(&result.run_id));
    for path in [
        &paths.manifest,
        &paths.equity_csv,
        &paths.trades_csv,
        &paths.report_markdown,
    ] {
        assert!(path.exists(), "missing {}", path.display());
    }

    let equity = std::fs::read_to_string(&paths.equity_csv).unwrap();
    let mut lines = equity.lines();
    assert_eq!(lines.next(), Some("timestamp,equity"));
    assert_eq!(lines.count(), 1200);

    let (manifest, trades) = load_run(&paths.run_dir).unwrap();
    assert_eq!(manifest.run_id, result.run_id);
    assert_eq!(manifest.config, config);
    assert_eq!(manifest.metrics.trades.total, result.trades.len());
    assert_eq!(manifest.bar_count, 1200);
    assert_eq!(trades, result.trades);

    let report = std::fs::read_to_string(&paths.report_markdown).unwrap();
    assert!(report.contains(&result.run_id));
    assert!(report.contains("## Summary"));
}

#[test]
fn missing_manifest_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_run(dir.path()).is_err());
}
