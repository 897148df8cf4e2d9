//! Bar loading for backtests.
//!
//! Two sources:
//! 1. A CSV price table with a `datetime` column plus open/high/low/close/volume
//! 2. `synthetic`: a deterministic random walk seeded from the symbol name
//!
//! Results on synthetic data are tagged so reports can say so.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use qqelab_core::Bar;

use crate::config::BacktestSection;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("row {row}: unrecognized timestamp '{value}'")]
    BadTimestamp { row: usize, value: String },
    #[error("row {row}: bar fails OHLCV sanity check")]
    InsaneBar { row: usize },
    #[error("no bars in '{path}' within the requested date range")]
    Empty { path: PathBuf },
    #[error("no data source: set backtest.data or use --synthetic")]
    NoSource,
}

/// Options controlling which bars are kept.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Inclusive start date.
    pub start: Option<NaiveDate>,
    /// Inclusive end date.
    pub end: Option<NaiveDate>,
}

impl LoadOptions {
    fn contains(&self, ts: &DateTime<Utc>) -> bool {
        let day = ts.date_naive();
        self.start.map_or(true, |s| day >= s) && self.end.map_or(true, |e| day <= e)
    }
}

/// Loaded bars plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub bars: Vec<Bar>,
    /// BLAKE3 over every bar, for run fingerprinting.
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

impl LoadedData {
    fn new(bars: Vec<Bar>, has_synthetic: bool) -> Self {
        let dataset_hash = compute_dataset_hash(&bars);
        Self {
            bars,
            dataset_hash,
            has_synthetic,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "date", alias = "timestamp")]
    datetime: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Load a CSV price table, sorted by time and filtered to the date range.
pub fn load_csv(path: &Path, symbol: &str, opts: &LoadOptions) -> Result<LoadedData, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let mut bars = Vec::new();
    for (i, record) in reader.deserialize::<CsvRow>().enumerate() {
        // Header is line 1.
        let row = i + 2;
        let record = record.map_err(csv_err)?;
        let timestamp = parse_timestamp(&record.datetime).ok_or_else(|| LoadError::BadTimestamp {
            row,
            value: record.datetime.clone(),
        })?;
        if !opts.contains(&timestamp) {
            continue;
        }
        let bar = Bar {
            timestamp,
            symbol: symbol.to_string(),
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
        };
        if !bar.is_sane() {
            return Err(LoadError::InsaneBar { row });
        }
        bars.push(bar);
    }

    if bars.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }
    bars.sort_by_key(|b| b.timestamp);
    let before = bars.len();
    bars.dedup_by_key(|b| b.timestamp);
    if bars.len() < before {
        warn!(dropped = before - bars.len(), "duplicate timestamps dropped");
    }

    info!(
        path = %path.display(),
        bars = bars.len(),
        first = %bars[0].timestamp,
        last = %bars[bars.len() - 1].timestamp,
        "loaded price table"
    );
    Ok(LoadedData::new(bars, false))
}

/// Load bars as configured by a `[backtest]` section.
///
/// `synthetic = true` wins over a CSV path. Synthetic bars start at
/// `start`, or 2022-01-01 when unset.
pub fn load_bars(section: &BacktestSection) -> Result<LoadedData, LoadError> {
    if section.synthetic {
        let start = section
            .start
            .or_else(|| NaiveDate::from_ymd_opt(2022, 1, 1))
            .unwrap_or_default();
        return Ok(load_synthetic(
            &section.symbol,
            start,
            section.synthetic_bars,
            section.interval_minutes,
        ));
    }
    let path = section.data.as_deref().ok_or(LoadError::NoSource)?;
    let opts = LoadOptions {
        start: section.start,
        end: section.end,
    };
    load_csv(path, &section.symbol, &opts)
}

/// Parse RFC 3339, `YYYY-MM-DD HH:MM:SS`, or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Synthetic bars for development runs, tagged as synthetic.
pub fn load_synthetic(
    symbol: &str,
    start: NaiveDate,
    count: usize,
    interval_minutes: i64,
) -> LoadedData {
    warn!(symbol, "generating synthetic data, results will be tagged as synthetic");
    LoadedData::new(
        generate_synthetic_bars(symbol, start, count, interval_minutes),
        true,
    )
}

/// Deterministic BLAKE3 hash over all bar data.
pub fn compute_dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(bar.symbol.as_bytes());
        hasher.update(&bar.timestamp.timestamp().to_le_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Random walk from 1.0 with per-bar returns in ±2%.
///
/// Seeded from the symbol name, so the same symbol always gives the same bars.
pub fn generate_synthetic_bars(
    symbol: &str,
    start: NaiveDate,
    count: usize,
    interval_minutes: i64,
) -> Vec<Bar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed_bytes = blake3::hash(symbol.as_bytes());
    let seed: [u8; 32] = *seed_bytes.as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let origin = start
        .and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or_default();
    let mut bars = Vec::with_capacity(count);
    let mut price = 1.0_f64;

    for i in 0..count {
        let ret: f64 = rng.gen_range(-0.02..0.02);
        let open = price;
        let close = price * (1.0 + ret);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.005));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.005));
        let volume = rng.gen_range(10_000.0..1_000_000.0);

        bars.push(Bar {
            timestamp: origin + Duration::minutes(interval_minutes * i as i64),
            symbol: symbol.to_string(),
            open,
            high,
            low,
            close,
            volume,
        });
        price = close;
    }
    bars
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const SAMPLE: &str = "\
datetime,open,high,low,close,volume
2022-01-02 00:00:00,1.0,1.2,0.9,1.1,500
2022-01-01 00:15:00,1.0,1.1,0.9,1.0,400
2022-01-01 00:00:00,1.0,1.1,0.9,1.0,300
2022-01-03T00:00:00Z,1.1,1.3,1.0,1.2,600
";

    #[test]
    fn loads_and_sorts() {
        let file = write_csv(SAMPLE);
        let loaded = load_csv(file.path(), "RVNUSDT", &LoadOptions::default()).unwrap();
        assert_eq!(loaded.bars.len(), 4);
        assert!(loaded.bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(loaded.bars[0].volume, 300.0);
        assert_eq!(loaded.bars[3].close, 1.2);
        assert!(!loaded.has_synthetic);
    }

    #[test]
    fn date_range_is_inclusive() {
        let file = write_csv(SAMPLE);
        let opts = LoadOptions {
            start: NaiveDate::from_ymd_opt(2022, 1, 1),
            end: NaiveDate::from_ymd_opt(2022, 1, 2),
        };
        let loaded = load_csv(file.path(), "RVNUSDT", &opts).unwrap();
        assert_eq!(loaded.bars.len(), 3);
    }

    #[test]
    fn empty_range_is_an_error() {
        let file = write_csv(SAMPLE);
        let opts = LoadOptions {
            start: NaiveDate::from_ymd_opt(2023, 1, 1),
            end: None,
        };
        assert!(matches!(
            load_csv(file.path(), "RVNUSDT", &opts),
            Err(LoadError::Empty { .. })
        ));
    }

    #[test]
    fn bad_timestamp_reports_row() {
        let file = write_csv("datetime,open,high,low,close,volume\nyesterday,1,1,1,1,1\n");
        let err = load_csv(file.path(), "X", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::BadTimestamp { row: 2, .. }), "{err}");
    }

    #[test]
    fn insane_bar_is_rejected() {
        let file = write_csv("datetime,open,high,low,close,volume\n2022-01-01,1.0,0.5,0.9,1.0,10\n");
        let err = load_csv(file.path(), "X", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::InsaneBar { row: 2 }));
    }

    #[test]
    fn timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2022, 1, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2022-01-01 12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2022-01-01T12:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2022-01-01T14:30:00+02:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2022-01-01"),
            Some(Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("01/01/2022"), None);
    }

    #[test]
    fn synthetic_data_is_deterministic() {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let a = generate_synthetic_bars("RVNUSDT", start, 300, 15);
        let b = generate_synthetic_bars("RVNUSDT", start, 300, 15);
        assert_eq!(a, b);
        assert!(a.iter().all(|bar| bar.is_sane()));
        assert_eq!(a[1].timestamp - a[0].timestamp, Duration::minutes(15));
    }

    #[test]
    fn different_symbols_get_different_synthetic_data() {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let a = generate_synthetic_bars("RVNUSDT", start, 50, 15);
        let b = generate_synthetic_bars("FLOKIUSDT", start, 50, 15);
        assert_ne!(a[10].close, b[10].close);
    }

    #[test]
    fn dataset_hash_is_deterministic() {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let a = load_synthetic("RVNUSDT", start, 100, 15);
        let b = load_synthetic("RVNUSDT", start, 100, 15);
        assert_eq!(a.dataset_hash, b.dataset_hash);
        assert!(a.has_synthetic);
        let c = load_synthetic("RVNUSDT", start, 101, 15);
        assert_ne!(a.dataset_hash, c.dataset_hash);
    }

    #[test]
    fn load_bars_needs_a_source() {
        let section = BacktestSection::default();
        assert!(matches!(load_bars(&section), Err(LoadError::NoSource)));

        let synthetic = BacktestSection {
            synthetic: true,
            synthetic_bars: 30,
            ..BacktestSection::default()
        };
        let data = load_bars(&synthetic).unwrap();
        assert_eq!(data.bars.len(), 30);
        assert!(data.has_synthetic);
    }
}
