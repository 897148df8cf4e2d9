//! Artifact manager for persisting run outputs.
//!
//! Layout under the output directory:
//! ```text
//! <run_id>/manifest.json
//! <run_id>/equity.csv
//! <run_id>/trades.csv
//! <run_id>/report.md
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use qqelab_core::TradeRecord;

use crate::config::QqeConfig;
use crate::metrics::PerformanceMetrics;
use crate::runner::{BacktestResult, EquityPoint};

use super::markdown::render_markdown;

/// Run summary persisted as `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub symbol: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub bar_count: usize,
    pub warmup_bars: usize,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub open_position_size: f64,
    pub skipped_zero_atr: usize,
    pub config: QqeConfig,
    pub metrics: PerformanceMetrics,
}

impl RunManifest {
    pub fn from_result(result: &BacktestResult) -> Self {
        Self {
            schema_version: result.schema_version,
            run_id: result.run_id.clone(),
            created_at: Utc::now(),
            symbol: result.symbol.clone(),
            start: result.start,
            end: result.end,
            bar_count: result.bar_count,
            warmup_bars: result.warmup_bars,
            dataset_hash: result.dataset_hash.clone(),
            has_synthetic: result.has_synthetic,
            open_position_size: result.open_position_size,
            skipped_zero_atr: result.skipped_zero_atr,
            config: result.config.clone(),
            metrics: result.metrics.clone(),
        }
    }
}

/// Artifact paths returned after export.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub run_dir: PathBuf,
    pub manifest: PathBuf,
    pub equity_csv: PathBuf,
    pub trades_csv: PathBuf,
    pub report_markdown: PathBuf,
}

/// Manages writing all artifacts for a run.
#[derive(Debug, Clone)]
pub struct ArtifactManager {
    output_dir: PathBuf,
}

impl ArtifactManager {
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir)
            .context("Failed to create artifact output directory")?;
        Ok(Self { output_dir })
    }

    /// Save complete run artifacts.
    pub fn save_run(&self, result: &BacktestResult) -> Result<ArtifactPaths> {
        let run_dir = self.output_dir.join(&result.run_id);
        std::fs::create_dir_all(&run_dir).context("Failed to create run artifact directory")?;

        let manifest = RunManifest::from_result(result);
        let manifest_path = run_dir.join("manifest.json");
        write_manifest(&manifest_path, &manifest)?;

        let equity_csv = run_dir.join("equity.csv");
        write_equity_csv(&equity_csv, &result.equity_curve)?;

        let trades_csv = run_dir.join("trades.csv");
        write_trades_csv(&trades_csv, &result.trades)?;

        let report_markdown = run_dir.join("report.md");
        std::fs::write(&report_markdown, render_markdown(&manifest, &result.trades))
            .with_context(|| format!("Failed to write report to {}", report_markdown.display()))?;

        Ok(ArtifactPaths {
            run_dir,
            manifest: manifest_path,
            equity_csv,
            trades_csv,
            report_markdown,
        })
    }
}

/// Read a saved run's manifest and trades back from `run_dir`.
pub fn load_run(run_dir: &Path) -> Result<(RunManifest, Vec<TradeRecord>)> {
    let manifest_path = run_dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
    let manifest: RunManifest =
        serde_json::from_str(&json).context("Failed to parse run manifest")?;

    let trades_path = run_dir.join("trades.csv");
    let trades = if trades_path.exists() {
        read_trades_csv(&trades_path)?
    } else {
        Vec::new()
    };
    Ok((manifest, trades))
}

fn write_manifest(path: &Path, manifest: &RunManifest) -> Result<()> {
    let json =
        serde_json::to_string_pretty(manifest).context("Failed to serialize run manifest")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write manifest to {}", path.display()))?;
    Ok(())
}

fn write_equity_csv(path: &Path, equity: &[EquityPoint]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create equity CSV {}", path.display()))?;
    for point in equity {
        writer.serialize(point)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_trades_csv(path: &Path, trades: &[TradeRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create trades CSV {}", path.display()))?;
    for trade in trades {
        writer.serialize(trade)?;
    }
    writer.flush()?;
    Ok(())
}

fn read_trades_csv(path: &Path) -> Result<Vec<TradeRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open trades CSV {}", path.display()))?;
    let trades = reader
        .deserialize()
        .collect::<Result<Vec<TradeRecord>, _>>()
        .context("Failed to parse trades CSV")?;
    Ok(trades)
}
