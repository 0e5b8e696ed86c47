use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::catalog::HeroCatalog;
use crate::config::BacktestConfig;
use crate::corpus::IngestStats;
use crate::sweep::{SweepAccumulator, ThresholdStat};

pub fn fraction(value: f64) -> String {
    format!("{value:.4}")
}

pub fn magnitude(value: f64) -> String {
    format!("{value}")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdRow {
    pub condition: String,
    pub threshold: f64,
    pub stat: ThresholdStat,
}

/// One row per (signal, threshold), then the max-hero-advantage rows.
pub fn threshold_rows(acc: &SweepAccumulator) -> Vec<ThresholdRow> {
    let mut rows = Vec::new();
    for sweep in &acc.signals {
        for (threshold, stat) in sweep.thresholds.iter().zip(&sweep.stats) {
            rows.push(ThresholdRow {
                condition: sweep.signal.label().to_string(),
                threshold: *threshold,
                stat: *stat,
            });
        }
    }
    for (threshold, stat) in acc.max_hero.thresholds.iter().zip(&acc.max_hero.stats) {
        rows.push(ThresholdRow {
            condition: "MaxHeroAdv".to_string(),
            threshold: *threshold,
            stat: *stat,
        });
    }
    rows
}

pub fn write_thresholds<W: io::Write>(out: W, acc: &SweepAccumulator) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(["condition", "threshold", "games", "accuracy", "correct"])?;
    for row in threshold_rows(acc) {
        wtr.write_record([
            row.condition,
            magnitude(row.threshold),
            row.stat.games.to_string(),
            fraction(row.stat.accuracy()),
            row.stat.correct.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_rules<W: io::Write>(
    out: W,
    acc: &SweepAccumulator,
    config: &BacktestConfig,
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(["combination", "games", "accuracy", "correct"])?;
    for (rule, stat) in config.rules.iter().zip(&acc.rules.stats) {
        wtr.write_record([
            rule.label(),
            stat.games.to_string(),
            fraction(stat.accuracy()),
            stat.correct.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_delta_bins<W: io::Write>(out: W, acc: &SweepAccumulator) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(["bin", "games", "radiant_win_rate", "dire_win_rate"])?;
    for row in acc.histogram.rows() {
        wtr.write_record([
            row.label,
            row.games.to_string(),
            fraction(row.radiant_win_rate),
            fraction(row.dire_win_rate),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_combinations<W: io::Write>(out: W, acc: &SweepAccumulator) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(["combination", "games", "radiant_win_rate", "dire_win_rate"])?;
    for row in acc.combinations.rows() {
        wtr.write_record([
            row.combination,
            row.games.to_string(),
            fraction(row.radiant_win_rate),
            fraction(row.dire_win_rate),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_hero_advantage<W: io::Write>(
    out: W,
    acc: &SweepAccumulator,
    catalog: &HeroCatalog,
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(["hero_id", "hero_name", "threshold", "games", "accuracy"])?;
    for row in acc.hero_advantage.rows() {
        let name = catalog.hero_name(row.hero).unwrap_or_default();
        for (sign, stat) in [("+", row.positive), ("-", row.negative)] {
            wtr.write_record([
                row.hero.index().to_string(),
                name.to_string(),
                format!("{sign}{}", magnitude(row.threshold)),
                stat.games.to_string(),
                fraction(stat.accuracy()),
            ])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated_at: String,
    pub catalog_update_time: Option<String>,
    pub heroes: usize,
    pub ingest: IngestStats,
    pub processed: u64,
    pub skipped: u64,
    pub cancelled: bool,
    pub config: BacktestConfig,
}

impl RunSummary {
    pub fn new(
        catalog: &HeroCatalog,
        ingest: IngestStats,
        acc: &SweepAccumulator,
        config: &BacktestConfig,
        cancelled: bool,
    ) -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            catalog_update_time: catalog.update_time().map(str::to_string),
            heroes: catalog.len(),
            ingest,
            processed: acc.processed,
            skipped: acc.skipped,
            cancelled,
            config: config.clone(),
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}

fn render(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    f(&mut buf)?;
    Ok(buf)
}

/// Writes every report table into `dir` and returns the written paths.
pub fn write_report_dir(
    dir: &Path,
    catalog: &HeroCatalog,
    acc: &SweepAccumulator,
    config: &BacktestConfig,
    summary: &RunSummary,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("create report dir {}", dir.display()))?;
    let tables: [(&str, Vec<u8>); 6] = [
        ("thresholds.csv", render(|b| write_thresholds(b, acc))?),
        ("rules.csv", render(|b| write_rules(b, acc, config))?),
        ("delta_bins.csv", render(|b| write_delta_bins(b, acc))?),
        ("combinations.csv", render(|b| write_combinations(b, acc))?),
        ("hero_advantage.csv", render(|b| write_hero_advantage(b, acc, catalog))?),
        (
            "summary.json",
            serde_json::to_vec_pretty(summary).context("serialize run summary")?,
        ),
    ];
    let mut written = Vec::with_capacity(tables.len());
    for (name, bytes) in tables {
        let path = dir.join(name);
        write_atomic(&path, &bytes)?;
        written.push(path);
    }
    Ok(written)
}
