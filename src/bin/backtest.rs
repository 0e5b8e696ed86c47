use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use counterpick::catalog::load_catalog;
use counterpick::config::BacktestConfig;
use counterpick::corpus::load_corpus;
use counterpick::report::{RunSummary, fraction, threshold_rows, write_report_dir};
use counterpick::roles::AssignmentStrategy;
use counterpick::sweep::Backtest;

#[derive(Parser)]
#[command(name = "backtest")]
#[command(about = "Sweep prediction thresholds over a historical match corpus")]
#[command(version)]
struct Cli {
    /// Catalog JSON files, layered in order
    #[arg(long, required = true, num_args = 1..)]
    catalog: Vec<PathBuf>,

    /// Match corpus CSV (match_id, dire_heroes, radiant_heroes, radiant_win)
    #[arg(long)]
    matches: PathBuf,

    /// Backtest configuration JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for report tables
    #[arg(long, default_value = "./backtest_out")]
    out: PathBuf,

    #[arg(long)]
    strategy: Option<AssignmentStrategy>,

    /// Worker threads for the sweep
    #[arg(long)]
    workers: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = match &cli.config {
        Some(path) => BacktestConfig::load(path)
            .with_context(|| format!("load backtest config {}", path.display()))?,
        None => BacktestConfig::default(),
    };
    config.apply_env_overrides();
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy;
    }
    if let Some(workers) = cli.workers {
        config.workers = Some(workers);
    }
    config.validate().context("validate backtest config")?;

    let catalog = load_catalog(&cli.catalog).context("load hero catalog")?;
    let corpus = load_corpus(&catalog, &cli.matches)
        .with_context(|| format!("load match corpus {}", cli.matches.display()))?;

    // Ctrl-C stops the sweep; the partial counters are still reported.
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .context("install Ctrl-C handler")?;

    let started = Instant::now();
    let acc = Backtest::new(&catalog, &config).run_cancellable(&corpus.records, &cancel);
    let cancelled = cancel.load(Ordering::Relaxed);
    tracing::info!(
        strategy = %config.strategy,
        elapsed_ms = started.elapsed().as_millis() as u64,
        cancelled,
        "backtest complete"
    );
    if cancelled {
        tracing::warn!(
            processed = acc.processed,
            records = corpus.records.len(),
            "backtest interrupted, writing partial report"
        );
    }

    let summary = RunSummary::new(&catalog, corpus.stats, &acc, &config, cancelled);
    let written = write_report_dir(&cli.out, &catalog, &acc, &config, &summary)?;

    println!(
        "processed {} matches ({} rows skipped at ingest, {} at scoring)",
        acc.processed,
        corpus.stats.skipped(),
        acc.skipped
    );
    println!("{:<12} {:>9} {:>7} {:>9}", "condition", "threshold", "games", "accuracy");
    for row in threshold_rows(&acc) {
        if row.stat.games == 0 {
            continue;
        }
        println!(
            "{:<12} {:>9} {:>7} {:>9}",
            row.condition,
            row.threshold,
            row.stat.games,
            fraction(row.stat.accuracy())
        );
    }
    for path in written {
        println!("wrote {}", path.display());
    }
    Ok(())
}
