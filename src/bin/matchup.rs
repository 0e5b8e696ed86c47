use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use counterpick::catalog::load_catalog;
use counterpick::config::strategy_from_env;
use counterpick::corpus::resolve_roster;
use counterpick::matchup::explain_matchup;
use counterpick::roles::AssignmentStrategy;
use counterpick::score::Side;

#[derive(Parser)]
#[command(name = "matchup")]
#[command(about = "Score one five-versus-five matchup and explain the result")]
#[command(version)]
struct Cli {
    /// Catalog JSON files, layered in order
    #[arg(long, required = true, num_args = 1..)]
    catalog: Vec<PathBuf>,

    /// Pipe-delimited radiant roster
    #[arg(long)]
    radiant: String,

    /// Pipe-delimited dire roster
    #[arg(long)]
    dire: String,

    /// Role assignment strategy; falls back to COUNTERPICK_STRATEGY, then exhaustive
    #[arg(long)]
    strategy: Option<AssignmentStrategy>,

    /// Print the breakdown as JSON
    #[arg(long)]
    json: bool,

    #[arg(long, default_value = "warn")]
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

    let catalog = load_catalog(&cli.catalog).context("load hero catalog")?;
    let radiant = resolve_roster(&catalog, &cli.radiant, Side::Radiant)?;
    let dire = resolve_roster(&catalog, &cli.dire, Side::Dire)?;
    let strategy = cli.strategy.or_else(strategy_from_env).unwrap_or_default();
    let explained = explain_matchup(&catalog, &radiant, &dire, strategy)?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&explained).context("serialize breakdown")?
        );
    } else {
        print!("{}", explained.render());
    }
    Ok(())
}
