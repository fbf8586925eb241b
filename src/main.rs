use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use options_enrich::config::PipelineConfig;
use options_enrich::data::layout;
use options_enrich::pipeline::report::RunReport;
use options_enrich::{fair_value, fetch_data, pipeline, schema};

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose);
    let today = Utc::now().date_naive();

    match cli.command {
        cli::Command::Schema => schema::run(),
        cli::Command::Enrich { buckets } => {
            let config = load_config(&cli.config)?;
            enrich(&config, buckets.as_deref(), today).map(|_| ())
        }
        cli::Command::Fetch => {
            let config = load_config(&cli.config)?;
            fetch_data::run(&config).map(|_| ())
        }
        cli::Command::Snapshot => {
            let config = load_config(&cli.config)?;
            snapshot(&config, today)
        }
        cli::Command::FairValue => {
            let config = load_config(&cli.config)?;
            fair_value::run(&config, today).map(|_| ())
        }
        cli::Command::BasketFairValue => {
            let config = load_config(&cli.config)?;
            basket_fair_value(&config, today)
        }
        cli::Command::Pipeline { buckets } => {
            let config = load_config(&cli.config)?;
            run_pipeline(&config, buckets.as_deref(), today)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn load_config(path: &Path) -> Result<PipelineConfig> {
    PipelineConfig::load(path).with_context(|| format!("loading config {}", path.display()))
}

fn enrich(config: &PipelineConfig, buckets: Option<&Path>, today: NaiveDate) -> Result<RunReport> {
    let report = pipeline::run(config, buckets, today)?;
    report.print_table();
    report.print_buckets();
    if !report.outcomes.is_empty() && report.succeeded() == 0 {
        bail!("all {} tickers failed", report.failed());
    }
    Ok(report)
}

fn snapshot(config: &PipelineConfig, today: NaiveDate) -> Result<()> {
    let date = config.resolve_valuation_date(today)?;
    let moved = layout::snapshot(&config.outdir(), date)?;
    info!(
        moved = moved.len(),
        dir = %layout::snapshot_dir(&config.outdir(), date).display(),
        "snapshot complete"
    );
    Ok(())
}

fn basket_fair_value(config: &PipelineConfig, today: NaiveDate) -> Result<()> {
    let report = fair_value::basket::run(config, today)?;
    report.print_table();
    Ok(())
}

fn run_pipeline(config: &PipelineConfig, buckets: Option<&Path>, today: NaiveDate) -> Result<()> {
    // Check buckets before spending time on the network.
    config.resolve_buckets(buckets)?;

    let fetched = fetch_data::run(config)?;
    if fetched.is_empty() && !config.tickers.is_empty() {
        warn!("no chains fetched, enriching whatever is already on disk");
    }
    enrich(config, buckets, today)?;
    snapshot(config, today)?;

    if config.portfolio_file.is_some() {
        fair_value::run(config, today)?;
    } else {
        info!("no portfolio_file configured, skipping fair value");
    }
    if config.basket_portfolio_input.is_some() {
        basket_fair_value(config, today)?;
    } else {
        info!("no basket_portfolio_input configured, skipping basket fair value");
    }
    Ok(())
}
