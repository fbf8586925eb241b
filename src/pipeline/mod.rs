pub mod report;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::data::{self, layout};
use crate::enrich::{self, BucketReport, EnrichError, SpotPrice};
use crate::model::{OptionRow, StrikeBucket};

pub use report::{RunReport, TickerOutcome};

/// One ticker's row set as handed over by the loader.
#[derive(Debug, Clone, Default)]
pub struct TickerInput {
    pub ticker: String,
    pub rows: Vec<OptionRow>,
    /// Records the loader already had to drop.
    pub rejected: Vec<EnrichError>,
    /// Set when the ticker's files could not be read at all.
    pub load_error: Option<EnrichError>,
}

impl TickerInput {
    pub fn new(ticker: &str, rows: Vec<OptionRow>) -> Self {
        Self {
            ticker: ticker.to_string(),
            rows,
            ..Default::default()
        }
    }

    /// A ticker whose files could not be read. Its pipeline fails with `error`.
    pub fn unreadable(ticker: &str, error: EnrichError) -> Self {
        Self {
            ticker: ticker.to_string(),
            load_error: Some(error),
            ..Default::default()
        }
    }
}

/// Everything the stages need besides the rows.
#[derive(Debug, Clone, Copy)]
pub struct PipelineParams<'a> {
    pub snap_date: NaiveDate,
    pub spot_price_overrides: &'a BTreeMap<String, f64>,
    pub buckets: &'a [StrikeBucket],
}

/// Row-producing stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Tenor,
    RelativeStrike,
    MaxTenor,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Tenor => "tenor",
            Stage::RelativeStrike => "relative_strike",
            Stage::MaxTenor => "max_tenor",
        }
    }
}

/// Receives each intermediate row set. Called from worker threads when
/// tickers run in parallel.
pub trait StageObserver: Sync {
    fn stage_complete(&self, ticker: &str, stage: Stage, rows: &[OptionRow]);
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl StageObserver for NoopObserver {
    fn stage_complete(&self, _ticker: &str, _stage: Stage, _rows: &[OptionRow]) {}
}

/// Observer that logs row counts per stage at debug level.
pub struct TracingObserver;

impl StageObserver for TracingObserver {
    fn stage_complete(&self, ticker: &str, stage: Stage, rows: &[OptionRow]) {
        debug!(ticker, stage = stage.name(), rows = rows.len(), "stage complete");
    }
}

/// Final state of a ticker whose pipeline ran to completion.
#[derive(Debug, Clone)]
pub struct TickerOutput {
    pub spot: SpotPrice,
    pub rows: Vec<OptionRow>,
    pub buckets: BucketReport,
}

/// Run tenor -> relative strike -> max tenor -> buckets over one ticker.
/// A fatal stage error stops this ticker only.
pub fn run_ticker(
    input: TickerInput,
    params: &PipelineParams<'_>,
    observer: &dyn StageObserver,
) -> TickerOutcome {
    let TickerInput {
        ticker,
        rows,
        mut rejected,
        load_error,
    } = input;
    let input_rows = rows.len() + rejected.len();

    let result = match load_error {
        Some(e) => Err(e),
        None => enrich_rows(&ticker, &rows, params, observer, &mut rejected),
    };
    match &result {
        Ok(out) => info!(
            ticker = %ticker,
            rows = out.rows.len(),
            buckets = out.buckets.summaries.len(),
            unassigned = out.buckets.unassigned.len(),
            "ticker enriched"
        ),
        Err(e) => error!(ticker = %ticker, "{e}"),
    }

    TickerOutcome {
        ticker,
        input_rows,
        rejected,
        result,
    }
}

fn enrich_rows(
    ticker: &str,
    rows: &[OptionRow],
    params: &PipelineParams<'_>,
    observer: &dyn StageObserver,
    rejected: &mut Vec<EnrichError>,
) -> Result<TickerOutput, EnrichError> {
    if rows.is_empty() {
        return Err(EnrichError::EmptyRowSource {
            ticker: ticker.to_string(),
        });
    }

    let tenor = enrich::add_tenor(rows, params.snap_date);
    rejected.extend(tenor.rejected);
    observer.stage_complete(ticker, Stage::Tenor, &tenor.rows);
    if tenor.rows.is_empty() {
        return Err(EnrichError::EmptyRowSource {
            ticker: ticker.to_string(),
        });
    }

    let spot = enrich::resolve_spot_price(ticker, params.spot_price_overrides, &tenor.rows)?;
    let relative = enrich::add_relative_strike(&tenor.rows, ticker, spot.value)?;
    observer.stage_complete(ticker, Stage::RelativeStrike, &relative);

    let max_tenor = enrich::add_max_tenor(&relative)?;
    observer.stage_complete(ticker, Stage::MaxTenor, &max_tenor);

    let buckets = enrich::aggregate_buckets(ticker, &max_tenor, params.buckets)?;
    for e in &buckets.unassigned {
        debug!(ticker, "{e}");
    }

    Ok(TickerOutput {
        spot,
        rows: max_tenor,
        buckets,
    })
}

/// Run every ticker independently. Results come back in input order.
#[cfg(feature = "full")]
pub fn run_all(
    inputs: Vec<TickerInput>,
    params: &PipelineParams<'_>,
    observer: &dyn StageObserver,
) -> Vec<TickerOutcome> {
    use rayon::prelude::*;

    inputs
        .into_par_iter()
        .map(|input| run_ticker(input, params, observer))
        .collect()
}

/// Run every ticker independently. Results come back in input order.
#[cfg(not(feature = "full"))]
pub fn run_all(
    inputs: Vec<TickerInput>,
    params: &PipelineParams<'_>,
    observer: &dyn StageObserver,
) -> Vec<TickerOutcome> {
    inputs
        .into_iter()
        .map(|input| run_ticker(input, params, observer))
        .collect()
}

/// Load each configured ticker's option files from `outdir`. A ticker
/// whose files cannot be read is returned as unreadable; the others load.
pub fn load_inputs(outdir: &Path, tickers: &[String]) -> Vec<TickerInput> {
    tickers
        .iter()
        .map(|ticker| match data::load_ticker_rows(outdir, ticker) {
            Ok(loaded) => {
                if loaded.rows.is_empty() && loaded.rejected.is_empty() {
                    warn!(ticker = %ticker, dir = %layout::ticker_dir(outdir, ticker).display(), "no option files");
                }
                TickerInput {
                    ticker: ticker.clone(),
                    rows: loaded.rows,
                    rejected: loaded.rejected,
                    load_error: None,
                }
            }
            Err(e) => {
                error!(ticker = %ticker, "could not load option rows: {e:#}");
                TickerInput::unreadable(
                    ticker,
                    EnrichError::Io {
                        ticker: ticker.clone(),
                        reason: format!("{e:#}"),
                    },
                )
            }
        })
        .collect()
}

/// Write the enriched rows and bucket summary of each successful ticker.
///
/// A failed ticker has its previous outputs removed so a later snapshot or
/// fair-value run cannot pick up stale data. A write failure marks that
/// ticker as failed and the remaining tickers are still written.
pub fn persist(outdir: &Path, outcomes: &mut [TickerOutcome]) {
    for outcome in outcomes.iter_mut() {
        let written = match &outcome.result {
            Ok(out) => write_outputs(outdir, &outcome.ticker, out),
            Err(_) => {
                clear_outputs(outdir, &outcome.ticker);
                continue;
            }
        };
        if let Err(e) = written {
            error!(ticker = %outcome.ticker, "could not save outputs: {e:#}");
            clear_outputs(outdir, &outcome.ticker);
            outcome.result = Err(EnrichError::Io {
                ticker: outcome.ticker.clone(),
                reason: format!("{e:#}"),
            });
        }
    }
}

fn write_outputs(outdir: &Path, ticker: &str, out: &TickerOutput) -> Result<()> {
    let rows_path = layout::enriched_path(outdir, ticker);
    data::write_csv(&rows_path, &out.rows)?;
    let summary_path = layout::summary_path(outdir, ticker);
    data::write_csv(&summary_path, &out.buckets.summaries)?;
    info!(
        ticker,
        rows = %rows_path.display(),
        summary = %summary_path.display(),
        "saved"
    );
    Ok(())
}

/// Remove a ticker's enriched rows and bucket summary if present.
fn clear_outputs(outdir: &Path, ticker: &str) {
    for path in [layout::enriched_path(outdir, ticker), layout::summary_path(outdir, ticker)] {
        if !path.is_file() {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => warn!(ticker, path = %path.display(), "removed output of an earlier run"),
            Err(e) => error!(ticker, path = %path.display(), "could not remove stale output: {e}"),
        }
    }
}

/// Entry point for the `enrich` command: load, enrich, persist, report.
pub fn run(config: &PipelineConfig, bucket_file: Option<&Path>, today: NaiveDate) -> Result<RunReport> {
    if config.tickers.is_empty() {
        warn!("no tickers configured, nothing to do");
        return Ok(RunReport::new(today, Vec::new()));
    }

    let buckets = config.resolve_buckets(bucket_file)?;
    let snap_date = enrich::resolve_snap_date(config.snap_date()?, today);
    let outdir = config.outdir();
    info!(
        snap_date = %snap_date,
        outdir = %outdir.display(),
        tickers = %config.tickers.join(", "),
        buckets = buckets.len(),
        "starting enrichment"
    );

    let inputs = load_inputs(&outdir, &config.tickers);
    let params = PipelineParams {
        snap_date,
        spot_price_overrides: &config.spot_price_overrides,
        buckets: &buckets,
    };
    let mut outcomes = run_all(inputs, &params, &TracingObserver);
    persist(&outdir, &mut outcomes);

    Ok(RunReport::new(snap_date, outcomes))
}
