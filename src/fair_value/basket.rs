//! Basket portfolios. Each row lists several underlyings in `baskettickers`,
//! a relative-strike range such as `90-110` in `strike_bucket`, and the
//! trade's `trade_date` / `expiry`. Every member is priced against its own
//! bucket summary and the per-member results are written comma-joined, in
//! member order:
//!
//! - `tenor_days`: `expiry - trade_date` in whole days;
//! - `max_tenor_for_strike`: the member's bucket value at the range midpoint;
//! - `fair_value`: `2` when the trade's tenor is within that maximum, else `3`.
//!
//! A member that cannot be priced leaves an empty slot.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use super::{FAIR_VALUE_COLUMN, SummaryBand, SummaryCache, ensure_column, find_band};
use crate::config::PipelineConfig;
use crate::data::layout;
use crate::dates::parse_date;

const TENOR_COLUMN: &str = "tenor_days";
const MAX_TENOR_COLUMN: &str = "max_tenor_for_strike";

/// The trade expires no later than the longest listed tenor in its bucket.
pub const WITHIN_MAX_TENOR: &str = "2";
/// The trade outlives every listed expiration in its bucket.
pub const BEYOND_MAX_TENOR: &str = "3";

#[derive(Debug, Clone, PartialEq)]
pub struct BasketFileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub rows: usize,
    /// Basket members seen across all rows.
    pub members: usize,
    /// Members that received a fair value.
    pub priced: usize,
}

#[derive(Debug, Default)]
pub struct BasketRunReport {
    pub files: Vec<BasketFileReport>,
    /// Input files that could not be processed.
    pub failed: Vec<PathBuf>,
}

impl BasketRunReport {
    pub fn print_table(&self) {
        println!("\n{}", "═".repeat(80));
        println!("  Basket Fair Values");
        println!("{}", "═".repeat(80));
        println!("  {:<40} {:>8} {:>8} {:>8}", "File", "Rows", "Members", "Priced");
        println!("  {}", "-".repeat(74));
        for f in &self.files {
            let name = f
                .input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            println!("  {:<40} {:>8} {:>8} {:>8}", name, f.rows, f.members, f.priced);
        }
        for path in &self.failed {
            println!("  FAILED: {}", path.display());
        }
        println!("{}", "═".repeat(80));
    }
}

/// `"AAPL, msft,"` -> `["AAPL", "MSFT"]`.
pub fn parse_basket(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Midpoint of a `lo-hi` range.
pub fn parse_bucket_midpoint(raw: &str) -> Option<f64> {
    let (lo, hi) = raw.trim().split_once('-')?;
    let lo = lo.trim().parse::<f64>().ok()?;
    let hi = hi.trim().parse::<f64>().ok()?;
    let mid = (lo + hi) / 2.0;
    mid.is_finite().then_some(mid)
}

/// Whole days from `trade_date` to `expiry`.
pub fn trade_tenor(trade_date: &str, expiry: &str) -> Option<i64> {
    let trade: NaiveDate = parse_date(trade_date).ok()?;
    let expiry: NaiveDate = parse_date(expiry).ok()?;
    Some((expiry - trade).num_days())
}

/// `(max_tenor_for_strike, fair_value code)` for one member, or `None` when
/// any input is missing or no bucket matches.
pub fn price_member(
    bands: Option<&[SummaryBand]>,
    relative_strike: Option<f64>,
    tenor_days: Option<i64>,
) -> Option<(f64, &'static str)> {
    let (rel, tenor) = (relative_strike?, tenor_days?);
    let max_tenor = find_band(bands?, rel)?.max_tenor_for_strike?;
    let code = if tenor as f64 <= max_tenor {
        WITHIN_MAX_TENOR
    } else {
        BEYOND_MAX_TENOR
    };
    Some((max_tenor, code))
}

/// Copy one basket portfolio to `output` with `tenor_days`,
/// `max_tenor_for_strike` and `fair_value` columns (replaced if present).
pub fn annotate_basket_file(input: &Path, output: &Path, cache: &mut SummaryCache) -> Result<BasketFileReport> {
    let mut rdr = csv::Reader::from_path(input)
        .with_context(|| format!("opening basket portfolio {}", input.display()))?;
    let mut headers = rdr.headers()?.clone();

    let column = |name: &str| headers.iter().position(|h| h.trim() == name);
    let tickers_idx = column("baskettickers");
    let bucket_idx = column("strike_bucket");
    let trade_idx = column("trade_date");
    let expiry_idx = column("expiry");
    if tickers_idx.is_none() {
        warn!(file = %input.display(), "no `baskettickers` column, nothing to price");
    }
    let tenor_idx = ensure_column(&mut headers, TENOR_COLUMN);
    let max_idx = ensure_column(&mut headers, MAX_TENOR_COLUMN);
    let fair_idx = ensure_column(&mut headers, FAIR_VALUE_COLUMN);

    let mut wtr = csv::Writer::from_path(output)
        .with_context(|| format!("creating {}", output.display()))?;
    wtr.write_record(&headers)?;

    let mut report = BasketFileReport {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        rows: 0,
        members: 0,
        priced: 0,
    };

    for record in rdr.records() {
        let record = record.with_context(|| format!("reading {}", input.display()))?;
        report.rows += 1;
        let cell = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");

        let tenor = trade_tenor(cell(trade_idx), cell(expiry_idx));
        let rel = parse_bucket_midpoint(cell(bucket_idx));
        let members = parse_basket(cell(tickers_idx));

        let mut max_tenors = Vec::with_capacity(members.len());
        let mut fair_values = Vec::with_capacity(members.len());
        for member in &members {
            let bands = if rel.is_some() && tenor.is_some() {
                cache.get(member)?
            } else {
                None
            };
            match price_member(bands, rel, tenor) {
                Some((max_tenor, code)) => {
                    max_tenors.push(max_tenor.to_string());
                    fair_values.push(code.to_string());
                    report.priced += 1;
                }
                None => {
                    debug!(member = %member, relative_strike = ?rel, tenor_days = ?tenor, "basket member not priced");
                    max_tenors.push(String::new());
                    fair_values.push(String::new());
                }
            }
        }
        report.members += members.len();

        let mut fields: Vec<String> = record.iter().map(str::to_string).collect();
        fields.resize(headers.len(), String::new());
        fields[tenor_idx] = tenor.map(|t| t.to_string()).unwrap_or_default();
        fields[max_idx] = max_tenors.join(",");
        fields[fair_idx] = fair_values.join(",");
        wtr.write_record(&fields)?;
    }

    wtr.flush()?;
    Ok(report)
}

/// Basket portfolio CSVs in `dir`, sorted by name.
fn basket_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("listing {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "csv"))
        .collect();
    files.sort();
    Ok(files)
}

/// Entry point for the `basket-fair-value` command. A file that fails is
/// logged and the rest are still processed.
pub fn run(config: &PipelineConfig, today: NaiveDate) -> Result<BasketRunReport> {
    let Some(input_dir) = config.basket_portfolio_input.as_deref() else {
        bail!("`basket_portfolio_input` is not set in the configuration");
    };
    let Some(output_dir) = config.basket_portfolio_output.as_deref() else {
        bail!("`basket_portfolio_output` is not set in the configuration");
    };
    let (input_dir, output_dir) = (Path::new(input_dir), Path::new(output_dir));
    if input_dir == output_dir {
        bail!("basket input and output directories must differ ({})", input_dir.display());
    }
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let valuation_date = config.resolve_valuation_date(today)?;
    let root = layout::snapshot_dir(&config.outdir(), valuation_date);
    info!(
        input = %input_dir.display(),
        output = %output_dir.display(),
        valuation_date = %valuation_date,
        summaries = %root.display(),
        "pricing basket portfolios"
    );

    let mut cache = SummaryCache::new(root);
    let mut report = BasketRunReport::default();
    for path in basket_files(input_dir)? {
        let Some(name) = path.file_name() else { continue };
        let output = output_dir.join(name);
        match annotate_basket_file(&path, &output, &mut cache) {
            Ok(file) => {
                info!(output = %file.output.display(), rows = file.rows, priced = file.priced, "saved");
                report.files.push(file);
            }
            Err(e) => {
                error!(file = %path.display(), "failed: {e:#}");
                report.failed.push(path);
            }
        }
    }
    Ok(report)
}
