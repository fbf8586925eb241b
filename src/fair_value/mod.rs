//! Price portfolio positions from a dated strike-bucket summary: each
//! position's fair value is the `max_tenor_for_strike` of the bucket its
//! relative strike falls into.

pub mod basket;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::data::layout;

const FAIR_VALUE_COLUMN: &str = "fair_value";

/// The columns of a bucket summary that pricing needs. Extra columns are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SummaryBand {
    pub lower: f64,
    pub upper: f64,
    #[serde(default)]
    pub max_tenor_for_strike: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FairValueReport {
    pub output: PathBuf,
    pub rows: usize,
    pub priced: usize,
}

/// Parse `69.44`, `69.44%`, or `69,44 %`. Blank means absent.
pub fn parse_relative_strike(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != '%' && !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// First band with `lower <= relative_strike < upper`.
pub fn find_band(bands: &[SummaryBand], relative_strike: f64) -> Option<&SummaryBand> {
    let mut matches = bands
        .iter()
        .filter(|b| b.lower <= relative_strike && relative_strike < b.upper);
    let first = matches.next();
    if first.is_some() && matches.next().is_some() {
        debug!(relative_strike, "multiple matching buckets, using the first");
    }
    first
}

/// Bucket summaries under one snapshot directory, loaded once per ticker.
pub struct SummaryCache {
    root: PathBuf,
    loaded: HashMap<String, Option<Vec<SummaryBand>>>,
}

impl SummaryCache {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            loaded: HashMap::new(),
        }
    }

    /// Bands for `ticker`, or `None` when no summary file exists.
    pub fn get(&mut self, ticker: &str) -> Result<Option<&[SummaryBand]>> {
        if !self.loaded.contains_key(ticker) {
            let path = layout::summary_path(&self.root, ticker);
            let bands = if path.is_file() {
                info!(ticker, path = %path.display(), "loading bucket summary");
                Some(crate::data::load_csv::<SummaryBand>(&path)?)
            } else {
                warn!(ticker, path = %path.display(), "bucket summary not found");
                None
            };
            self.loaded.insert(ticker.to_string(), bands);
        }
        Ok(self.loaded.get(ticker).and_then(|b| b.as_deref()))
    }
}

/// Copy `input` to `output` with a `fair_value` column (replaced if present).
/// Rows that cannot be priced get an empty value.
pub fn annotate_portfolio(input: &Path, output: &Path, cache: &mut SummaryCache) -> Result<FairValueReport> {
    let mut rdr = csv::Reader::from_path(input)
        .with_context(|| format!("opening portfolio {}", input.display()))?;
    let mut headers = rdr.headers()?.clone();

    let column = |name: &str| headers.iter().position(|h| h.trim() == name);
    let Some(ticker_idx) = column("ticker") else {
        bail!("portfolio {} has no `ticker` column", input.display());
    };
    let Some(rel_idx) = column("relative_strike") else {
        bail!("portfolio {} has no `relative_strike` column", input.display());
    };
    let trade_idx = column("trade_id");
    let fair_idx = ensure_column(&mut headers, FAIR_VALUE_COLUMN);

    let mut wtr = csv::Writer::from_path(output)
        .with_context(|| format!("creating {}", output.display()))?;
    wtr.write_record(&headers)?;

    let mut report = FairValueReport {
        output: output.to_path_buf(),
        rows: 0,
        priced: 0,
    };

    for record in rdr.records() {
        let record = record.with_context(|| format!("reading {}", input.display()))?;
        report.rows += 1;

        let ticker = record.get(ticker_idx).unwrap_or("").trim().to_uppercase();
        let trade_id = trade_idx.and_then(|i| record.get(i)).unwrap_or("N/A");
        let value = price_row(cache, &ticker, record.get(rel_idx).unwrap_or(""), trade_id)?;
        if value.is_some() {
            report.priced += 1;
        }

        let cell = value.map(|v| v.to_string()).unwrap_or_default();
        let mut fields: Vec<&str> = record.iter().collect();
        fields.resize(headers.len(), "");
        fields[fair_idx] = cell.as_str();
        wtr.write_record(&fields)?;
    }

    wtr.flush()?;
    Ok(report)
}

/// Position of `name` in `headers`, appending the column when absent.
fn ensure_column(headers: &mut csv::StringRecord, name: &str) -> usize {
    match headers.iter().position(|h| h.trim() == name) {
        Some(idx) => idx,
        None => {
            headers.push_field(name);
            headers.len() - 1
        }
    }
}

fn price_row(cache: &mut SummaryCache, ticker: &str, raw_rel: &str, trade_id: &str) -> Result<Option<f64>> {
    let Some(bands) = cache.get(ticker)? else {
        warn!(ticker, trade_id, "no bucket summary, fair_value left empty");
        return Ok(None);
    };
    let Some(rel) = parse_relative_strike(raw_rel) else {
        warn!(ticker, trade_id, raw = raw_rel, "unparsable relative_strike, fair_value left empty");
        return Ok(None);
    };
    let Some(band) = find_band(bands, rel) else {
        warn!(ticker, trade_id, relative_strike = rel, "no matching bucket, fair_value left empty");
        return Ok(None);
    };
    Ok(band.max_tenor_for_strike)
}

/// `<dir>/<stem>_with_fair_value.csv`
pub fn output_path(portfolio: &Path) -> PathBuf {
    let stem = portfolio
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "portfolio".to_string());
    portfolio.with_file_name(format!("{stem}_with_fair_value.csv"))
}

/// Entry point for the `fair-value` command.
pub fn run(config: &PipelineConfig, today: NaiveDate) -> Result<FairValueReport> {
    let Some(portfolio) = config.portfolio_file.as_deref() else {
        bail!("`portfolio_file` is not set in the configuration");
    };
    let portfolio = Path::new(portfolio);
    let valuation_date = config.resolve_valuation_date(today)?;
    let root = layout::snapshot_dir(&config.outdir(), valuation_date);
    info!(
        portfolio = %portfolio.display(),
        valuation_date = %valuation_date,
        summaries = %root.display(),
        "pricing portfolio"
    );

    let mut cache = SummaryCache::new(root);
    let report = annotate_portfolio(portfolio, &output_path(portfolio), &mut cache)?;
    info!(
        output = %report.output.display(),
        rows = report.rows,
        priced = report.priced,
        "saved portfolio with fair_value"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(lower: f64, upper: f64, tenor: Option<f64>) -> SummaryBand {
        SummaryBand {
            lower,
            upper,
            max_tenor_for_strike: tenor,
        }
    }

    #[test]
    fn test_parse_relative_strike_variants() {
        assert_eq!(parse_relative_strike("69.44"), Some(69.44));
        assert_eq!(parse_relative_strike("69.44%"), Some(69.44));
        assert_eq!(parse_relative_strike(" 69,44 % "), Some(69.44));
        assert_eq!(parse_relative_strike(""), None);
        assert_eq!(parse_relative_strike("n/a"), None);
    }

    #[test]
    fn test_find_band_half_open_first_match() {
        let bands = vec![band(0.0, 25.0, Some(10.0)), band(25.0, 35.0, Some(30.0)), band(20.0, 40.0, Some(99.0))];
        assert_eq!(find_band(&bands, 25.0).unwrap().max_tenor_for_strike, Some(30.0));
        assert_eq!(find_band(&bands, 24.9).unwrap().max_tenor_for_strike, Some(10.0));
        assert!(find_band(&bands, 40.0).is_none());
    }

    #[test]
    fn test_output_path() {
        assert_eq!(
            output_path(Path::new("input/book.csv")),
            Path::new("input/book_with_fair_value.csv")
        );
    }

    #[test]
    fn test_annotate_portfolio() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("snap");
        std::fs::create_dir_all(root.join("AAPL")).unwrap();
        std::fs::write(
            layout::summary_path(&root, "AAPL"),
            "ticker,label,lower,upper,rows,max_relative_strike,max_tenor_for_strike\n\
             AAPL,\"[0, 25)\",0.0,25.0,2,20.0,45\n\
             AAPL,\"[25, 35)\",25.0,35.0,1,30.0,120\n",
        )
        .unwrap();
        let input = tmp.path().join("book.csv");
        std::fs::write(
            &input,
            "trade_id,ticker,relative_strike,notional\n\
             t1,aapl,20%,100\n\
             t2,AAPL,\"30,5%\",200\n\
             t3,AAPL,80,300\n\
             t4,MSFT,20,400\n",
        )
        .unwrap();
        let output = output_path(&input);

        let mut cache = SummaryCache::new(root);
        let report = annotate_portfolio(&input, &output, &mut cache).unwrap();

        assert_eq!(report.rows, 4);
        assert_eq!(report.priced, 2);
        let text = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "trade_id,ticker,relative_strike,notional,fair_value");
        assert_eq!(lines[1], "t1,aapl,20%,100,45");
        assert_eq!(lines[2], "t2,AAPL,\"30,5%\",200,120");
        assert_eq!(lines[3], "t3,AAPL,80,300,");
        assert_eq!(lines[4], "t4,MSFT,20,400,");
    }
}
