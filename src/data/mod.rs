pub mod layout;

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::enrich::EnrichError;
use crate::model::OptionRow;

/// Rows loaded for one ticker, plus the records that could not be read.
#[derive(Debug, Default)]
pub struct LoadedRows {
    pub rows: Vec<OptionRow>,
    pub rejected: Vec<EnrichError>,
}

/// Load CSV rows of type T, failing on the first bad record.
pub fn load_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("opening CSV file {}", path.display()))?;
    let rows: Vec<T> = rdr
        .deserialize()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("parsing CSV file {}", path.display()))?;
    Ok(rows)
}

/// Write rows of type T to a CSV file, replacing it.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("creating CSV file {}", path.display()))?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read option rows record by record. A record that does not deserialize,
/// or whose strike is not a positive number, is reported as malformed and
/// skipped; the rest of the file still loads.
pub fn load_option_rows(path: &Path, ticker: &str) -> Result<LoadedRows> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("opening CSV file {}", path.display()))?;
    let headers = rdr
        .headers()
        .with_context(|| format!("reading header of {}", path.display()))?
        .clone();
    let file = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut out = LoadedRows::default();
    for (idx, record) in rdr.records().enumerate() {
        // Header is line 1; fall back to that when the reader has no position.
        let fallback_line = idx + 2;
        let parsed = record.map_err(|e| {
            let line = e.position().map(|p| p.line() as usize).unwrap_or(fallback_line);
            (line, e.to_string())
        });
        let parsed = parsed.and_then(|record| {
            let line = record.position().map(|p| p.line() as usize).unwrap_or(fallback_line);
            record
                .deserialize::<OptionRow>(Some(&headers))
                .map(|row| (line, row))
                .map_err(|e| (line, e.to_string()))
        });

        match parsed {
            Ok((line, row)) if !(row.strike.is_finite() && row.strike > 0.0) => {
                out.rejected.push(malformed(&file, line, format!("strike {} is not positive", row.strike)));
            }
            Ok((_, mut row)) => {
                if row.ticker.trim().is_empty() {
                    row.ticker = ticker.to_string();
                } else {
                    row.ticker = row.ticker.trim().to_uppercase();
                }
                out.rows.push(row);
            }
            Err((line, reason)) => out.rejected.push(malformed(&file, line, reason)),
        }
    }

    for e in &out.rejected {
        warn!(ticker, "{e}");
    }
    debug!(
        ticker,
        file = %file,
        rows = out.rows.len(),
        rejected = out.rejected.len(),
        "loaded option rows"
    );
    Ok(out)
}

/// Load every option file for a ticker into a single row set.
pub fn load_ticker_rows(outdir: &Path, ticker: &str) -> Result<LoadedRows> {
    let dir = layout::ticker_dir(outdir, ticker);
    let mut out = LoadedRows::default();
    for path in layout::option_files(&dir)? {
        let loaded = load_option_rows(&path, ticker)?;
        out.rows.extend(loaded.rows);
        out.rejected.extend(loaded.rejected);
    }
    Ok(out)
}

fn malformed(file: &str, line: usize, reason: String) -> EnrichError {
    EnrichError::MalformedRow {
        row: line,
        reason: format!("{file}: {reason}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_bad_records_are_isolated() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(
            tmp.path(),
            "AAPL_options_all_expirations_filtered.csv",
            "contractSymbol,type,expiration,strike,volume\n\
             A1,call,2025-01-17,100,5\n\
             A2,call,2025-01-17,abc,5\n\
             A3,put,2025-01-17,-5,5\n\
             A4,put,2025-01-17,105,lots\n\
             A5,put,2025-01-24,110,\n",
        );

        let loaded = load_option_rows(&path, "AAPL").unwrap();

        let symbols: Vec<_> = loaded
            .rows
            .iter()
            .map(|r| r.contract_symbol.clone().unwrap())
            .collect();
        assert_eq!(symbols, vec!["A1", "A5"]);
        assert!(loaded.rows.iter().all(|r| r.ticker == "AAPL"));

        let lines: Vec<usize> = loaded
            .rejected
            .iter()
            .map(|e| match e {
                EnrichError::MalformedRow { row, .. } => *row,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(lines, vec![3, 4, 5]);
    }

    #[test]
    fn test_ticker_column_is_normalised() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(
            tmp.path(),
            "x_filtered.csv",
            "ticker,expiration,strike\n msft ,2025-01-17,100\n",
        );
        let loaded = load_option_rows(&path, "AAPL").unwrap();
        assert_eq!(loaded.rows[0].ticker, "MSFT");
    }

    #[test]
    fn test_ticker_row_set_spans_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("AAPL");
        std::fs::create_dir_all(&dir).unwrap();
        write(&dir, "AAPL_options_exact_2025-01-17_filtered.csv", "expiration,strike\n2025-01-17,100\n");
        write(&dir, "AAPL_options_range_MIN_to_MAX_filtered.csv", "expiration,strike\n2025-02-21,100\n");
        write(&dir, "AAPL_strike_buckets_summary.csv", "ticker,label\nAAPL,x\n");

        let loaded = load_ticker_rows(tmp.path(), "AAPL").unwrap();
        assert_eq!(loaded.rows.len(), 2);
        assert!(loaded.rejected.is_empty());
    }

    #[test]
    fn test_write_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("rows.csv");
        let rows = vec![OptionRow::new("AAPL", "2025-01-17", 100.0)];
        write_csv(&path, &rows).unwrap();
        let back: Vec<OptionRow> = load_csv(&path).unwrap();
        assert_eq!(back, rows);
    }
}
