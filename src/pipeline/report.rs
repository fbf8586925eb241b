use chrono::NaiveDate;

use super::TickerOutput;
use crate::enrich::EnrichError;

/// What happened to one ticker.
#[derive(Debug, Clone)]
pub struct TickerOutcome {
    pub ticker: String,
    /// Records seen, including ones rejected on load.
    pub input_rows: usize,
    /// Malformed rows excluded before or during the tenor stage.
    pub rejected: Vec<EnrichError>,
    pub result: Result<TickerOutput, EnrichError>,
}

impl TickerOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn enriched_rows(&self) -> usize {
        self.result.as_ref().map(|o| o.rows.len()).unwrap_or(0)
    }

    pub fn unassigned_rows(&self) -> usize {
        self.result
            .as_ref()
            .map(|o| o.buckets.unassigned.len())
            .unwrap_or(0)
    }

    pub fn status(&self) -> String {
        match &self.result {
            Ok(_) => "ok".to_string(),
            Err(e) => format!("FAILED: {e}"),
        }
    }
}

/// Outcome of one `enrich` run across all tickers.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub snap_date: NaiveDate,
    pub outcomes: Vec<TickerOutcome>,
}

impl RunReport {
    pub fn new(snap_date: NaiveDate, outcomes: Vec<TickerOutcome>) -> Self {
        Self {
            snap_date,
            outcomes,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn print_table(&self) {
        println!("\n{}", "═".repeat(100));
        println!("  Enrichment Results (snap_date {})", self.snap_date);
        println!("{}", "═".repeat(100));
        println!(
            "  {:<10} {:>8} {:>9} {:>9} {:>10} {:>8}  {}",
            "Ticker", "Rows", "Enriched", "Excluded", "Unassigned", "Spot", "Status",
        );
        println!("  {}", "-".repeat(94));
        for o in &self.outcomes {
            let spot = o
                .result
                .as_ref()
                .map(|out| format!("{:.2}", out.spot.value))
                .unwrap_or_else(|_| "-".to_string());
            println!(
                "  {:<10} {:>8} {:>9} {:>9} {:>10} {:>8}  {}",
                o.ticker,
                o.input_rows,
                o.enriched_rows(),
                o.rejected.len(),
                o.unassigned_rows(),
                spot,
                o.status(),
            );
        }
        println!("{}", "═".repeat(100));
        for o in &self.outcomes {
            for e in &o.rejected {
                println!("  {} excluded: {e}", o.ticker);
            }
        }
        println!(
            "  {} succeeded, {} failed",
            self.succeeded(),
            self.failed()
        );
    }

    pub fn print_buckets(&self) {
        for o in &self.outcomes {
            let Ok(out) = &o.result else { continue };
            println!("\n  {} strike buckets", o.ticker);
            println!(
                "  {:<20} {:>9} {:>9} {:>6} {:>12} {:>10}",
                "Bucket", "Lower", "Upper", "Rows", "MaxRelStrike", "MaxTenor",
            );
            println!("  {}", "-".repeat(72));
            for s in &out.buckets.summaries {
                let tenor = s
                    .max_tenor_for_strike
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  {:<20} {:>9.2} {:>9.2} {:>6} {:>12.4} {:>10}",
                    s.label, s.lower, s.upper, s.rows, s.max_relative_strike, tenor,
                );
            }
            if !out.buckets.empty_buckets.is_empty() {
                println!("  empty: {}", out.buckets.empty_buckets.join(", "));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::{BucketReport, SpotPrice, SpotSource};

    fn ok(ticker: &str, rows: usize, unassigned: usize) -> TickerOutcome {
        TickerOutcome {
            ticker: ticker.to_string(),
            input_rows: rows,
            rejected: Vec::new(),
            result: Ok(TickerOutput {
                spot: SpotPrice {
                    value: 100.0,
                    source: SpotSource::Override,
                },
                rows: (0..rows)
                    .map(|_| crate::model::OptionRow::new(ticker, "2025-01-17", 100.0))
                    .collect(),
                buckets: BucketReport {
                    unassigned: (0..unassigned)
                        .map(|row| EnrichError::UnassignedBucket {
                            row,
                            relative_strike: 500.0,
                        })
                        .collect(),
                    ..Default::default()
                },
            }),
        }
    }

    #[test]
    fn test_counts() {
        let failed = TickerOutcome {
            ticker: "MSFT".into(),
            input_rows: 0,
            rejected: Vec::new(),
            result: Err(EnrichError::EmptyRowSource {
                ticker: "MSFT".into(),
            }),
        };
        let report = RunReport::new(
            NaiveDate::from_ymd_opt(2025, 1, 7).unwrap(),
            vec![ok("AAPL", 3, 1), failed],
        );
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.outcomes[0].enriched_rows(), 3);
        assert_eq!(report.outcomes[0].unassigned_rows(), 1);
        assert_eq!(report.outcomes[1].status(), "FAILED: No option rows for `MSFT`");
    }
}
