use tracing::debug;

use super::EnrichError;
use crate::model::{BucketSummary, OptionRow, StrikeBucket};

/// Result of bucketing one ticker's rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucketReport {
    /// One entry per bucket that received rows, in configured order.
    pub summaries: Vec<BucketSummary>,
    /// Rows whose relative strike matched no bucket.
    pub unassigned: Vec<EnrichError>,
    /// Labels of configured buckets that received no rows.
    pub empty_buckets: Vec<String>,
}

struct Accumulator {
    rows: usize,
    max_relative_strike: f64,
    max_tenor_for_strike: Option<i64>,
}

/// Index of the first bucket containing `relative_strike`.
pub fn assign_bucket(buckets: &[StrikeBucket], relative_strike: f64) -> Option<usize> {
    buckets.iter().position(|b| b.contains(relative_strike))
}

/// Assign rows to buckets (first match in configured order) and summarise
/// each non-empty bucket with `max(relative_strike)`.
pub fn aggregate_buckets(
    ticker: &str,
    rows: &[OptionRow],
    buckets: &[StrikeBucket],
) -> Result<BucketReport, EnrichError> {
    let mut acc: Vec<Option<Accumulator>> = buckets.iter().map(|_| None).collect();
    let mut unassigned = Vec::new();

    for (idx, row) in rows.iter().enumerate() {
        let rel = row.relative_strike.ok_or(EnrichError::MissingField {
            row: idx,
            field: "relative_strike",
            stage: "bucket aggregation",
        })?;

        let Some(bucket_idx) = assign_bucket(buckets, rel) else {
            unassigned.push(EnrichError::UnassignedBucket {
                row: idx,
                relative_strike: rel,
            });
            continue;
        };

        match &mut acc[bucket_idx] {
            Some(a) => {
                a.rows += 1;
                a.max_relative_strike = a.max_relative_strike.max(rel);
                a.max_tenor_for_strike = a.max_tenor_for_strike.max(row.max_tenor_for_strike);
            }
            slot @ None => {
                *slot = Some(Accumulator {
                    rows: 1,
                    max_relative_strike: rel,
                    max_tenor_for_strike: row.max_tenor_for_strike,
                });
            }
        }
    }

    let mut report = BucketReport {
        unassigned,
        ..Default::default()
    };

    for (bucket, slot) in buckets.iter().zip(acc) {
        match slot {
            Some(a) => {
                debug!(
                    ticker,
                    bucket = %bucket.label(),
                    rows = a.rows,
                    max_relative_strike = a.max_relative_strike,
                    "bucket summarised"
                );
                report.summaries.push(BucketSummary {
                    ticker: ticker.to_string(),
                    label: bucket.label(),
                    lower: bucket.lower,
                    upper: bucket.upper,
                    rows: a.rows,
                    max_relative_strike: a.max_relative_strike,
                    max_tenor_for_strike: a.max_tenor_for_strike,
                });
            }
            None => report.empty_buckets.push(bucket.label()),
        }
    }

    Ok(report)
}
