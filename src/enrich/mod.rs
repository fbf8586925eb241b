pub mod buckets;
pub mod max_tenor;
pub mod relative_strike;
pub mod tenor;

use thiserror::Error;

use crate::model::OptionRow;

pub use buckets::{BucketReport, aggregate_buckets};
pub use max_tenor::add_max_tenor;
pub use relative_strike::{SpotPrice, SpotSource, add_relative_strike, resolve_spot_price};
pub use tenor::{add_tenor, resolve_snap_date};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnrichError {
    /// A row whose date or numeric field cannot be parsed. `row` is the file
    /// line at ingestion and the position within the row set afterwards.
    #[error("Malformed row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },

    #[error("No usable spot price for `{ticker}`: {reason}")]
    MissingReferencePrice { ticker: String, reason: String },

    #[error("Row {row} has relative_strike {relative_strike} outside every strike bucket")]
    UnassignedBucket { row: usize, relative_strike: f64 },

    #[error("Row {row} is missing `{field}`, which the {stage} stage requires")]
    MissingField {
        row: usize,
        field: &'static str,
        stage: &'static str,
    },

    #[error("No option rows for `{ticker}`")]
    EmptyRowSource { ticker: String },

    /// Reading the ticker's option files or writing its outputs failed.
    #[error("I/O error for `{ticker}`: {reason}")]
    Io { ticker: String, reason: String },
}

/// Output of a stage that may exclude individual rows.
#[derive(Debug, Clone, Default)]
pub struct Enriched {
    pub rows: Vec<OptionRow>,
    pub rejected: Vec<EnrichError>,
}
