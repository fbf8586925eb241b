use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::dates::{DateParseError, parse_optional_date};
use crate::model::StrikeBucket;

pub const DEFAULT_CONFIG_PATH: &str = "config/parameters.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON parse error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid `{field}`: {source}")]
    InvalidDate {
        field: &'static str,
        source: DateParseError,
    },

    #[error("spot_price_overrides[`{ticker}`] = {value} must be a positive number")]
    InvalidOverride { ticker: String, value: f64 },

    #[error("strike_buckets is missing or empty")]
    NoBuckets,
}

/// Pipeline configuration, normally `config/parameters.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineConfig {
    /// Symbols to process. Normalised to uppercase on load.
    #[serde(default)]
    pub tickers: Vec<String>,
    /// Root directory holding one sub-directory per ticker.
    #[serde(default = "default_outdir")]
    pub outdir: String,
    /// Snapshot date (`YYYY-MM-DD` or `DD-MM-YYYY`). Blank or absent means today (UTC).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snap_date: Option<String>,
    /// Date used for the snapshot folder and fair-value lookup.
    /// Defaults to the resolved snap date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valuation_date: Option<String>,
    /// Per-ticker spot price that takes precedence over fetched prices.
    #[serde(default)]
    pub spot_price_overrides: BTreeMap<String, f64>,
    /// Ordered relative-strike buckets. First match wins.
    #[serde(default)]
    pub strike_buckets: Vec<StrikeBucket>,
    /// Earliest expiration to fetch (inclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp_start: Option<String>,
    /// Latest expiration to fetch (inclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp_end: Option<String>,
    /// Exact expirations to fetch. Takes precedence over the range.
    #[serde(default)]
    pub exp_dates: Vec<String>,
    /// Portfolio CSV annotated by the `fair-value` command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio_file: Option<String>,
    /// Directory of basket portfolio CSVs priced by `basket-fair-value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basket_portfolio_input: Option<String>,
    /// Directory the annotated basket portfolios are written to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basket_portfolio_output: Option<String>,
}

fn default_outdir() -> String {
    "csv_out".to_string()
}

/// Standalone bucket file: `{ "strike_buckets": [...] }`.
#[derive(Debug, Deserialize)]
struct BucketFile {
    #[serde(default)]
    strike_buckets: Vec<StrikeBucket>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tickers: Vec::new(),
            outdir: default_outdir(),
            snap_date: None,
            valuation_date: None,
            spot_price_overrides: BTreeMap::new(),
            strike_buckets: Vec::new(),
            exp_start: None,
            exp_end: None,
            exp_dates: Vec::new(),
            portfolio_file: None,
            basket_portfolio_input: None,
            basket_portfolio_output: None,
        }
    }
}

impl PipelineConfig {
    /// Load, normalise, and check a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = read(path)?;
        let config: PipelineConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        config.normalised()
    }

    /// Uppercase tickers and override keys, reject non-positive overrides,
    /// and make sure the dates parse.
    pub fn normalised(mut self) -> Result<Self, ConfigError> {
        self.tickers = self
            .tickers
            .iter()
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty())
            .collect();
        self.spot_price_overrides = self
            .spot_price_overrides
            .into_iter()
            .map(|(k, v)| (k.trim().to_uppercase(), v))
            .collect();

        for (ticker, &value) in &self.spot_price_overrides {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidOverride {
                    ticker: ticker.clone(),
                    value,
                });
            }
        }

        self.snap_date()?;
        self.valuation_date()?;
        Ok(self)
    }

    pub fn outdir(&self) -> PathBuf {
        PathBuf::from(&self.outdir)
    }

    pub fn snap_date(&self) -> Result<Option<NaiveDate>, ConfigError> {
        parse_optional_date(self.snap_date.as_deref()).map_err(|source| ConfigError::InvalidDate {
            field: "snap_date",
            source,
        })
    }

    pub fn valuation_date(&self) -> Result<Option<NaiveDate>, ConfigError> {
        parse_optional_date(self.valuation_date.as_deref()).map_err(|source| {
            ConfigError::InvalidDate {
                field: "valuation_date",
                source,
            }
        })
    }

    /// Valuation date, else snap date, else `today`.
    pub fn resolve_valuation_date(&self, today: NaiveDate) -> Result<NaiveDate, ConfigError> {
        Ok(self
            .valuation_date()?
            .or(self.snap_date()?)
            .unwrap_or(today))
    }

    /// Buckets from `bucket_file` when given, otherwise from this config.
    /// Overlaps and gaps are logged; an empty list is an error.
    pub fn resolve_buckets(&self, bucket_file: Option<&Path>) -> Result<Vec<StrikeBucket>, ConfigError> {
        let buckets = match bucket_file {
            Some(path) => load_buckets(path)?,
            None => self.strike_buckets.clone(),
        };
        if buckets.is_empty() {
            return Err(ConfigError::NoBuckets);
        }
        for issue in lint_buckets(&buckets) {
            warn!("strike buckets: {issue}");
        }
        Ok(buckets)
    }
}

/// Load a standalone `{ "strike_buckets": [...] }` file.
pub fn load_buckets(path: &Path) -> Result<Vec<StrikeBucket>, ConfigError> {
    let contents = read(path)?;
    let file: BucketFile = serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(file.strike_buckets)
}

/// Describe inverted intervals, gaps, and overlaps between consecutive buckets.
/// Assignment still proceeds first-match; these are advisory only.
pub fn lint_buckets(buckets: &[StrikeBucket]) -> Vec<String> {
    let mut issues = Vec::new();

    for b in buckets {
        if !(b.lower < b.upper) {
            issues.push(format!("{} is empty (lower >= upper)", b.label()));
        }
    }
    for pair in buckets.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if b.lower > a.upper {
            issues.push(format!("gap between {} and {}", a.label(), b.label()));
        } else if b.lower < a.upper {
            issues.push(format!("{} overlaps {}", a.label(), b.label()));
        }
    }

    issues
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
