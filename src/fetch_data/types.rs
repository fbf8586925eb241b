use std::path::PathBuf;

use chrono::NaiveDate;

use crate::config::{ConfigError, PipelineConfig};
use crate::dates::{DateParseError, parse_date, parse_optional_date};

// ── Expiration filter ───────────────────────────────────────────────

/// Which expirations to download.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExpirationFilter {
    /// Every listed expiration.
    #[default]
    All,
    /// Inclusive range; either end may be open.
    Range {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
    /// Exactly these expirations, sorted.
    Exact(Vec<NaiveDate>),
}

impl ExpirationFilter {
    /// Exact dates win over a range; no filters means all expirations.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        if !config.exp_dates.is_empty() {
            let mut dates = config
                .exp_dates
                .iter()
                .map(|d| parse_date(d))
                .collect::<Result<Vec<_>, _>>()
                .map_err(invalid("exp_dates"))?;
            dates.sort();
            dates.dedup();
            return Ok(ExpirationFilter::Exact(dates));
        }

        let start = parse_optional_date(config.exp_start.as_deref())
            .map_err(invalid("exp_start"))?;
        let end = parse_optional_date(config.exp_end.as_deref())
            .map_err(invalid("exp_end"))?;
        if start.is_some() || end.is_some() {
            return Ok(ExpirationFilter::Range { start, end });
        }
        Ok(ExpirationFilter::All)
    }

    /// Tag used in the chain file name.
    pub fn file_tag(&self) -> String {
        match self {
            ExpirationFilter::All => "all_expirations".to_string(),
            ExpirationFilter::Range { start, end } => {
                let fmt = |d: &Option<NaiveDate>, open: &str| {
                    d.map(|d| d.to_string()).unwrap_or_else(|| open.to_string())
                };
                format!("range_{}_to_{}", fmt(start, "MIN"), fmt(end, "MAX"))
            }
            ExpirationFilter::Exact(dates) => {
                let joined: Vec<String> = dates.iter().map(|d| d.to_string()).collect();
                format!("exact_{}", joined.join("_"))
            }
        }
    }
}

fn invalid(field: &'static str) -> impl Fn(DateParseError) -> ConfigError {
    move |source| ConfigError::InvalidDate { field, source }
}

// ── Fetch result ────────────────────────────────────────────────────

/// Outcome of downloading one ticker's chain.
#[derive(Debug, Clone)]
pub struct FetchedTicker {
    pub ticker: String,
    pub path: PathBuf,
    pub rows_before: usize,
    pub rows_after: usize,
    pub spot_price: Option<f64>,
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Retry an async operation with exponential backoff.
pub async fn retry<T, F, Fut>(max_retries: u32, f: F) -> anyhow::Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<T>>,
{
    let mut last_err = None;
    for attempt in 0..=max_retries {
        match f().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                tracing::debug!(attempt, "request failed: {e:#}");
                last_err = Some(e);
                if attempt < max_retries {
                    let delay = std::time::Duration::from_millis(1000 * 2u64.pow(attempt));
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("no attempts made")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn config(json: &str) -> PipelineConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_exact_dates_take_priority() {
        let filter = ExpirationFilter::from_config(&config(
            r#"{"exp_dates": ["21-02-2025", "2025-01-17"], "exp_start": "2025-01-01"}"#,
        ))
        .unwrap();
        assert_eq!(
            filter,
            ExpirationFilter::Exact(vec![ymd(2025, 1, 17), ymd(2025, 2, 21)])
        );
        assert_eq!(filter.file_tag(), "exact_2025-01-17_2025-02-21");
    }

    #[test]
    fn test_open_range() {
        let filter = ExpirationFilter::from_config(&config(r#"{"exp_end": "2025-03-21"}"#)).unwrap();
        assert_eq!(
            filter,
            ExpirationFilter::Range {
                start: None,
                end: Some(ymd(2025, 3, 21))
            }
        );
        assert_eq!(filter.file_tag(), "range_MIN_to_2025-03-21");
    }

    #[test]
    fn test_no_filters_means_all() {
        let filter = ExpirationFilter::from_config(&config(r#"{"exp_start": ""}"#)).unwrap();
        assert_eq!(filter, ExpirationFilter::All);
        assert_eq!(filter.file_tag(), "all_expirations");
    }

    #[test]
    fn test_bad_exp_date() {
        let err = ExpirationFilter::from_config(&config(r#"{"exp_dates": ["soon"]}"#)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDate { field: "exp_dates", .. }));
    }
}
