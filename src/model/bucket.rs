use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A half-open interval `[lower, upper)` over relative strike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StrikeBucket {
    /// Optional display label. Defaults to the interval, e.g. `[25, 35)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Inclusive lower bound (percent of spot).
    pub lower: f64,
    /// Exclusive upper bound (percent of spot).
    pub upper: f64,
}

impl StrikeBucket {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self {
            label: None,
            lower,
            upper,
        }
    }

    pub fn labelled(label: &str, lower: f64, upper: f64) -> Self {
        Self {
            label: Some(label.to_string()),
            lower,
            upper,
        }
    }

    pub fn label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| format!("[{}, {})", self.lower, self.upper))
    }

    pub fn contains(&self, relative_strike: f64) -> bool {
        relative_strike >= self.lower && relative_strike < self.upper
    }
}

/// Per-(ticker, bucket) summary. Only emitted for buckets that received rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSummary {
    pub ticker: String,
    pub label: String,
    pub lower: f64,
    pub upper: f64,
    /// Number of rows assigned to the bucket.
    pub rows: usize,
    pub max_relative_strike: f64,
    /// Largest per-strike max tenor among the bucket's rows.
    pub max_tenor_for_strike: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_is_half_open() {
        let b = StrikeBucket::new(25.0, 35.0);
        assert!(b.contains(25.0));
        assert!(b.contains(34.999));
        assert!(!b.contains(35.0));
        assert!(!b.contains(24.999));
        assert!(!b.contains(f64::NAN));
    }

    #[test]
    fn test_default_label() {
        assert_eq!(StrikeBucket::new(0.0, 25.0).label(), "[0, 25)");
        assert_eq!(StrikeBucket::new(92.5, 97.5).label(), "[92.5, 97.5)");
        assert_eq!(StrikeBucket::labelled("atm", 97.5, 102.5).label(), "atm");
    }

    #[test]
    fn test_bucket_config_json() {
        let buckets: Vec<StrikeBucket> =
            serde_json::from_str(r#"[{"lower": 0, "upper": 25}, {"label": "otm", "lower": 25, "upper": 35}]"#)
                .unwrap();
        assert_eq!(buckets[0], StrikeBucket::new(0.0, 25.0));
        assert_eq!(buckets[1].label(), "otm");
    }
}
