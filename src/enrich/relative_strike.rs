use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::EnrichError;
use crate::model::OptionRow;

/// Where a ticker's reference price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotSource {
    /// `spot_price_overrides` in the configuration.
    Override,
    /// Carried on the rows by the fetcher (or a previous run).
    Embedded,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotPrice {
    pub value: f64,
    pub source: SpotSource,
}

/// Resolve the reference price for one ticker. A configured override takes
/// precedence over any price embedded in the rows.
pub fn resolve_spot_price(
    ticker: &str,
    overrides: &BTreeMap<String, f64>,
    rows: &[OptionRow],
) -> Result<SpotPrice, EnrichError> {
    if let Some(&value) = overrides.get(ticker) {
        check_spot(ticker, value)?;
        debug!(ticker, spot = value, "using spot_price override");
        return Ok(SpotPrice {
            value,
            source: SpotSource::Override,
        });
    }

    let mut embedded = rows.iter().filter_map(|r| r.spot_price);
    let Some(value) = embedded.next() else {
        return Err(EnrichError::MissingReferencePrice {
            ticker: ticker.to_string(),
            reason: "no override configured and no spot_price on the rows".into(),
        });
    };
    if embedded.any(|other| other != value) {
        warn!(ticker, spot = value, "rows carry differing spot prices, using the first");
    }
    check_spot(ticker, value)?;
    Ok(SpotPrice {
        value,
        source: SpotSource::Embedded,
    })
}

/// Stamp every row with `spot_price` and `relative_strike = |strike / spot| * 100`.
pub fn add_relative_strike(
    rows: &[OptionRow],
    ticker: &str,
    spot: f64,
) -> Result<Vec<OptionRow>, EnrichError> {
    check_spot(ticker, spot)?;
    Ok(rows
        .iter()
        .map(|row| {
            let mut enriched = row.clone();
            enriched.spot_price = Some(spot);
            enriched.relative_strike = Some((row.strike / spot).abs() * 100.0);
            enriched
        })
        .collect())
}

fn check_spot(ticker: &str, value: f64) -> Result<(), EnrichError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EnrichError::MissingReferencePrice {
            ticker: ticker.to_string(),
            reason: format!("spot_price {value} is not a positive number"),
        })
    }
}
