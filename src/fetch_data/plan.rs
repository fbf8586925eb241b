use chrono::NaiveDate;
use tracing::info;

use super::types::ExpirationFilter;
use crate::model::OptionRow;

/// Select which of the listed expirations to download.
pub fn pick_expirations(available: &[NaiveDate], filter: &ExpirationFilter) -> Vec<NaiveDate> {
    let picked: Vec<NaiveDate> = match filter {
        ExpirationFilter::All => available.to_vec(),
        ExpirationFilter::Exact(dates) => available
            .iter()
            .filter(|d| dates.contains(d))
            .copied()
            .collect(),
        ExpirationFilter::Range { start, end } => available
            .iter()
            .filter(|d| start.is_none_or(|s| **d >= s) && end.is_none_or(|e| **d <= e))
            .copied()
            .collect(),
    };
    info!(
        picked = picked.len(),
        available = available.len(),
        filter = %filter.file_tag(),
        "picked expirations"
    );
    picked
}

/// Keep contracts with open interest and a recorded last trade.
pub fn apply_filters(rows: Vec<OptionRow>) -> Vec<OptionRow> {
    rows.into_iter()
        .filter(|r| r.open_interest.unwrap_or(0.0) > 0.0)
        .filter(|r| r.last_trade_date.as_deref().is_some_and(|d| !d.trim().is_empty()))
        .collect()
}

/// Sort by expiration, then type (calls first), then strike.
pub fn sort_rows(rows: &mut [OptionRow]) {
    rows.sort_by(|a, b| {
        a.expiration
            .cmp(&b.expiration)
            .then_with(|| a.option_type.cmp(&b.option_type))
            .then(a.strike.total_cmp(&b.strike))
    });
}

/// `<TICKER>_options_<tag>_filtered.csv`
pub fn chain_file_name(ticker: &str, filter: &ExpirationFilter) -> String {
    format!("{ticker}_options_{}_filtered.csv", filter.file_tag())
}
