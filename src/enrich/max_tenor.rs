use std::collections::HashMap;

use super::EnrichError;
use crate::model::OptionRow;

/// Strikes compare by exact value. `+0.0` and `-0.0` are folded together so
/// the key agrees with `==`.
fn strike_key(strike: f64) -> u64 {
    if strike == 0.0 { 0 } else { strike.to_bits() }
}

/// Broadcast, onto every row, the largest `tenor_days` among rows sharing
/// its strike. Output has the same rows in the same order.
///
/// One pass builds strike -> running max, a second pass assigns it.
pub fn add_max_tenor(rows: &[OptionRow]) -> Result<Vec<OptionRow>, EnrichError> {
    let mut max_by_strike: HashMap<u64, i64> = HashMap::new();

    for (idx, row) in rows.iter().enumerate() {
        let tenor = row.tenor_days.ok_or(EnrichError::MissingField {
            row: idx,
            field: "tenor_days",
            stage: "max tenor",
        })?;
        max_by_strike
            .entry(strike_key(row.strike))
            .and_modify(|m| *m = (*m).max(tenor))
            .or_insert(tenor);
    }

    Ok(rows
        .iter()
        .map(|row| {
            let mut enriched = row.clone();
            enriched.max_tenor_for_strike = max_by_strike.get(&strike_key(row.strike)).copied();
            enriched
        })
        .collect())
}
