use chrono::NaiveDate;
use tracing::warn;

use super::{EnrichError, Enriched};
use crate::dates::parse_date;
use crate::model::OptionRow;

/// The configured snapshot date wins; otherwise the caller's notion of today.
pub fn resolve_snap_date(configured: Option<NaiveDate>, today: NaiveDate) -> NaiveDate {
    configured.unwrap_or(today)
}

/// Stamp every row with `snap_date` and `tenor_days = expiration - snap_date`.
///
/// Rows whose expiration does not parse are excluded and reported. Negative
/// tenors (already expired contracts) pass through.
pub fn add_tenor(rows: &[OptionRow], snap_date: NaiveDate) -> Enriched {
    let mut out = Enriched {
        rows: Vec::with_capacity(rows.len()),
        rejected: Vec::new(),
    };

    for (idx, row) in rows.iter().enumerate() {
        match parse_date(&row.expiration) {
            Ok(expiration) => {
                let mut enriched = row.clone();
                enriched.snap_date = Some(snap_date);
                enriched.tenor_days = Some((expiration - snap_date).num_days());
                out.rows.push(enriched);
            }
            Err(e) => {
                warn!(ticker = %row.ticker, row = idx, contract = %row.describe(), "{e}");
                out.rejected.push(EnrichError::MalformedRow {
                    row: idx,
                    reason: format!("{}: expiration: {e}", row.describe()),
                });
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_tenor_in_whole_days() {
        let rows = vec![
            OptionRow::new("AAPL", "2025-01-17", 100.0),
            OptionRow::new("AAPL", "17-02-2025", 100.0),
        ];
        let out = add_tenor(&rows, ymd(2025, 1, 7));
        assert!(out.rejected.is_empty());
        assert_eq!(out.rows[0].tenor_days, Some(10));
        assert_eq!(out.rows[1].tenor_days, Some(41));
        assert!(out.rows.iter().all(|r| r.snap_date == Some(ymd(2025, 1, 7))));
    }

    #[test]
    fn test_expired_contract_has_negative_tenor() {
        let rows = vec![OptionRow::new("AAPL", "2024-12-20", 100.0)];
        let out = add_tenor(&rows, ymd(2025, 1, 7));
        assert_eq!(out.rows[0].tenor_days, Some(-18));
    }

    #[test]
    fn test_snapshot_on_expiry_day_is_zero() {
        let rows = vec![OptionRow::new("AAPL", "2025-01-07", 100.0)];
        let out = add_tenor(&rows, ymd(2025, 1, 7));
        assert_eq!(out.rows[0].tenor_days, Some(0));
    }

    #[test]
    fn test_malformed_expiration_is_isolated() {
        let rows = vec![
            OptionRow::new("AAPL", "2025-01-17", 100.0),
            OptionRow::new("AAPL", "next friday", 105.0),
            OptionRow::new("AAPL", "2025-01-24", 110.0),
        ];
        let out = add_tenor(&rows, ymd(2025, 1, 7));
        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.rows[1].strike, 110.0);
        assert!(matches!(
            out.rejected.as_slice(),
            [EnrichError::MalformedRow { row: 1, .. }]
        ));
    }

    #[test]
    fn test_input_rows_are_untouched() {
        let rows = vec![OptionRow::new("AAPL", "2025-01-17", 100.0)];
        let _ = add_tenor(&rows, ymd(2025, 1, 7));
        assert_eq!(rows[0].tenor_days, None);
    }

    #[test]
    fn test_snap_date_resolution() {
        let today = ymd(2025, 6, 1);
        assert_eq!(resolve_snap_date(None, today), today);
        assert_eq!(
            resolve_snap_date(Some(ymd(2025, 1, 7)), today),
            ymd(2025, 1, 7)
        );
    }

    #[test]
    fn test_rejection_names_the_contract() {
        let mut bad = OptionRow::new("AAPL", "someday", 100.0);
        bad.contract_symbol = Some("AAPL250117C00100000".into());
        let rows = vec![OptionRow::new("AAPL", "2025-01-17", 100.0), bad];

        let out = add_tenor(&rows, ymd(2025, 1, 7));

        match &out.rejected[..] {
            [EnrichError::MalformedRow { row, reason }] => {
                assert_eq!(*row, 1);
                assert!(reason.starts_with("AAPL250117C00100000: expiration:"), "{reason}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
