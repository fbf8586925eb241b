//! Property tests for the enrichment stages.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

use options_enrich::enrich::{add_max_tenor, add_relative_strike, add_tenor, aggregate_buckets, buckets::assign_bucket};
use options_enrich::model::{OptionRow, StrikeBucket};
use options_enrich::pipeline::{NoopObserver, PipelineParams, TickerInput, run_ticker};

const STRIKES: [f64; 5] = [50.0, 100.0, 125.0, 150.0, 200.0];

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 7).unwrap()
}

fn rows_from(specs: &[(usize, i64)], snap: NaiveDate) -> Vec<OptionRow> {
    specs
        .iter()
        .map(|(strike_idx, offset)| {
            let expiration = snap + Duration::days(*offset);
            OptionRow::new("TEST", &expiration.to_string(), STRIKES[*strike_idx])
        })
        .collect()
}

fn row_specs() -> impl Strategy<Value = Vec<(usize, i64)>> {
    prop::collection::vec((0..STRIKES.len(), -60i64..400), 1..40)
}

proptest! {
    #[test]
    fn tenor_is_day_difference(snap_shift in -2000i64..2000, specs in row_specs()) {
        let snap = base_date() + Duration::days(snap_shift);
        let rows = rows_from(&specs, snap);
        let out = add_tenor(&rows, snap);

        prop_assert!(out.rejected.is_empty());
        prop_assert_eq!(out.rows.len(), specs.len());
        for (row, (_, offset)) in out.rows.iter().zip(&specs) {
            prop_assert_eq!(row.tenor_days, Some(*offset));
            prop_assert_eq!(row.snap_date, Some(snap));
        }
    }

    #[test]
    fn max_tenor_is_group_max_and_idempotent(specs in row_specs()) {
        let tenor = add_tenor(&rows_from(&specs, base_date()), base_date());
        let once = add_max_tenor(&tenor.rows).unwrap();

        let mut expected: HashMap<usize, i64> = HashMap::new();
        for (strike_idx, offset) in &specs {
            let entry = expected.entry(*strike_idx).or_insert(*offset);
            *entry = (*entry).max(*offset);
        }
        for (row, (strike_idx, _)) in once.iter().zip(&specs) {
            prop_assert_eq!(row.max_tenor_for_strike, Some(expected[strike_idx]));
        }

        let twice = add_max_tenor(&once).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn relative_strike_scales_inversely_with_spot(
        strike in 0.5f64..5000.0,
        spot in 1.0f64..5000.0,
        k in 0.1f64..10.0,
    ) {
        let rows = vec![OptionRow::new("TEST", "2025-01-17", strike)];
        let base = add_relative_strike(&rows, "TEST", spot).unwrap()[0].relative_strike.unwrap();
        let scaled = add_relative_strike(&rows, "TEST", spot * k).unwrap()[0].relative_strike.unwrap();

        prop_assert!((base - (strike / spot).abs() * 100.0).abs() <= 1e-9 * base.abs().max(1.0));
        let expected = base / k;
        prop_assert!((scaled - expected).abs() <= 1e-9 * expected.abs().max(1.0));
    }

    #[test]
    fn gapless_buckets_assign_exactly_once(
        widths in prop::collection::vec(0.5f64..50.0, 1..10),
        frac in 0.0f64..1.0,
    ) {
        let mut buckets = Vec::new();
        let mut lower = 0.0;
        for w in &widths {
            buckets.push(StrikeBucket::new(lower, lower + w));
            lower += w;
        }
        let rel = frac * lower;
        prop_assume!(rel < lower);

        let containing = buckets.iter().filter(|b| b.contains(rel)).count();
        prop_assert_eq!(containing, 1);
        let idx = assign_bucket(&buckets, rel).unwrap();
        prop_assert!(buckets[idx].contains(rel));

        let mut row = OptionRow::new("TEST", "2025-01-17", 100.0);
        row.relative_strike = Some(rel);
        row.max_tenor_for_strike = Some(10);
        let report = aggregate_buckets("TEST", &[row], &buckets).unwrap();
        prop_assert!(report.unassigned.is_empty());
        prop_assert_eq!(report.summaries.len(), 1);
        prop_assert_eq!(report.empty_buckets.len(), buckets.len() - 1);
    }

    #[test]
    fn pipeline_is_idempotent_on_its_output(specs in row_specs(), spot in 20.0f64..400.0) {
        let overrides = BTreeMap::from([("TEST".to_string(), spot)]);
        let buckets = vec![
            StrikeBucket::new(0.0, 50.0),
            StrikeBucket::new(50.0, 100.0),
            StrikeBucket::new(100.0, 1000.0),
        ];
        let params = PipelineParams {
            snap_date: base_date(),
            spot_price_overrides: &overrides,
            buckets: &buckets,
        };
        let input = TickerInput::new("TEST", rows_from(&specs, base_date()));

        let first = run_ticker(input, &params, &NoopObserver).result.unwrap();
        let again = TickerInput::new("TEST", first.rows.clone());
        let second = run_ticker(again, &params, &NoopObserver).result.unwrap();

        prop_assert_eq!(&first.rows, &second.rows);
        prop_assert_eq!(&first.buckets, &second.buckets);
    }
}
