//! Property-based tests for gravity-lab
//!
//! - Test mathematical invariants of the metrics and rankings
//! - Test the leakage guard of the temporal split
//! - Test that cleaning never takes the log of a non-positive value
//! - Run with ProptestConfig::with_cases(100)

use gravity_lab::evaluation::{rank_importances, rmse};
use gravity_lab::panel::{ModelingDataset, ModelingRecord, RawObservation};
use gravity_lab::split::{temporal_split, FeatureSet};
use gravity_lab::panel::columns;
use gravity_lab::Error;
use proptest::prelude::*;

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Paired vectors of equal length
fn arb_pairs(max_len: usize) -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (1..=max_len).prop_flat_map(|n| {
        (
            proptest::collection::vec(-1.0e3f64..1.0e3, n),
            proptest::collection::vec(-1.0e3f64..1.0e3, n),
        )
    })
}

/// Distinct importance scores in shuffled order
fn arb_scores(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    (1..=max_len).prop_flat_map(|n| {
        Just((0..n).map(|i| f64::from(u32::try_from(i).unwrap_or(0))).collect::<Vec<_>>())
            .prop_shuffle()
    })
}

/// A raw cell: missing, non-positive, or positive
fn arb_cell() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![
        Just(None),
        Just(Some(0.0)),
        (-1.0e6f64..0.0).prop_map(Some),
        (1.0e-3f64..1.0e12).prop_map(Some),
        (1.0e-3f64..1.0e12).prop_map(Some),
    ]
}

fn modeling_record(year: i64, x: f64) -> ModelingRecord {
    ModelingRecord {
        year,
        iso3_o: Some("AAA".into()),
        iso3_d: Some("BBB".into()),
        eu_o: Some(0.0),
        eu_d: Some(0.0),
        contig: Some(0.0),
        comlang_off: Some(1.0),
        log_exports: x,
        log_dist: x * 0.5,
        log_gdp_o: x + 1.0,
        log_gdp_d: x + 2.0,
        log_pop_o: 1.0,
        log_pop_d: 2.0,
        log_gdp_o_x_log_gdp_d: (x + 1.0) * (x + 2.0),
        log_dist_x_contig: Some(0.0),
        log_dist_x_comlang: Some(x * 0.5),
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: RMSE is non-negative
    #[test]
    fn prop_rmse_non_negative((y_true, y_pred) in arb_pairs(64)) {
        let value = rmse(&y_true, &y_pred).unwrap();
        prop_assert!(value >= 0.0);
    }

    /// Property: RMSE is zero iff predictions equal the targets
    #[test]
    fn prop_rmse_zero_iff_equal((y_true, y_pred) in arb_pairs(64)) {
        prop_assert_eq!(rmse(&y_true, &y_true).unwrap(), 0.0);

        let value = rmse(&y_true, &y_pred).unwrap();
        let identical = y_true.iter().zip(&y_pred).all(|(a, b)| a == b);
        prop_assert_eq!(value == 0.0, identical);
    }

    /// Property: Importance ranking is invariant under positive affine rescaling
    #[test]
    fn prop_ranking_invariant_under_rescale(
        scores in arb_scores(30),
        scale in 0.01f64..100.0,
        shift in -10.0f64..10.0
    ) {
        let names: Vec<String> = (0..scores.len()).map(|i| format!("f{i}")).collect();
        let rescaled: Vec<f64> = scores.iter().map(|s| s * scale + shift).collect();

        let original = rank_importances(&names, &scores, "RandomForest").unwrap();
        let transformed = rank_importances(&names, &rescaled, "RandomForest").unwrap();

        let order = |ranked: &[gravity_lab::evaluation::ImportanceRecord]| -> Vec<String> {
            ranked.iter().map(|r| r.feature.clone()).collect()
        };
        prop_assert_eq!(order(&original), order(&transformed));
        for pair in original.windows(2) {
            prop_assert!(pair[0].importance >= pair[1].importance);
        }
    }

    /// Property: Importance ranking is invariant under non-linear increasing maps
    #[test]
    fn prop_ranking_invariant_under_monotone_map(
        scores in arb_scores(30),
        use_exp in any::<bool>()
    ) {
        let names: Vec<String> = (0..scores.len()).map(|i| format!("f{i}")).collect();
        let mapped: Vec<f64> = if use_exp {
            scores.iter().map(|s| (s / 10.0).exp()).collect()
        } else {
            scores.iter().map(|s| (s + 1.0).sqrt()).collect()
        };

        let original = rank_importances(&names, &scores, "GradientBoosting").unwrap();
        let transformed = rank_importances(&names, &mapped, "GradientBoosting").unwrap();

        let order = |ranked: &[gravity_lab::evaluation::ImportanceRecord]| -> Vec<String> {
            ranked.iter().map(|r| r.feature.clone()).collect()
        };
        prop_assert_eq!(order(&original), order(&transformed));
    }

    /// Property: Train and test partitions never share a year
    #[test]
    fn prop_split_is_disjoint(
        years in proptest::collection::vec(2000i64..=2020, 1..80),
        train_end in 2000i64..2020,
        gap in 1i64..4
    ) {
        let test_start = train_end + gap;
        let records: Vec<ModelingRecord> = years
            .iter()
            .enumerate()
            .map(|(i, &y)| modeling_record(y, f64::from(u32::try_from(i).unwrap_or(0)) * 0.1))
            .collect();
        let dataset = ModelingDataset::from_records(&records).unwrap();

        let expected_train = years.iter().filter(|&&y| y <= train_end).count();
        let expected_test = years.iter().filter(|&&y| y >= test_start).count();

        match temporal_split(&dataset, train_end, test_start, columns::TARGET, FeatureSet::WithInteractions) {
            Ok(split) => {
                prop_assert_eq!(split.train_len(), expected_train);
                prop_assert_eq!(split.test_len(), expected_test);
                prop_assert!(split.train_len() + split.test_len() <= years.len());
            }
            Err(Error::EmptySplit { train_rows, test_rows }) => {
                prop_assert!(expected_train == 0 || expected_test == 0);
                prop_assert_eq!(train_rows, expected_train);
                prop_assert_eq!(test_rows, expected_test);
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    /// Property: Cleaning keeps a row iff every logged value is positive,
    /// and kept rows have finite log features
    #[test]
    fn prop_cleaning_positivity(
        exports in arb_cell(),
        dist in arb_cell(),
        gdp_o in arb_cell(),
        gdp_d in arb_cell(),
        pop_o in arb_cell(),
        pop_d in arb_cell(),
        contig in prop_oneof![Just(None), Just(Some(0.0)), Just(Some(1.0))]
    ) {
        let raw = RawObservation {
            year: Some(2010),
            exports,
            dist,
            gdp_o,
            gdp_d,
            pop_o,
            pop_d,
            contig,
            ..RawObservation::default()
        };
        let all_positive = [exports, dist, gdp_o, gdp_d, pop_o, pop_d]
            .iter()
            .all(|v| v.is_some_and(|x| x > 0.0));

        match ModelingRecord::derive(raw) {
            Some(record) => {
                prop_assert!(all_positive);
                for value in [
                    record.log_exports,
                    record.log_dist,
                    record.log_gdp_o,
                    record.log_gdp_d,
                    record.log_pop_o,
                    record.log_pop_d,
                    record.log_gdp_o_x_log_gdp_d,
                ] {
                    prop_assert!(value.is_finite());
                }
                prop_assert_eq!(record.log_dist_x_contig.is_some(), contig.is_some());
            }
            None => prop_assert!(!all_positive),
        }
    }
}
