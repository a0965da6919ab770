#![forbid(unsafe_code)]

//! Property tests for the as-of indexer.
//!
//! Every generated input is sorted on the key; the engine is compared against
//! a quadratic reference that scans all right rows for each left row.

use proptest::prelude::*;

use fp_asof::{AsofError, AsofExecutionOptions, AsofParams, ByColumns, asof_indexer};
use fp_columnar::Column;
use fp_types::Scalar;

// ---------------------------------------------------------------------------
// Strategy generators
// ---------------------------------------------------------------------------

/// Sorted keys drawn from a small range so ties and exact matches are common.
fn arb_sorted_keys(max_len: usize) -> impl Strategy<Value = Vec<i64>> {
    proptest::collection::vec(-20_i64..20, 0..=max_len).prop_map(|mut keys| {
        keys.sort_unstable();
        keys
    })
}

/// Keys plus a parallel group column with `groups` distinct values.
fn arb_grouped_side(max_len: usize, groups: i64) -> impl Strategy<Value = (Vec<i64>, Vec<i64>)> {
    arb_sorted_keys(max_len).prop_flat_map(move |keys| {
        let len = keys.len();
        (Just(keys), proptest::collection::vec(0..groups, len))
    })
}

fn arb_tolerance() -> impl Strategy<Value = Option<i64>> {
    prop_oneof![
        1 => Just(None),
        2 => (0_i64..8).prop_map(Some),
    ]
}

/// Keys with at least one strict decrease.
fn arb_unsorted_keys() -> impl Strategy<Value = Vec<i64>> {
    (proptest::collection::vec(-20_i64..20, 0..10), 1_i64..10).prop_map(|(mut keys, drop)| {
        keys.sort_unstable();
        let last = keys.last().copied().unwrap_or(0);
        keys.push(last);
        keys.push(last - drop);
        keys
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn int_column(values: &[i64]) -> Column {
    Column::from_values(values.iter().copied().map(Scalar::Int64).collect()).expect("int column")
}

fn float_column(values: &[i64]) -> Column {
    Column::from_values(values.iter().map(|v| Scalar::Float64(*v as f64)).collect())
        .expect("float column")
}

fn timestamp_column(values: &[i64]) -> Column {
    Column::from_values(values.iter().copied().map(Scalar::Timestamp).collect())
        .expect("timestamp column")
}

fn string_column(values: &[i64]) -> Column {
    Column::from_values(values.iter().map(|v| Scalar::Utf8(format!("g{v}"))).collect())
        .expect("string column")
}

/// Split a group id into an integer level and a string level.
fn high_level(groups: &[i64]) -> Column {
    int_column(&groups.iter().map(|g| g / 2).collect::<Vec<_>>())
}

fn low_level(groups: &[i64]) -> Column {
    string_column(&groups.iter().map(|g| g % 2).collect::<Vec<_>>())
}

fn params(tolerance: Option<i64>, allow_exact_matches: bool) -> AsofParams {
    AsofParams {
        tolerance: tolerance.map(Scalar::Int64),
        allow_exact_matches,
    }
}

fn admits(right: i64, left: i64, allow_exact_matches: bool) -> bool {
    if allow_exact_matches {
        right <= left
    } else {
        right < left
    }
}

/// Quadratic reference: the last eligible right row in the same group.
fn reference(
    left: &[i64],
    right: &[i64],
    groups: Option<(&[i64], &[i64])>,
    tolerance: Option<i64>,
    allow_exact_matches: bool,
) -> Vec<Option<usize>> {
    left.iter()
        .enumerate()
        .map(|(i, &key)| {
            (0..right.len())
                .filter(|&j| admits(right[j], key, allow_exact_matches))
                .filter(|&j| groups.is_none_or(|(lg, rg)| lg[i] == rg[j]))
                .last()
                .filter(|&j| tolerance.is_none_or(|t| key - right[j] <= t))
        })
        .collect()
}

fn run(
    left: &Column,
    right: &Column,
    by: Option<ByColumns<'_>>,
    tolerance: Option<i64>,
    allow_exact_matches: bool,
) -> Vec<Option<usize>> {
    asof_indexer(left, right, by, &params(tolerance, allow_exact_matches)).expect("indexer")
}

// ---------------------------------------------------------------------------
// Property: agreement with the reference scan
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// The two-pointer scan agrees with the quadratic reference.
    #[test]
    fn prop_matches_reference_without_groups(
        left in arb_sorted_keys(24),
        right in arb_sorted_keys(24),
        tolerance in arb_tolerance(),
        allow_exact in any::<bool>(),
    ) {
        let matches = run(&int_column(&left), &int_column(&right), None, tolerance, allow_exact);
        prop_assert_eq!(matches, reference(&left, &right, None, tolerance, allow_exact));
    }

    /// Grouped scans agree with the reference for integer and string groups.
    #[test]
    fn prop_matches_reference_with_groups(
        (left, left_groups) in arb_grouped_side(24, 3),
        (right, right_groups) in arb_grouped_side(24, 3),
        tolerance in arb_tolerance(),
        allow_exact in any::<bool>(),
    ) {
        let expected = reference(
            &left,
            &right,
            Some((left_groups.as_slice(), right_groups.as_slice())),
            tolerance,
            allow_exact,
        );
        let left_keys = int_column(&left);
        let right_keys = int_column(&right);

        let lg = [&int_column(&left_groups)];
        let rg = [&int_column(&right_groups)];
        let by = ByColumns { left: &lg, right: &rg };
        prop_assert_eq!(&run(&left_keys, &right_keys, Some(by), tolerance, allow_exact), &expected);

        let lg = [&string_column(&left_groups)];
        let rg = [&string_column(&right_groups)];
        let by = ByColumns { left: &lg, right: &rg };
        prop_assert_eq!(&run(&left_keys, &right_keys, Some(by), tolerance, allow_exact), &expected);
    }

    /// Composite keys behave like the pair of their levels, with or without the arena.
    #[test]
    fn prop_composite_groups_match_reference(
        (left, left_groups) in arb_grouped_side(24, 4),
        (right, right_groups) in arb_grouped_side(24, 4),
        use_arena in any::<bool>(),
    ) {
        let groups = Some((left_groups.as_slice(), right_groups.as_slice()));
        let expected = reference(&left, &right, groups, None, true);

        let (lh, ll) = (high_level(&left_groups), low_level(&left_groups));
        let (rh, rl) = (high_level(&right_groups), low_level(&right_groups));
        let lg = [&lh, &ll];
        let rg = [&rh, &rl];

        let matches = fp_asof::asof_indexer_with_options(
            &int_column(&left),
            &int_column(&right),
            Some(ByColumns { left: &lg, right: &rg }),
            &AsofParams::default(),
            AsofExecutionOptions { use_arena, ..AsofExecutionOptions::default() },
        )
        .expect("indexer");
        prop_assert_eq!(matches, expected);
    }

    /// Int64, Float64 and Timestamp keys with the same values produce the same matches.
    #[test]
    fn prop_key_domains_agree(
        left in arb_sorted_keys(24),
        right in arb_sorted_keys(24),
        tolerance in arb_tolerance(),
        allow_exact in any::<bool>(),
    ) {
        let ints = run(&int_column(&left), &int_column(&right), None, tolerance, allow_exact);
        let floats = run(&float_column(&left), &float_column(&right), None, tolerance, allow_exact);
        let stamps = asof_indexer(
            &timestamp_column(&left),
            &timestamp_column(&right),
            None,
            &AsofParams {
                tolerance: tolerance.map(Scalar::Timedelta),
                allow_exact_matches: allow_exact,
            },
        )
        .expect("timestamp indexer");
        prop_assert_eq!(&ints, &floats);
        prop_assert_eq!(&ints, &stamps);
    }
}

// ---------------------------------------------------------------------------
// Property: structural guarantees
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// One output slot per left row, and every match lies at or before its left key.
    #[test]
    fn prop_order_preserved_and_backward_only(
        left in arb_sorted_keys(24),
        right in arb_sorted_keys(24),
        allow_exact in any::<bool>(),
    ) {
        let matches = run(&int_column(&left), &int_column(&right), None, None, allow_exact);
        prop_assert_eq!(matches.len(), left.len());
        for (i, slot) in matches.iter().enumerate() {
            if let Some(j) = *slot {
                prop_assert!(admits(right[j], left[i], allow_exact));
                prop_assert!(
                    right[j + 1..].iter().all(|&later| !admits(later, left[i], allow_exact)),
                    "a later right row was also eligible"
                );
            }
        }
    }

    /// Left rows never match across disjoint groups.
    #[test]
    fn prop_disjoint_groups_never_match(
        (left, left_groups) in arb_grouped_side(16, 3),
        (right, right_groups) in arb_grouped_side(16, 3),
    ) {
        let shifted: Vec<i64> = left_groups.iter().map(|g| g + 10).collect();
        let lg = [&int_column(&shifted)];
        let rg = [&int_column(&right_groups)];
        let by = ByColumns { left: &lg, right: &rg };
        let matches = run(&int_column(&left), &int_column(&right), Some(by), None, true);
        prop_assert!(matches.iter().all(Option::is_none));
    }

    /// A candidate exactly at the tolerance matches; one unit further does not.
    #[test]
    fn prop_tolerance_boundary_is_inclusive(right_key in -50_i64..50, gap in 1_i64..20) {
        let left = int_column(&[right_key + gap]);
        let right = int_column(&[right_key]);
        prop_assert_eq!(run(&left, &right, None, Some(gap), true), vec![Some(0)]);
        prop_assert_eq!(run(&left, &right, None, Some(gap - 1), true), vec![None]);
    }

    /// Within one group, matched right rows never move backward.
    #[test]
    fn prop_matches_are_monotonic_per_group(
        (left, left_groups) in arb_grouped_side(24, 3),
        (right, right_groups) in arb_grouped_side(24, 3),
    ) {
        let lg = [&int_column(&left_groups)];
        let rg = [&int_column(&right_groups)];
        let by = ByColumns { left: &lg, right: &rg };
        let matches = run(&int_column(&left), &int_column(&right), Some(by), None, true);

        for group in 0..3 {
            let rows: Vec<usize> = matches
                .iter()
                .zip(&left_groups)
                .filter(|(_, g)| **g == group)
                .filter_map(|(slot, _)| *slot)
                .collect();
            prop_assert!(rows.windows(2).all(|pair| pair[0] <= pair[1]));
        }
    }

    /// Any strict decrease on either side is rejected as unsorted input.
    #[test]
    fn prop_unsorted_keys_are_rejected(
        unsorted in arb_unsorted_keys(),
        sorted in arb_sorted_keys(8),
        unsorted_side_is_left in any::<bool>(),
    ) {
        let (left, right) = if unsorted_side_is_left {
            (&unsorted, &sorted)
        } else {
            (&sorted, &unsorted)
        };
        let err = asof_indexer(&int_column(left), &int_column(right), None, &AsofParams::default())
            .expect_err("unsorted keys must be rejected");
        prop_assert!(
            matches!(err, AsofError::UnsortedInput { .. }),
            "unexpected error {err:?}"
        );
    }
}
