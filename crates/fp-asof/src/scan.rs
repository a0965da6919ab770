//! Backward nearest-match scan over pre-sorted key sequences.

use std::hash::Hash;

use crate::groups::GroupIndexer;
use crate::keys::{AsofKey, Boundary, within_tolerance};

/// Match every left key against the latest admissible right key.
///
/// Both sequences must be sorted ascending. The right cursor never rewinds and
/// the retained candidate survives a failed tolerance check, so a later left
/// row re-tests the same candidate against its own distance.
pub fn backward_scan<K: AsofKey>(
    left: &[K],
    right: &[K],
    boundary: Boundary,
    tolerance: Option<K::Distance>,
) -> Vec<Option<usize>> {
    let mut matches = Vec::with_capacity(left.len());
    let mut cursor = 0;
    let mut last_ok = None;

    for &key in left {
        while cursor < right.len() && boundary.admits(right[cursor], key) {
            last_ok = Some(cursor);
            cursor += 1;
        }
        matches.push(last_ok.filter(|&row| within_tolerance(key, right[row], tolerance)));
    }

    matches
}

/// Grouped variant: a left row only matches right rows carrying an equal group key.
pub fn backward_scan_by<K: AsofKey, G: Hash + Eq>(
    left: &[K],
    right: &[K],
    left_groups: &[G],
    right_groups: &[G],
    boundary: Boundary,
    tolerance: Option<K::Distance>,
) -> Vec<Option<usize>> {
    let mut indexer = GroupIndexer::new(right, right_groups, boundary);
    left.iter()
        .zip(left_groups)
        .map(|(&key, group)| {
            indexer
                .advance(group, key)
                .filter(|&row| within_tolerance(key, right[row], tolerance))
        })
        .collect()
}
