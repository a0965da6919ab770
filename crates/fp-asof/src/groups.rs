//! By-key specialization and the per-group right cursor.

use std::collections::HashMap;
use std::hash::Hash;
use std::mem::size_of;

use bumpalo::{Bump, collections::Vec as BumpVec};
use fp_columnar::Column;
use fp_types::{DType, Scalar, common_dtype};

use crate::keys::{AsofKey, Boundary};
use crate::{AsofError, AsofExecutionOptions, AsofExecutionTrace};

/// Hashable bit pattern of a float group value.
///
/// `-0.0` folds into `0.0` so equal floats land in the same group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FloatBits(u64);

impl FloatBits {
    #[must_use]
    pub fn new(value: f64) -> Self {
        if value == 0.0 {
            Self(0.0_f64.to_bits())
        } else {
            Self(value.to_bits())
        }
    }
}

/// One component of a composite group key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupValue<'a> {
    Missing,
    Bool(bool),
    Int64(i64),
    Float64(FloatBits),
    Utf8(&'a str),
    Timestamp(i64),
    Timedelta(i64),
}

/// Which specialized group representation a by-specification resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Int64,
    Float64,
    Utf8,
    Composite,
}

/// Validated by-columns, paired left/right, with their coerced dtypes.
#[derive(Debug, Clone)]
pub struct GroupSpec<'a> {
    kind: GroupKind,
    left: Vec<&'a Column>,
    right: Vec<&'a Column>,
    dtypes: Vec<DType>,
}

impl<'a> GroupSpec<'a> {
    pub fn resolve(
        left: &[&'a Column],
        right: &[&'a Column],
        left_rows: usize,
        right_rows: usize,
    ) -> Result<Self, AsofError> {
        if left.len() != right.len() {
            return Err(AsofError::config(format!(
                "left_by and right_by must be same length, got {} and {}",
                left.len(),
                right.len()
            )));
        }
        if left.is_empty() {
            return Err(AsofError::config("by requires at least one column per side"));
        }
        for (side, columns, rows) in [("left", left, left_rows), ("right", right, right_rows)] {
            if let Some(column) = columns.iter().find(|column| column.len() != rows) {
                return Err(AsofError::config(format!(
                    "{side} by column has {} rows but the {side} key has {rows}",
                    column.len()
                )));
            }
        }

        let dtypes = left
            .iter()
            .zip(right)
            .map(|(l, r)| {
                common_dtype(l.dtype(), r.dtype()).map_err(|_| {
                    AsofError::config(format!(
                        "incompatible by keys: left dtype {:?} and right dtype {:?}",
                        l.dtype(),
                        r.dtype()
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let kind = match dtypes.as_slice() {
            [DType::Int64 | DType::Null] => GroupKind::Int64,
            [DType::Float64] => GroupKind::Float64,
            [DType::Utf8] => GroupKind::Utf8,
            _ => GroupKind::Composite,
        };

        Ok(Self {
            kind,
            left: left.to_vec(),
            right: right.to_vec(),
            dtypes,
        })
    }

    #[must_use]
    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.dtypes.len()
    }

    pub(crate) fn int64_groups(&self) -> (Vec<Option<i64>>, Vec<Option<i64>>) {
        (
            single_column(&self.left, int64_group),
            single_column(&self.right, int64_group),
        )
    }

    pub(crate) fn float64_groups(&self) -> (Vec<Option<FloatBits>>, Vec<Option<FloatBits>>) {
        (
            single_column(&self.left, float64_group),
            single_column(&self.right, float64_group),
        )
    }

    pub(crate) fn utf8_groups(&self) -> (Vec<Option<&'a str>>, Vec<Option<&'a str>>) {
        (
            single_column(&self.left, utf8_group),
            single_column(&self.right, utf8_group),
        )
    }

    /// Build composite tuple keys for both sides and hand them to `scan`.
    ///
    /// Tuples are interned in a bump arena when the estimate fits the budget,
    /// otherwise each row gets its own heap vector.
    pub(crate) fn with_composite_groups<R>(
        &self,
        options: AsofExecutionOptions,
        scan: impl FnOnce(&[&[GroupValue<'a>]], &[&[GroupValue<'a>]]) -> R,
    ) -> (R, AsofExecutionTrace) {
        let rows = self.left.first().map_or(0, |c| c.len())
            + self.right.first().map_or(0, |c| c.len());
        let estimated_bytes = estimate_composite_bytes(rows, self.arity());
        let use_arena = options.use_arena && estimated_bytes <= options.arena_budget_bytes;
        tracing::trace!(rows, estimated_bytes, use_arena, "materializing composite by keys");

        let out = if use_arena {
            let arena = Bump::new();
            let left = self.composite_rows_in(&self.left, &arena);
            let right = self.composite_rows_in(&self.right, &arena);
            scan(&left, &right)
        } else {
            let left = self.composite_rows(&self.left);
            let right = self.composite_rows(&self.right);
            let left_refs: Vec<&[GroupValue<'a>]> = left.iter().map(Vec::as_slice).collect();
            let right_refs: Vec<&[GroupValue<'a>]> = right.iter().map(Vec::as_slice).collect();
            scan(&left_refs, &right_refs)
        };

        (
            out,
            AsofExecutionTrace {
                used_arena: use_arena,
                composite_rows: rows,
                estimated_bytes,
            },
        )
    }

    fn composite_rows_in<'b>(
        &self,
        columns: &[&'a Column],
        arena: &'b Bump,
    ) -> Vec<&'b [GroupValue<'a>]> {
        let rows = columns.first().map_or(0, |c| c.len());
        (0..rows)
            .map(|row| {
                let mut tuple = BumpVec::with_capacity_in(columns.len(), arena);
                for (column, dtype) in columns.iter().copied().zip(&self.dtypes) {
                    tuple.push(group_value(&column.values()[row], *dtype));
                }
                tuple.into_bump_slice()
            })
            .collect()
    }

    fn composite_rows(&self, columns: &[&'a Column]) -> Vec<Vec<GroupValue<'a>>> {
        let rows = columns.first().map_or(0, |c| c.len());
        (0..rows)
            .map(|row| {
                columns
                    .iter()
                    .copied()
                    .zip(&self.dtypes)
                    .map(|(column, dtype)| group_value(&column.values()[row], *dtype))
                    .collect()
            })
            .collect()
    }
}

fn single_column<'a, G>(
    columns: &[&'a Column],
    convert: fn(&'a Scalar) -> Option<G>,
) -> Vec<Option<G>> {
    columns
        .first()
        .copied()
        .map(|column| column.values().iter().map(convert).collect())
        .unwrap_or_default()
}

fn int64_group(value: &Scalar) -> Option<i64> {
    match value {
        Scalar::Int64(v) => Some(*v),
        Scalar::Bool(v) => Some(i64::from(*v)),
        _ => None,
    }
}

fn float64_group(value: &Scalar) -> Option<FloatBits> {
    match value {
        Scalar::Int64(v) => Some(FloatBits::new(*v as f64)),
        Scalar::Bool(v) => Some(FloatBits::new(if *v { 1.0 } else { 0.0 })),
        Scalar::Float64(v) if !v.is_nan() => Some(FloatBits::new(*v)),
        _ => None,
    }
}

fn utf8_group(value: &Scalar) -> Option<&str> {
    match value {
        Scalar::Utf8(v) => Some(v.as_str()),
        _ => None,
    }
}

/// Convert one by-cell under the pair's coerced dtype.
fn group_value(value: &Scalar, dtype: DType) -> GroupValue<'_> {
    if value.is_missing() {
        return GroupValue::Missing;
    }
    match (dtype, value) {
        (DType::Float64, Scalar::Int64(v)) => GroupValue::Float64(FloatBits::new(*v as f64)),
        (DType::Float64, Scalar::Bool(v)) => {
            GroupValue::Float64(FloatBits::new(if *v { 1.0 } else { 0.0 }))
        }
        (DType::Int64, Scalar::Bool(v)) => GroupValue::Int64(i64::from(*v)),
        (_, Scalar::Bool(v)) => GroupValue::Bool(*v),
        (_, Scalar::Int64(v)) => GroupValue::Int64(*v),
        (_, Scalar::Float64(v)) => GroupValue::Float64(FloatBits::new(*v)),
        (_, Scalar::Utf8(v)) => GroupValue::Utf8(v.as_str()),
        (_, Scalar::Timestamp(v)) => GroupValue::Timestamp(*v),
        (_, Scalar::Timedelta(v)) => GroupValue::Timedelta(*v),
        (_, Scalar::Null(_)) => GroupValue::Missing,
    }
}

fn estimate_composite_bytes(rows: usize, arity: usize) -> usize {
    rows.saturating_mul(
        size_of::<GroupValue<'_>>()
            .saturating_mul(arity)
            .saturating_add(size_of::<&[GroupValue<'_>]>()),
    )
}

/// Shared right cursor plus the latest right row seen for every group.
///
/// The cursor walks the globally sorted right side exactly once; each group
/// remembers where it last advanced, so repeated lookups never rescan.
pub struct GroupIndexer<'r, K, G> {
    right_keys: &'r [K],
    right_groups: &'r [G],
    boundary: Boundary,
    cursor: usize,
    latest: HashMap<&'r G, usize>,
}

impl<'r, K: AsofKey, G: Hash + Eq> GroupIndexer<'r, K, G> {
    #[must_use]
    pub fn new(right_keys: &'r [K], right_groups: &'r [G], boundary: Boundary) -> Self {
        Self {
            right_keys,
            right_groups,
            boundary,
            cursor: 0,
            latest: HashMap::new(),
        }
    }

    /// Latest right row of `group` whose key the boundary admits against `upper_bound`.
    ///
    /// `upper_bound` must not decrease between calls.
    pub fn advance(&mut self, group: &G, upper_bound: K) -> Option<usize> {
        let groups = self.right_groups;
        while self.cursor < self.right_keys.len()
            && self.boundary.admits(self.right_keys[self.cursor], upper_bound)
        {
            self.latest.insert(&groups[self.cursor], self.cursor);
            self.cursor += 1;
        }
        self.latest.get(group).copied()
    }

    #[must_use]
    pub fn groups_seen(&self) -> usize {
        self.latest.len()
    }
}
