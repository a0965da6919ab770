#![forbid(unsafe_code)]

mod assemble;
pub mod groups;
pub mod keys;
mod options;
pub mod scan;
mod validate;

use std::fmt;

use fp_columnar::{Column, ColumnError};
use fp_frame::{DataFrame, FrameError};
use thiserror::Error;
use tracing::debug;

use crate::groups::{GroupKind, GroupSpec};
use crate::keys::{AsofKey, Boundary, ResolvedKeys};
use crate::scan::{backward_scan, backward_scan_by};

pub use crate::keys::{KeyDomain, Timestamp};
pub use crate::options::{AsofOptions, AsofParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSide {
    Left,
    Right,
}

impl fmt::Display for JoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AsofError {
    #[error("merge configuration error: {0}")]
    Config(String),
    #[error("unsorted input: {side} keys must be sorted ascending ({detail})")]
    UnsortedInput { side: JoinSide, detail: String },
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Column(#[from] ColumnError),
}

impl AsofError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub const DEFAULT_ARENA_BUDGET_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsofExecutionOptions {
    pub use_arena: bool,
    pub arena_budget_bytes: usize,
}

impl Default for AsofExecutionOptions {
    fn default() -> Self {
        Self {
            use_arena: true,
            arena_budget_bytes: DEFAULT_ARENA_BUDGET_BYTES,
        }
    }
}

/// How composite by-keys were materialized for one join.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AsofExecutionTrace {
    pub used_arena: bool,
    pub composite_rows: usize,
    pub estimated_bytes: usize,
}

/// Paired by-columns, one entry per grouping level.
#[derive(Debug, Clone, Copy)]
pub struct ByColumns<'a> {
    pub left: &'a [&'a Column],
    pub right: &'a [&'a Column],
}

/// Match each left key to the latest admissible right row.
///
/// Returns one slot per left row, in left order; `None` means no match.
pub fn asof_indexer(
    left_key: &Column,
    right_key: &Column,
    by: Option<ByColumns<'_>>,
    params: &AsofParams,
) -> Result<Vec<Option<usize>>, AsofError> {
    asof_indexer_with_options(
        left_key,
        right_key,
        by,
        params,
        AsofExecutionOptions::default(),
    )
}

pub fn asof_indexer_with_options(
    left_key: &Column,
    right_key: &Column,
    by: Option<ByColumns<'_>>,
    params: &AsofParams,
    options: AsofExecutionOptions,
) -> Result<Vec<Option<usize>>, AsofError> {
    let (matches, _) = asof_indexer_with_trace(left_key, right_key, by, params, options)?;
    Ok(matches)
}

fn asof_indexer_with_trace(
    left_key: &Column,
    right_key: &Column,
    by: Option<ByColumns<'_>>,
    params: &AsofParams,
    options: AsofExecutionOptions,
) -> Result<(Vec<Option<usize>>, AsofExecutionTrace), AsofError> {
    let groups = by
        .map(|by| GroupSpec::resolve(by.left, by.right, left_key.len(), right_key.len()))
        .transpose()?;
    let keys = validate::resolve_keys(left_key, right_key, params.tolerance.as_ref())?;
    let boundary = Boundary::from_allow_exact_matches(params.allow_exact_matches);

    debug!(
        left_rows = left_key.len(),
        right_rows = right_key.len(),
        domain = ?keys.domain(),
        grouping = ?groups.as_ref().map(GroupSpec::kind),
        tolerance = params.tolerance.is_some(),
        allow_exact_matches = params.allow_exact_matches,
        "as-of join started"
    );

    let groups = groups.as_ref();
    let (matches, trace) = match &keys {
        ResolvedKeys::Int64 {
            left,
            right,
            tolerance,
        } => scan_keys(left, right, *tolerance, boundary, groups, options),
        ResolvedKeys::Float64 {
            left,
            right,
            tolerance,
        } => scan_keys(left, right, *tolerance, boundary, groups, options),
        ResolvedKeys::Timestamp {
            left,
            right,
            tolerance,
        } => scan_keys(left, right, *tolerance, boundary, groups, options),
    };

    debug!(
        matched = matches.iter().flatten().count(),
        used_arena = trace.used_arena,
        "as-of join finished"
    );
    Ok((matches, trace))
}

fn scan_keys<K: AsofKey>(
    left: &[K],
    right: &[K],
    tolerance: Option<K::Distance>,
    boundary: Boundary,
    groups: Option<&GroupSpec<'_>>,
    options: AsofExecutionOptions,
) -> (Vec<Option<usize>>, AsofExecutionTrace) {
    let Some(groups) = groups else {
        return (
            backward_scan(left, right, boundary, tolerance),
            AsofExecutionTrace::default(),
        );
    };

    match groups.kind() {
        GroupKind::Int64 => {
            let (left_groups, right_groups) = groups.int64_groups();
            let matches =
                backward_scan_by(left, right, &left_groups, &right_groups, boundary, tolerance);
            (matches, AsofExecutionTrace::default())
        }
        GroupKind::Float64 => {
            let (left_groups, right_groups) = groups.float64_groups();
            let matches =
                backward_scan_by(left, right, &left_groups, &right_groups, boundary, tolerance);
            (matches, AsofExecutionTrace::default())
        }
        GroupKind::Utf8 => {
            let (left_groups, right_groups) = groups.utf8_groups();
            let matches =
                backward_scan_by(left, right, &left_groups, &right_groups, boundary, tolerance);
            (matches, AsofExecutionTrace::default())
        }
        GroupKind::Composite => groups.with_composite_groups(options, |left_groups, right_groups| {
            backward_scan_by(left, right, left_groups, right_groups, boundary, tolerance)
        }),
    }
}

/// Frame-level as-of join, pandas `merge_asof` style.
///
/// The result has one row per left row, left columns first, then the right
/// columns gathered by match with unmatched rows filled with missing values.
pub fn merge_asof(
    left: &DataFrame,
    right: &DataFrame,
    options: &AsofOptions,
) -> Result<DataFrame, AsofError> {
    merge_asof_with_options(left, right, options, AsofExecutionOptions::default())
}

pub fn merge_asof_with_options(
    left: &DataFrame,
    right: &DataFrame,
    options: &AsofOptions,
    execution: AsofExecutionOptions,
) -> Result<DataFrame, AsofError> {
    let (frame, _) = merge_asof_with_trace(left, right, options, execution)?;
    Ok(frame)
}

fn merge_asof_with_trace(
    left: &DataFrame,
    right: &DataFrame,
    options: &AsofOptions,
    execution: AsofExecutionOptions,
) -> Result<(DataFrame, AsofExecutionTrace), AsofError> {
    let plan = validate::plan_frames(left, right, options)?;
    let left_key = validate::key_column(left, plan.left_key)?;
    let right_key = validate::key_column(right, plan.right_key)?;

    let left_by = plan
        .left_by
        .iter()
        .map(|name| left.require_column(name))
        .collect::<Result<Vec<_>, _>>()?;
    let right_by = plan
        .right_by
        .iter()
        .map(|name| right.require_column(name))
        .collect::<Result<Vec<_>, _>>()?;
    let by = (!left_by.is_empty()).then_some(ByColumns {
        left: &left_by,
        right: &right_by,
    });

    let (matches, trace) =
        asof_indexer_with_trace(&left_key, &right_key, by, &options.params(), execution)?;
    let frame = assemble::assemble_frame(left, right, &plan, options, &matches)?;
    Ok((frame, trace))
}
