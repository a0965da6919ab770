use std::collections::{BTreeMap, BTreeSet};

use fp_columnar::Column;
use fp_frame::DataFrame;
use fp_index::Index;

use crate::validate::{FramePlan, KeySource};
use crate::{AsofError, AsofOptions};

/// Materialize the joined frame: every left row once, right columns gathered by match.
pub(crate) fn assemble_frame(
    left: &DataFrame,
    right: &DataFrame,
    plan: &FramePlan<'_>,
    options: &AsofOptions,
    matches: &[Option<usize>],
) -> Result<DataFrame, AsofError> {
    let index = if options.left_index {
        left.index().clone()
    } else {
        Index::range(left.len())
    };

    let mut dropped = BTreeSet::new();
    if let (KeySource::Column(l), KeySource::Column(r)) = (plan.left_key, plan.right_key)
        && l == r
    {
        dropped.insert(r);
    }
    for (l, r) in plan.left_by.iter().zip(&plan.right_by) {
        if l == r {
            dropped.insert(*r);
        }
    }

    let right_names: Vec<&str> = right
        .column_names()
        .into_iter()
        .map(String::as_str)
        .filter(|name| !dropped.contains(name))
        .collect();
    let left_names: Vec<&str> = left.column_names().into_iter().map(String::as_str).collect();
    let overlap: BTreeSet<&str> = left_names
        .iter()
        .copied()
        .filter(|name| right_names.contains(name))
        .collect();

    let (left_suffix, right_suffix) = &options.suffixes;
    if !overlap.is_empty() && left_suffix.is_empty() && right_suffix.is_empty() {
        return Err(AsofError::config(format!(
            "columns overlap but no suffix specified: {overlap:?}"
        )));
    }
    let output_name = |name: &str, suffix: &str| {
        if overlap.contains(name) {
            format!("{name}{suffix}")
        } else {
            name.to_owned()
        }
    };

    let mut columns = BTreeMap::new();
    let mut order = Vec::with_capacity(left_names.len() + right_names.len());
    let mut push = |name: String, column: Column| {
        if columns.insert(name.clone(), column).is_some() {
            return Err(AsofError::config(format!(
                "suffixes produce duplicate column name '{name}'"
            )));
        }
        order.push(name);
        Ok(())
    };

    for &name in &left_names {
        push(output_name(name, left_suffix.as_str()), left.require_column(name)?.clone())?;
    }
    for &name in &right_names {
        let gathered = right.require_column(name)?.reindex_by_positions(matches)?;
        push(output_name(name, right_suffix.as_str()), gathered)?;
    }

    Ok(DataFrame::new_with_column_order(index, columns, order)?)
}
