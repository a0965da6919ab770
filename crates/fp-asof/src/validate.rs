//! Precondition checks that run before any scan.
//!
//! Frame-level checks (`plan_frames`) cover the keyword combinations; engine
//! checks (`resolve_keys`) cover key domains, tolerance and sortedness.

use std::borrow::Cow;

use fp_columnar::Column;
use fp_frame::DataFrame;
use fp_index::IndexLabel;
use fp_types::Scalar;

use crate::keys::{
    AsofKey, KeyDomain, ResolvedKeys, check_sorted, extract_keys, float64_key, int64_key,
    timestamp_key,
};
use crate::{AsofError, AsofOptions, JoinSide};

/// Where one side's on-key comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeySource<'a> {
    Column(&'a str),
    Index,
}

/// Validated key and by selection for both frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FramePlan<'a> {
    pub left_key: KeySource<'a>,
    pub right_key: KeySource<'a>,
    pub left_by: Vec<&'a str>,
    pub right_by: Vec<&'a str>,
}

pub(crate) fn plan_frames<'a>(
    left: &DataFrame,
    right: &DataFrame,
    options: &'a AsofOptions,
) -> Result<FramePlan<'a>, AsofError> {
    let (left_by, right_by) = by_columns(options)?;

    if options.left_index && left.index().is_multi_level() {
        return Err(AsofError::config("left can only have one index"));
    }
    if options.right_index && right.index().is_multi_level() {
        return Err(AsofError::config("right can only have one index"));
    }

    let left_key = key_source(options, JoinSide::Left)?;
    let right_key = key_source(options, JoinSide::Right)?;

    for (side, frame, key, by) in [
        (JoinSide::Left, left, left_key, &left_by),
        (JoinSide::Right, right, right_key, &right_by),
    ] {
        if let KeySource::Column(name) = key {
            require(frame, name, side, "key")?;
        }
        for name in by {
            require(frame, name, side, "by")?;
        }
    }

    Ok(FramePlan {
        left_key,
        right_key,
        left_by,
        right_by,
    })
}

fn names(list: &[String]) -> Vec<&str> {
    list.iter().map(String::as_str).collect()
}

fn by_columns(options: &AsofOptions) -> Result<(Vec<&str>, Vec<&str>), AsofError> {
    if !options.by.is_empty() {
        if !options.left_by.is_empty() || !options.right_by.is_empty() {
            return Err(AsofError::config("can only pass by OR left_by and right_by"));
        }
        return Ok((names(&options.by), names(&options.by)));
    }

    match (options.left_by.is_empty(), options.right_by.is_empty()) {
        (true, true) => Ok((Vec::new(), Vec::new())),
        (true, false) => Err(AsofError::config("missing left_by")),
        (false, true) => Err(AsofError::config("missing right_by")),
        (false, false) if options.left_by.len() != options.right_by.len() => {
            Err(AsofError::config(format!(
                "left_by and right_by must be same length, got {} and {}",
                options.left_by.len(),
                options.right_by.len()
            )))
        }
        (false, false) => Ok((names(&options.left_by), names(&options.right_by))),
    }
}

fn key_source(options: &AsofOptions, side: JoinSide) -> Result<KeySource<'_>, AsofError> {
    let (side_on, side_index, on_name, index_name) = match side {
        JoinSide::Left => (&options.left_on, options.left_index, "left_on", "left_index"),
        JoinSide::Right => (&options.right_on, options.right_index, "right_on", "right_index"),
    };

    if !options.on.is_empty() {
        if !options.left_on.is_empty() || !options.right_on.is_empty() {
            return Err(AsofError::config(
                "can only pass argument \"on\" OR \"left_on\" and \"right_on\", not a combination of both",
            ));
        }
        if options.left_index || options.right_index {
            return Err(AsofError::config(
                "can only pass argument \"on\" OR \"left_index\" and \"right_index\", not a combination of both",
            ));
        }
        return single_key(&options.on, side);
    }

    match (side_on.is_empty(), side_index) {
        (false, true) => Err(AsofError::config(format!(
            "can only pass argument \"{on_name}\" OR \"{index_name}\", not both"
        ))),
        (false, false) => single_key(side_on, side),
        (true, true) => Ok(KeySource::Index),
        (true, false) => Err(AsofError::config(format!(
            "no join key for {side}: pass on, {on_name} or {index_name}"
        ))),
    }
}

fn single_key(names: &[String], side: JoinSide) -> Result<KeySource<'_>, AsofError> {
    match names {
        [name] => Ok(KeySource::Column(name)),
        _ => Err(AsofError::config(format!(
            "can only asof on a key for {side}, got {} keys",
            names.len()
        ))),
    }
}

fn require(frame: &DataFrame, name: &str, side: JoinSide, role: &str) -> Result<(), AsofError> {
    if frame.column(name).is_none() {
        return Err(AsofError::config(format!(
            "{side} {role} column '{name}' not found"
        )));
    }
    Ok(())
}

/// Materialize one side's on-key; index labels are converted into a column.
pub(crate) fn key_column<'f>(
    frame: &'f DataFrame,
    source: KeySource<'_>,
) -> Result<Cow<'f, Column>, AsofError> {
    match source {
        KeySource::Column(name) => Ok(Cow::Borrowed(frame.require_column(name)?)),
        KeySource::Index => {
            let values = frame
                .index()
                .labels()
                .iter()
                .map(|label| match label {
                    IndexLabel::Int64(v) => Ok(Scalar::Int64(*v)),
                    IndexLabel::Float64(v) => Ok(Scalar::Float64(v.get())),
                    IndexLabel::Timestamp(v) => Ok(Scalar::Timestamp(*v)),
                    IndexLabel::Utf8(v) => Ok(Scalar::Utf8(v.clone())),
                    IndexLabel::Tuple(_) => Err(AsofError::config(
                        "multi-level index labels cannot be used as a join key",
                    )),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Cow::Owned(Column::from_values(values)?))
        }
    }
}

/// Resolve both key columns into one domain, type the tolerance, and verify order.
pub(crate) fn resolve_keys(
    left: &Column,
    right: &Column,
    tolerance: Option<&Scalar>,
) -> Result<ResolvedKeys, AsofError> {
    let untyped = KeyDomain::for_tolerance(tolerance);
    let domain = KeyDomain::resolve(left.dtype(), right.dtype(), untyped)?;
    let keys = match domain {
        KeyDomain::Int64 => {
            let tolerance = tolerance.map(int64_tolerance).transpose()?;
            let left = sorted_keys(left, JoinSide::Left, int64_key)?;
            let right = sorted_keys(right, JoinSide::Right, int64_key)?;
            ResolvedKeys::Int64 {
                left,
                right,
                tolerance,
            }
        }
        KeyDomain::Float64 => {
            let tolerance = tolerance.map(float64_tolerance).transpose()?;
            let left = sorted_keys(left, JoinSide::Left, float64_key)?;
            let right = sorted_keys(right, JoinSide::Right, float64_key)?;
            ResolvedKeys::Float64 {
                left,
                right,
                tolerance,
            }
        }
        KeyDomain::Timestamp => {
            let tolerance = tolerance.map(timestamp_tolerance).transpose()?;
            let left = sorted_keys(left, JoinSide::Left, timestamp_key)?;
            let right = sorted_keys(right, JoinSide::Right, timestamp_key)?;
            ResolvedKeys::Timestamp {
                left,
                right,
                tolerance,
            }
        }
    };
    Ok(keys)
}

fn sorted_keys<K: AsofKey>(
    column: &Column,
    side: JoinSide,
    convert: fn(&Scalar) -> Option<K>,
) -> Result<Vec<K>, AsofError> {
    let keys = extract_keys(column, side, convert)?;
    check_sorted(&keys, side)?;
    Ok(keys)
}

fn incompatible_tolerance(tolerance: &Scalar, domain: &str) -> AsofError {
    AsofError::config(format!(
        "incompatible tolerance {tolerance:?}, must be compatible with {domain} keys"
    ))
}

fn negative_tolerance() -> AsofError {
    AsofError::config("tolerance must be positive")
}

fn int64_tolerance(tolerance: &Scalar) -> Result<u64, AsofError> {
    match tolerance {
        Scalar::Int64(v) => u64::try_from(*v).map_err(|_| negative_tolerance()),
        other => Err(incompatible_tolerance(other, "int64")),
    }
}

fn float64_tolerance(tolerance: &Scalar) -> Result<f64, AsofError> {
    let value = match tolerance {
        Scalar::Int64(v) => *v as f64,
        Scalar::Float64(v) if v.is_finite() => *v,
        other => return Err(incompatible_tolerance(other, "float64")),
    };
    if value < 0.0 {
        return Err(negative_tolerance());
    }
    Ok(value)
}

fn timestamp_tolerance(tolerance: &Scalar) -> Result<u64, AsofError> {
    match tolerance {
        Scalar::Timedelta(v) => u64::try_from(*v).map_err(|_| negative_tolerance()),
        other => Err(incompatible_tolerance(other, "timestamp")),
    }
}
