//! On-key comparison and distance semantics.
//!
//! Each key domain implements [`AsofKey`]; the merge core is generic over it,
//! so the domain is chosen once per join instead of per comparison.

use fp_columnar::Column;
use fp_types::{DType, Scalar};
use serde::{Deserialize, Serialize};

use crate::{AsofError, JoinSide};

/// A totally ordered join key with a non-negative distance to earlier keys.
pub trait AsofKey: Copy + PartialOrd {
    type Distance: Copy + PartialOrd;

    /// `self - earlier`. Callers guarantee `earlier <= self`.
    fn distance_from(self, earlier: Self) -> Self::Distance;
}

impl AsofKey for i64 {
    type Distance = u64;

    fn distance_from(self, earlier: Self) -> u64 {
        self.abs_diff(earlier)
    }
}

impl AsofKey for f64 {
    type Distance = f64;

    fn distance_from(self, earlier: Self) -> f64 {
        self - earlier
    }
}

/// Nanoseconds since the Unix epoch; distances are nanosecond durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

impl AsofKey for Timestamp {
    type Distance = u64;

    fn distance_from(self, earlier: Self) -> u64 {
        self.0.abs_diff(earlier.0)
    }
}

/// Whether a right key equal to the left key is still a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Inclusive,
    Exclusive,
}

impl Boundary {
    #[must_use]
    pub fn from_allow_exact_matches(allow_exact_matches: bool) -> Self {
        if allow_exact_matches {
            Self::Inclusive
        } else {
            Self::Exclusive
        }
    }

    #[must_use]
    pub fn admits<K: AsofKey>(self, right: K, left: K) -> bool {
        match self {
            Self::Inclusive => right <= left,
            Self::Exclusive => right < left,
        }
    }
}

#[must_use]
pub fn within_tolerance<K: AsofKey>(left: K, right: K, tolerance: Option<K::Distance>) -> bool {
    tolerance.is_none_or(|limit| left.distance_from(right) <= limit)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyDomain {
    Int64,
    Float64,
    Timestamp,
}

impl KeyDomain {
    /// Resolve the shared domain of the two key columns.
    ///
    /// A `Null`-typed side (empty or all-missing) adopts the other side's domain;
    /// when both sides are untyped the join runs in `untyped`.
    pub fn resolve(left: DType, right: DType, untyped: Self) -> Result<Self, AsofError> {
        let domain = match (Self::of(left), Self::of(right)) {
            (Some(Some(a)), Some(Some(b))) if a == b => a,
            (Some(Some(Self::Int64 | Self::Float64)), Some(Some(Self::Int64 | Self::Float64))) => {
                Self::Float64
            }
            (Some(Some(a)), Some(None)) | (Some(None), Some(Some(a))) => a,
            (Some(None), Some(None)) => untyped,
            _ => {
                return Err(AsofError::config(format!(
                    "incompatible merge keys: left dtype {left:?} and right dtype {right:?} \
                     must both be int64/float64 or both be timestamps"
                )));
            }
        };
        Ok(domain)
    }

    /// The domain a tolerance of this type belongs to, for joins with no typed key.
    #[must_use]
    pub fn for_tolerance(tolerance: Option<&Scalar>) -> Self {
        match tolerance {
            Some(Scalar::Timedelta(_)) => Self::Timestamp,
            Some(Scalar::Float64(_)) => Self::Float64,
            _ => Self::Int64,
        }
    }

    /// `None` for unsupported dtypes, `Some(None)` for the untyped null dtype.
    fn of(dtype: DType) -> Option<Option<Self>> {
        match dtype {
            DType::Null => Some(None),
            DType::Int64 => Some(Some(Self::Int64)),
            DType::Float64 => Some(Some(Self::Float64)),
            DType::Timestamp => Some(Some(Self::Timestamp)),
            DType::Bool | DType::Utf8 | DType::Timedelta => None,
        }
    }
}

/// Key sequences converted into one domain together with the typed tolerance.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedKeys {
    Int64 {
        left: Vec<i64>,
        right: Vec<i64>,
        tolerance: Option<u64>,
    },
    Float64 {
        left: Vec<f64>,
        right: Vec<f64>,
        tolerance: Option<f64>,
    },
    Timestamp {
        left: Vec<Timestamp>,
        right: Vec<Timestamp>,
        tolerance: Option<u64>,
    },
}

impl ResolvedKeys {
    #[must_use]
    pub fn domain(&self) -> KeyDomain {
        match self {
            Self::Int64 { .. } => KeyDomain::Int64,
            Self::Float64 { .. } => KeyDomain::Float64,
            Self::Timestamp { .. } => KeyDomain::Timestamp,
        }
    }
}

pub(crate) fn int64_key(value: &Scalar) -> Option<i64> {
    match value {
        Scalar::Int64(v) => Some(*v),
        _ => None,
    }
}

pub(crate) fn float64_key(value: &Scalar) -> Option<f64> {
    match value {
        Scalar::Int64(v) => Some(*v as f64),
        Scalar::Float64(v) if !v.is_nan() => Some(*v),
        _ => None,
    }
}

pub(crate) fn timestamp_key(value: &Scalar) -> Option<Timestamp> {
    match value {
        Scalar::Timestamp(v) => Some(Timestamp(*v)),
        _ => None,
    }
}

/// Convert a key column; any missing key is a data error on that side.
pub(crate) fn extract_keys<K>(
    column: &Column,
    side: JoinSide,
    convert: impl Fn(&Scalar) -> Option<K>,
) -> Result<Vec<K>, AsofError> {
    column
        .values()
        .iter()
        .enumerate()
        .map(|(row, value)| {
            convert(value).ok_or_else(|| AsofError::UnsortedInput {
                side,
                detail: format!("missing key at row {row}"),
            })
        })
        .collect()
}

/// Linear non-decreasing check; ties are allowed.
pub(crate) fn check_sorted<K: AsofKey>(keys: &[K], side: JoinSide) -> Result<(), AsofError> {
    match keys.windows(2).position(|pair| pair[1] < pair[0]) {
        Some(pos) => Err(AsofError::UnsortedInput {
            side,
            detail: format!("key at row {} is smaller than key at row {pos}", pos + 1),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use fp_columnar::Column;
    use fp_types::{DType, Scalar};

    use super::{
        AsofKey, Boundary, KeyDomain, Timestamp, check_sorted, extract_keys, float64_key,
        within_tolerance,
    };
    use crate::{AsofError, JoinSide};

    #[test]
    fn integer_distance_does_not_overflow() {
        assert_eq!(i64::MAX.distance_from(i64::MIN), u64::MAX);
        assert_eq!(5_i64.distance_from(3), 2);
    }

    #[test]
    fn timestamp_distance_is_nanoseconds() {
        assert_eq!(Timestamp(30_000_000).distance_from(Timestamp(0)), 30_000_000);
    }

    #[test]
    fn boundary_controls_exact_matches() {
        assert!(Boundary::Inclusive.admits(3_i64, 3));
        assert!(!Boundary::Exclusive.admits(3_i64, 3));
        assert!(Boundary::Exclusive.admits(2.5_f64, 3.0));
        assert_eq!(Boundary::from_allow_exact_matches(false), Boundary::Exclusive);
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        assert!(within_tolerance(10_i64, 7, Some(3)));
        assert!(!within_tolerance(10_i64, 6, Some(3)));
        assert!(within_tolerance(10_i64, -1_000, None));
    }

    #[test]
    fn domain_resolution_coerces_mixed_numeric_to_float() {
        assert_eq!(
            KeyDomain::resolve(DType::Int64, DType::Float64, KeyDomain::Int64).expect("numeric"),
            KeyDomain::Float64
        );
        assert_eq!(
            KeyDomain::resolve(DType::Int64, DType::Int64, KeyDomain::Int64).expect("int"),
            KeyDomain::Int64
        );
        assert_eq!(
            KeyDomain::resolve(DType::Null, DType::Timestamp, KeyDomain::Int64)
                .expect("null adopts"),
            KeyDomain::Timestamp
        );
    }

    #[test]
    fn untyped_keys_take_the_domain_of_the_tolerance() {
        let untyped = KeyDomain::for_tolerance(Some(&Scalar::Timedelta(5)));
        assert_eq!(untyped, KeyDomain::Timestamp);
        assert_eq!(
            KeyDomain::resolve(DType::Null, DType::Null, untyped).expect("untyped"),
            KeyDomain::Timestamp
        );
        assert_eq!(
            KeyDomain::for_tolerance(Some(&Scalar::Float64(0.5))),
            KeyDomain::Float64
        );
        assert_eq!(KeyDomain::for_tolerance(None), KeyDomain::Int64);
        assert_eq!(
            KeyDomain::resolve(DType::Float64, DType::Null, untyped).expect("typed side wins"),
            KeyDomain::Float64
        );
    }

    #[test]
    fn domain_resolution_rejects_timestamp_numeric_mix() {
        let err = KeyDomain::resolve(DType::Timestamp, DType::Int64, KeyDomain::Int64)
            .expect_err("mix");
        assert!(matches!(err, AsofError::Config(_)));
        assert!(err.to_string().contains("incompatible merge keys"));
        assert!(KeyDomain::resolve(DType::Utf8, DType::Utf8, KeyDomain::Int64).is_err());
    }

    #[test]
    fn missing_keys_are_reported_with_their_row() {
        let column = Column::from_values(vec![Scalar::Float64(1.0), Scalar::Float64(f64::NAN)])
            .expect("column");
        let err = extract_keys(&column, JoinSide::Right, float64_key).expect_err("nan key");
        assert_eq!(
            err.to_string(),
            "unsorted input: right keys must be sorted ascending (missing key at row 1)"
        );
    }

    #[test]
    fn sortedness_allows_ties_and_names_first_decrease() {
        check_sorted(&[1_i64, 1, 2, 2], JoinSide::Left).expect("ties are fine");
        let err = check_sorted(&[1_i64, 3, 2], JoinSide::Left).expect_err("decrease");
        assert_eq!(
            err.to_string(),
            "unsorted input: left keys must be sorted ascending \
             (key at row 2 is smaller than key at row 1)"
        );
    }
}
