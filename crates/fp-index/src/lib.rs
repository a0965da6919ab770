#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A float row label with a total order, so it can live in `Eq`/`Ord`/`Hash` positions.
///
/// Equality and hashing follow the bit pattern; ordering follows `f64::total_cmp`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FloatLabel(f64);

impl FloatLabel {
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl PartialEq for FloatLabel {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for FloatLabel {}

impl Hash for FloatLabel {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for FloatLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for FloatLabel {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum IndexLabel {
    Int64(i64),
    Float64(FloatLabel),
    Utf8(String),
    /// Nanoseconds since the Unix epoch.
    Timestamp(i64),
    /// One label per level of a multi-level index.
    Tuple(Vec<IndexLabel>),
}

impl From<i64> for IndexLabel {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for IndexLabel {
    fn from(value: f64) -> Self {
        Self::Float64(FloatLabel(value))
    }
}

impl From<&str> for IndexLabel {
    fn from(value: &str) -> Self {
        Self::Utf8(value.to_owned())
    }
}

impl From<String> for IndexLabel {
    fn from(value: String) -> Self {
        Self::Utf8(value)
    }
}

impl fmt::Display for IndexLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int64(v) | Self::Timestamp(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{}", v.get()),
            Self::Utf8(v) => write!(f, "{v}"),
            Self::Tuple(parts) => {
                write!(f, "(")?;
                for (pos, part) in parts.iter().enumerate() {
                    if pos > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{part}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("multi-level index needs at least one level")]
    NoLevels,
    #[error("index level {level} has length {len}, expected {expected}")]
    LevelLengthMismatch {
        level: usize,
        len: usize,
        expected: usize,
    },
}

/// Row labels of a frame.
///
/// A single-level index stores scalar labels; a multi-level index stores one
/// `IndexLabel::Tuple` per row and records its level count in `nlevels`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    labels: Vec<IndexLabel>,
    nlevels: usize,
    name: Option<String>,
}

impl Index {
    #[must_use]
    pub fn new(labels: Vec<IndexLabel>) -> Self {
        Self {
            labels,
            nlevels: 1,
            name: None,
        }
    }

    /// `RangeIndex`-style labels `0..len`.
    #[must_use]
    pub fn range(len: usize) -> Self {
        Self::new((0..len as i64).map(IndexLabel::Int64).collect())
    }

    /// Zip per-level label vectors into a multi-level index.
    pub fn from_levels(levels: Vec<Vec<IndexLabel>>) -> Result<Self, IndexError> {
        let expected = levels.first().ok_or(IndexError::NoLevels)?.len();
        for (level, labels) in levels.iter().enumerate() {
            if labels.len() != expected {
                return Err(IndexError::LevelLengthMismatch {
                    level,
                    len: labels.len(),
                    expected,
                });
            }
        }

        let nlevels = levels.len();
        if nlevels == 1 {
            return Ok(Self::new(levels.into_iter().flatten().collect()));
        }

        let mut rows = vec![Vec::with_capacity(nlevels); expected];
        for labels in levels {
            for (row, label) in labels.into_iter().enumerate() {
                rows[row].push(label);
            }
        }

        Ok(Self {
            labels: rows.into_iter().map(IndexLabel::Tuple).collect(),
            nlevels,
            name: None,
        })
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[must_use]
    pub fn labels(&self) -> &[IndexLabel] {
        &self.labels
    }

    #[must_use]
    pub fn nlevels(&self) -> usize {
        self.nlevels
    }

    #[must_use]
    pub fn is_multi_level(&self) -> bool {
        self.nlevels > 1
    }
}

#[cfg(test)]
mod tests {
    use super::{FloatLabel, Index, IndexError, IndexLabel};

    #[test]
    fn range_index_counts_from_zero() {
        let index = Index::range(3);
        assert_eq!(index.labels(), &[IndexLabel::Int64(0), IndexLabel::Int64(1), IndexLabel::Int64(2)]);
        assert!(!index.is_multi_level());
    }

    #[test]
    fn from_levels_zips_rows_into_tuples() {
        let index = Index::from_levels(vec![
            vec![IndexLabel::Timestamp(1), IndexLabel::Timestamp(2)],
            vec!["a".into(), "b".into()],
        ])
        .expect("multi index");

        assert_eq!(index.nlevels(), 2);
        assert!(index.is_multi_level());
        assert_eq!(
            index.labels()[1],
            IndexLabel::Tuple(vec![IndexLabel::Timestamp(2), "b".into()])
        );
        assert_eq!(index.labels()[1].to_string(), "(2, b)");
    }

    #[test]
    fn from_levels_rejects_ragged_levels() {
        let err = Index::from_levels(vec![
            vec![IndexLabel::Int64(1), IndexLabel::Int64(2)],
            vec![IndexLabel::Int64(3)],
        ])
        .expect_err("ragged");
        assert_eq!(
            err,
            IndexError::LevelLengthMismatch {
                level: 1,
                len: 1,
                expected: 2
            }
        );
        assert_eq!(
            Index::from_levels(Vec::new()).expect_err("empty"),
            IndexError::NoLevels
        );
    }

    #[test]
    fn float_labels_order_totally_and_compare_by_bits() {
        let mut labels = vec![
            IndexLabel::from(2.5),
            IndexLabel::from(-1.0),
            IndexLabel::from(0.0),
        ];
        labels.sort();
        assert_eq!(
            labels,
            vec![
                IndexLabel::from(-1.0),
                IndexLabel::from(0.0),
                IndexLabel::from(2.5)
            ]
        );
        assert_eq!(FloatLabel::new(f64::NAN), FloatLabel::new(f64::NAN));
        assert_ne!(FloatLabel::new(-0.0), FloatLabel::new(0.0));
        assert_eq!(IndexLabel::from(1.5).to_string(), "1.5");
    }

    #[test]
    fn name_round_trips() {
        let index = Index::range(1).with_name("time");
        assert_eq!(index.name(), Some("time"));
    }
}
