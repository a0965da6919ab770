#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use fp_columnar::{Column, ColumnError};
use fp_index::{Index, IndexError, IndexLabel};
use fp_types::Scalar;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("index length ({index_len}) does not match column length ({column_len})")]
    LengthMismatch { index_len: usize, column_len: usize },
    #[error("compatibility gate rejected operation: {0}")]
    CompatibilityRejected(String),
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFrame {
    index: Index,
    columns: BTreeMap<String, Column>,
    column_order: Vec<String>,
}

/// Convert a cell into a row label; bools, nulls and temporal deltas have no label form.
fn scalar_to_label(value: &Scalar, column: &str) -> Result<IndexLabel, FrameError> {
    match value {
        Scalar::Int64(v) => Ok(IndexLabel::Int64(*v)),
        Scalar::Float64(v) => Ok(IndexLabel::from(*v)),
        Scalar::Utf8(v) => Ok(IndexLabel::Utf8(v.clone())),
        Scalar::Timestamp(v) => Ok(IndexLabel::Timestamp(*v)),
        other => Err(FrameError::CompatibilityRejected(format!(
            "column '{column}' value {other:?} cannot be used as an index label"
        ))),
    }
}

fn label_to_scalar(label: &IndexLabel) -> Result<Scalar, FrameError> {
    match label {
        IndexLabel::Int64(v) => Ok(Scalar::Int64(*v)),
        IndexLabel::Float64(v) => Ok(Scalar::Float64(v.get())),
        IndexLabel::Utf8(v) => Ok(Scalar::Utf8(v.clone())),
        IndexLabel::Timestamp(v) => Ok(Scalar::Timestamp(*v)),
        IndexLabel::Tuple(_) => Err(FrameError::CompatibilityRejected(
            "multi-level index labels cannot be flattened into one column".to_owned(),
        )),
    }
}

impl DataFrame {
    fn validate_column_lengths(
        index: &Index,
        columns: &BTreeMap<String, Column>,
    ) -> Result<(), FrameError> {
        for column in columns.values() {
            if column.len() != index.len() {
                return Err(FrameError::LengthMismatch {
                    index_len: index.len(),
                    column_len: column.len(),
                });
            }
        }
        Ok(())
    }

    fn normalize_column_order(
        columns: &BTreeMap<String, Column>,
        column_order: Vec<String>,
    ) -> Result<Vec<String>, FrameError> {
        let mut normalized = Vec::with_capacity(columns.len());
        let mut seen = BTreeSet::new();
        for name in column_order {
            if !columns.contains_key(&name) {
                return Err(FrameError::CompatibilityRejected(format!(
                    "column '{name}' not found in data"
                )));
            }
            if !seen.insert(name.clone()) {
                return Err(FrameError::CompatibilityRejected(format!(
                    "duplicate column selector: '{name}'"
                )));
            }
            normalized.push(name);
        }

        for name in columns.keys() {
            if seen.insert(name.clone()) {
                normalized.push(name.clone());
            }
        }

        Ok(normalized)
    }

    pub fn new_with_column_order(
        index: Index,
        columns: BTreeMap<String, Column>,
        column_order: Vec<String>,
    ) -> Result<Self, FrameError> {
        Self::validate_column_lengths(&index, &columns)?;
        let column_order = Self::normalize_column_order(&columns, column_order)?;
        Ok(Self {
            index,
            columns,
            column_order,
        })
    }

    /// Construct a DataFrame from named column vectors with a `0..n` index.
    ///
    /// Matches `pd.DataFrame({"a": [1, 2], "b": [3, 4]})`; columns keep input order.
    pub fn from_dict(data: Vec<(&str, Vec<Scalar>)>) -> Result<Self, FrameError> {
        let len = data.first().map_or(0, |(_, values)| values.len());
        Self::from_dict_with_index(data, Index::range(len))
    }

    pub fn from_dict_with_index(
        data: Vec<(&str, Vec<Scalar>)>,
        index: Index,
    ) -> Result<Self, FrameError> {
        let mut columns = BTreeMap::new();
        let mut input_order = Vec::with_capacity(data.len());
        for (name, values) in data {
            if values.len() != index.len() {
                return Err(FrameError::LengthMismatch {
                    index_len: index.len(),
                    column_len: values.len(),
                });
            }
            if columns
                .insert(name.to_owned(), Column::from_values(values)?)
                .is_some()
            {
                return Err(FrameError::CompatibilityRejected(format!(
                    "duplicate column name: '{name}'"
                )));
            }
            input_order.push(name.to_owned());
        }

        Self::new_with_column_order(index, columns, input_order)
    }

    /// Move one column into the index, like `df.set_index("time")`.
    pub fn set_index(&self, name: &str) -> Result<Self, FrameError> {
        self.set_index_multi(&[name])
    }

    /// Move one or more columns into the index; two or more build a multi-level index.
    pub fn set_index_multi(&self, names: &[&str]) -> Result<Self, FrameError> {
        let mut levels = Vec::with_capacity(names.len());
        for &name in names {
            let column = self.require_column(name)?;
            let labels = column
                .values()
                .iter()
                .map(|value| scalar_to_label(value, name))
                .collect::<Result<Vec<_>, _>>()?;
            levels.push(labels);
        }

        let mut index = Index::from_levels(levels)?;
        if let [name] = names {
            index = index.with_name(*name);
        }

        let mut columns = self.columns.clone();
        for name in names {
            columns.remove(*name);
        }
        let order = self
            .column_order
            .iter()
            .filter(|name| columns.contains_key(*name))
            .cloned()
            .collect();
        Self::new_with_column_order(index, columns, order)
    }

    /// Move a single-level index back into a leading column and restore a `0..n` index.
    ///
    /// The column is named after the index, or `index` when it has no name.
    pub fn reset_index(&self) -> Result<Self, FrameError> {
        let name = self.index.name().unwrap_or("index").to_owned();
        if self.columns.contains_key(&name) {
            return Err(FrameError::CompatibilityRejected(format!(
                "reset_index cannot insert '{name}' because the column already exists"
            )));
        }

        let values = self
            .index
            .labels()
            .iter()
            .map(label_to_scalar)
            .collect::<Result<Vec<_>, _>>()?;
        let mut columns = self.columns.clone();
        columns.insert(name.clone(), Column::from_values(values)?);

        let mut order = Vec::with_capacity(self.column_order.len() + 1);
        order.push(name);
        order.extend(self.column_order.iter().cloned());
        Self::new_with_column_order(Index::range(self.len()), columns, order)
    }

    /// Return a new DataFrame with only the specified columns, in order.
    pub fn select_columns(&self, names: &[&str]) -> Result<Self, FrameError> {
        let mut columns = BTreeMap::new();
        for &name in names {
            columns.insert(name.to_owned(), self.require_column(name)?.clone());
        }
        let column_order = names.iter().map(|name| (*name).to_owned()).collect();
        Self::new_with_column_order(self.index.clone(), columns, column_order)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Column names in observable DataFrame order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&String> {
        self.column_order.iter().collect()
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn require_column(&self, name: &str) -> Result<&Column, FrameError> {
        self.columns
            .get(name)
            .ok_or_else(|| FrameError::CompatibilityRejected(format!("column '{name}' not found")))
    }
}
