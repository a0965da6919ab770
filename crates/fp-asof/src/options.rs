use fp_types::Scalar;
use serde::{Deserialize, Serialize};

use crate::AsofError;

/// Caller-facing `merge_asof` parameters.
///
/// Key and by lists mirror the pandas keywords; validation of their
/// combinations happens when the join runs, not when the options are built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAsofOptions")]
pub struct AsofOptions {
    pub on: Vec<String>,
    pub left_on: Vec<String>,
    pub right_on: Vec<String>,
    pub left_index: bool,
    pub right_index: bool,
    pub by: Vec<String>,
    pub left_by: Vec<String>,
    pub right_by: Vec<String>,
    pub tolerance: Option<Scalar>,
    pub allow_exact_matches: bool,
    pub suffixes: (String, String),
}

impl Default for AsofOptions {
    fn default() -> Self {
        Self {
            on: Vec::new(),
            left_on: Vec::new(),
            right_on: Vec::new(),
            left_index: false,
            right_index: false,
            by: Vec::new(),
            left_by: Vec::new(),
            right_by: Vec::new(),
            tolerance: None,
            allow_exact_matches: true,
            suffixes: ("_x".to_owned(), "_y".to_owned()),
        }
    }
}

fn owned<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Into::into).collect()
}

impl AsofOptions {
    /// Join both sides on the same-named key column.
    #[must_use]
    pub fn on(column: impl Into<String>) -> Self {
        Self {
            on: vec![column.into()],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn left_on_right_on(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left_on: vec![left.into()],
            right_on: vec![right.into()],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn left_index(mut self) -> Self {
        self.left_index = true;
        self
    }

    #[must_use]
    pub fn right_index(mut self) -> Self {
        self.right_index = true;
        self
    }

    #[must_use]
    pub fn by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.by = owned(columns);
        self
    }

    #[must_use]
    pub fn left_by_right_by<L, R, S, T>(mut self, left: L, right: R) -> Self
    where
        L: IntoIterator<Item = S>,
        R: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        self.left_by = owned(left);
        self.right_by = owned(right);
        self
    }

    #[must_use]
    pub fn tolerance(mut self, tolerance: Scalar) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    #[must_use]
    pub fn allow_exact_matches(mut self, allow: bool) -> Self {
        self.allow_exact_matches = allow;
        self
    }

    #[must_use]
    pub fn suffixes(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.suffixes = (left.into(), right.into());
        self
    }

    /// Parse a JSON options document.
    ///
    /// `on`/`by`-style keys accept a string or a list of strings;
    /// `allow_exact_matches` must be a JSON boolean when present.
    pub fn from_json(text: &str) -> Result<Self, AsofError> {
        let raw: RawAsofOptions = serde_json::from_str(text)
            .map_err(|err| AsofError::config(format!("invalid options document: {err}")))?;
        Self::try_from(raw)
    }

    #[must_use]
    pub fn params(&self) -> AsofParams {
        AsofParams {
            tolerance: self.tolerance.clone(),
            allow_exact_matches: self.allow_exact_matches,
        }
    }
}

/// Matching parameters consumed by the engine once keys are resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct AsofParams {
    pub tolerance: Option<Scalar>,
    pub allow_exact_matches: bool,
}

impl Default for AsofParams {
    fn default() -> Self {
        Self {
            tolerance: None,
            allow_exact_matches: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KeyList {
    One(String),
    Many(Vec<String>),
}

impl KeyList {
    fn into_vec(list: Option<Self>) -> Vec<String> {
        match list {
            Some(Self::One(name)) => vec![name],
            Some(Self::Many(names)) => names,
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAsofOptions {
    on: Option<KeyList>,
    left_on: Option<KeyList>,
    right_on: Option<KeyList>,
    #[serde(default)]
    left_index: bool,
    #[serde(default)]
    right_index: bool,
    by: Option<KeyList>,
    left_by: Option<KeyList>,
    right_by: Option<KeyList>,
    tolerance: Option<Scalar>,
    allow_exact_matches: Option<serde_json::Value>,
    suffixes: Option<(String, String)>,
}

impl TryFrom<RawAsofOptions> for AsofOptions {
    type Error = AsofError;

    fn try_from(raw: RawAsofOptions) -> Result<Self, Self::Error> {
        let allow_exact_matches = match raw.allow_exact_matches {
            None => true,
            Some(serde_json::Value::Bool(allow)) => allow,
            Some(other) => {
                return Err(AsofError::config(format!(
                    "allow_exact_matches must be boolean, passed {other}"
                )));
            }
        };
        let defaults = Self::default();

        Ok(Self {
            on: KeyList::into_vec(raw.on),
            left_on: KeyList::into_vec(raw.left_on),
            right_on: KeyList::into_vec(raw.right_on),
            left_index: raw.left_index,
            right_index: raw.right_index,
            by: KeyList::into_vec(raw.by),
            left_by: KeyList::into_vec(raw.left_by),
            right_by: KeyList::into_vec(raw.right_by),
            tolerance: raw.tolerance,
            allow_exact_matches,
            suffixes: raw.suffixes.unwrap_or(defaults.suffixes),
        })
    }
}
