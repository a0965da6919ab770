#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Date, PrimitiveDateTime, format_description};

pub const NANOS_PER_MICROSECOND: i64 = 1_000;
pub const NANOS_PER_MILLISECOND: i64 = 1_000_000;
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;
pub const NANOS_PER_MINUTE: i64 = 60 * NANOS_PER_SECOND;
pub const NANOS_PER_HOUR: i64 = 60 * NANOS_PER_MINUTE;
pub const NANOS_PER_DAY: i64 = 24 * NANOS_PER_HOUR;

const DATETIME_FORMAT: &str =
    "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]";
const DATE_FORMAT: &str = "[year]-[month]-[day]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    Null,
    Bool,
    Int64,
    Float64,
    Utf8,
    Timestamp,
    Timedelta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullKind {
    Null,
    NaN,
    NaT,
}

/// A single cell value.
///
/// `Timestamp` holds nanoseconds since the Unix epoch (UTC) and `Timedelta`
/// holds a signed nanosecond duration, matching the datetime64[ns] /
/// timedelta64[ns] model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Scalar {
    Null(NullKind),
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Utf8(String),
    Timestamp(i64),
    Timedelta(i64),
}

impl Scalar {
    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            Self::Null(_) => DType::Null,
            Self::Bool(_) => DType::Bool,
            Self::Int64(_) => DType::Int64,
            Self::Float64(_) => DType::Float64,
            Self::Utf8(_) => DType::Utf8,
            Self::Timestamp(_) => DType::Timestamp,
            Self::Timedelta(_) => DType::Timedelta,
        }
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Null(_) => true,
            Self::Float64(v) => v.is_nan(),
            _ => false,
        }
    }

    #[must_use]
    pub fn missing_for_dtype(dtype: DType) -> Self {
        match dtype {
            DType::Float64 => Self::Null(NullKind::NaN),
            DType::Timestamp | DType::Timedelta => Self::Null(NullKind::NaT),
            DType::Null | DType::Bool | DType::Int64 | DType::Utf8 => Self::Null(NullKind::Null),
        }
    }

    #[must_use]
    pub fn semantic_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Float64(a), Self::Float64(b)) => (a.is_nan() && b.is_nan()) || (a == b),
            (Self::Null(NullKind::NaN), Self::Float64(v))
            | (Self::Float64(v), Self::Null(NullKind::NaN)) => v.is_nan(),
            (Self::Null(_), Self::Null(_)) => true,
            _ => self == other,
        }
    }

    /// Parse `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS[.fff]` or the `T`-separated
    /// form into a UTC timestamp scalar.
    pub fn parse_timestamp(text: &str) -> Result<Self, TypeError> {
        parse_timestamp_nanos(text).map(Self::Timestamp)
    }

    #[must_use]
    pub fn timedelta_millis(millis: i64) -> Self {
        Self::Timedelta(millis.saturating_mul(NANOS_PER_MILLISECOND))
    }

    #[must_use]
    pub fn timedelta_seconds(seconds: i64) -> Self {
        Self::Timedelta(seconds.saturating_mul(NANOS_PER_SECOND))
    }

    #[must_use]
    pub fn timedelta_days(days: i64) -> Self {
        Self::Timedelta(days.saturating_mul(NANOS_PER_DAY))
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeError {
    #[error("dtype coercion from {left:?} to {right:?} has no compatible common type")]
    IncompatibleDtypes { left: DType, right: DType },
    #[error("cannot cast scalar of dtype {from:?} to {to:?}")]
    InvalidCast { from: DType, to: DType },
    #[error("cannot cast float {value} to int64 without loss")]
    LossyFloatToInt { value: f64 },
    #[error("cannot parse {text:?} as a timestamp: {reason}")]
    InvalidTimestamp { text: String, reason: String },
}

pub fn common_dtype(left: DType, right: DType) -> Result<DType, TypeError> {
    use DType::{Bool, Float64, Int64, Null};

    let out = match (left, right) {
        (a, b) if a == b => a,
        (Null, other) | (other, Null) => other,
        (Bool, Int64) | (Int64, Bool) => Int64,
        (Bool, Float64) | (Float64, Bool) | (Int64, Float64) | (Float64, Int64) => Float64,
        _ => return Err(TypeError::IncompatibleDtypes { left, right }),
    };

    Ok(out)
}

pub fn infer_dtype(values: &[Scalar]) -> Result<DType, TypeError> {
    let mut current = DType::Null;
    for value in values {
        current = common_dtype(current, value.dtype())?;
    }
    Ok(current)
}

/// Cast a scalar to a target dtype, taking ownership so identity casts are free.
pub fn cast_scalar_owned(value: Scalar, target: DType) -> Result<Scalar, TypeError> {
    let from = value.dtype();
    if matches!(value, Scalar::Null(_)) {
        return Ok(Scalar::missing_for_dtype(target));
    }
    if from == target {
        return Ok(value);
    }

    match (target, &value) {
        (DType::Null, _) => Ok(Scalar::Null(NullKind::Null)),
        (DType::Int64, Scalar::Bool(v)) => Ok(Scalar::Int64(i64::from(*v))),
        (DType::Int64, Scalar::Float64(v)) => {
            if !v.is_finite()
                || *v != v.trunc()
                || *v < i64::MIN as f64
                || *v > i64::MAX as f64
            {
                return Err(TypeError::LossyFloatToInt { value: *v });
            }
            Ok(Scalar::Int64(*v as i64))
        }
        (DType::Float64, Scalar::Bool(v)) => Ok(Scalar::Float64(if *v { 1.0 } else { 0.0 })),
        (DType::Float64, Scalar::Int64(v)) => Ok(Scalar::Float64(*v as f64)),
        _ => Err(TypeError::InvalidCast { from, to: target }),
    }
}

pub fn cast_scalar(value: &Scalar, target: DType) -> Result<Scalar, TypeError> {
    cast_scalar_owned(value.clone(), target)
}

fn parse_timestamp_nanos(text: &str) -> Result<i64, TypeError> {
    let invalid = |reason: String| TypeError::InvalidTimestamp {
        text: text.to_owned(),
        reason,
    };

    let normalized = text.trim().replacen('T', " ", 1);
    let datetime = if normalized.contains(' ') {
        let items = format_description::parse_owned::<2>(DATETIME_FORMAT)
            .map_err(|err| invalid(err.to_string()))?;
        PrimitiveDateTime::parse(&normalized, &items)
            .map_err(|err| invalid(err.to_string()))?
    } else {
        let items = format_description::parse_owned::<2>(DATE_FORMAT)
            .map_err(|err| invalid(err.to_string()))?;
        Date::parse(&normalized, &items)
            .map_err(|err| invalid(err.to_string()))?
            .midnight()
    };

    i64::try_from(datetime.assume_utc().unix_timestamp_nanos())
        .map_err(|_| invalid("outside the datetime64[ns] range".to_owned()))
}
