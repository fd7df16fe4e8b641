//! Core types flowing between stages

use crate::error::{PipeError, Result};
use crate::output::FigureSnapshot;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Column holding the time index when nothing else is configured
pub const DEFAULT_TIME_COLUMN: &str = "date";

/// Returns column expected by value-at-risk graphs
pub const RETURNS: &str = "returns";

/// Maximum exceedance column expected by value-at-risk graphs
pub const MAX_EXCEEDANCE: &str = "max_exceedance";

/// A value produced by an output and consumed by a source.
#[derive(Debug, Clone)]
pub enum Value {
    /// Tabular data
    Frame(DataFrame),
    /// Fitted model exposing named attributes
    Model(FittedModel),
    /// Rendered figure
    Figure(FigureSnapshot),
    /// Explicit "no data" marker
    Empty,
}

impl Value {
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn as_frame(&self) -> Option<&DataFrame> {
        match self {
            Value::Frame(df) => Some(df),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&FittedModel> {
        match self {
            Value::Model(model) => Some(model),
            _ => None,
        }
    }

    pub fn as_figure(&self) -> Option<&FigureSnapshot> {
        match self {
            Value::Figure(fig) => Some(fig),
            _ => None,
        }
    }

    /// Unwrap a table, attributing the failure to `stage`.
    pub fn into_frame(self, stage: &str) -> Result<DataFrame> {
        match self {
            Value::Frame(df) => Ok(df),
            other => Err(PipeError::computation(
                stage,
                format!("expected a table, got {}", other.describe()),
            )),
        }
    }

    /// Unwrap a fitted model, attributing the failure to `stage`.
    pub fn into_model(self, stage: &str) -> Result<FittedModel> {
        match self {
            Value::Model(model) => Ok(model),
            other => Err(PipeError::computation(
                stage,
                format!("expected a fitted model, got {}", other.describe()),
            )),
        }
    }

    /// Short description of the value's observed shape
    pub fn describe(&self) -> String {
        match self {
            Value::Frame(df) => format!(
                "DataFrame[{}x{}: {}]",
                df.height(),
                df.width(),
                df.get_column_names().join(", ")
            ),
            Value::Model(model) => format!(
                "Model({}: {})",
                model.kind(),
                model.attribute_names().collect::<Vec<_>>().join(", ")
            ),
            Value::Figure(fig) => format!("Figure[{} calls]", fig.calls().len()),
            Value::Empty => "Empty".to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Frame(a), Value::Frame(b)) => {
                a.get_column_names() == b.get_column_names() && a.equals_missing(b)
            }
            (Value::Model(a), Value::Model(b)) => a == b,
            (Value::Figure(a), Value::Figure(b)) => a == b,
            (Value::Empty, Value::Empty) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

impl From<DataFrame> for Value {
    fn from(df: DataFrame) -> Self {
        Value::Frame(df)
    }
}

impl From<FittedModel> for Value {
    fn from(model: FittedModel) -> Self {
        Value::Model(model)
    }
}

/// Fitted statistical model seen through its named numeric attributes.
///
/// Model plugins expose what they fitted (`coef_`, `intercept_`, ...) here;
/// stages only ever check presence and length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    kind: String,
    attributes: BTreeMap<String, Vec<f64>>,
}

impl FittedModel {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.attributes.insert(name.into(), values);
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn attribute(&self, name: &str) -> Option<&[f64]> {
        self.attributes.get(name).map(|v| v.as_slice())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(|k| k.as_str())
    }
}

/// Single cell value used by value-based row selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    pub fn matches_f64(&self, value: f64) -> bool {
        match self {
            Scalar::Int(i) => *i as f64 == value,
            Scalar::Float(f) => *f == value,
            _ => false,
        }
    }

    pub fn matches_str(&self, value: &str) -> bool {
        matches!(self, Scalar::Str(s) if s == value)
    }

    pub fn matches_bool(&self, value: bool) -> bool {
        matches!(self, Scalar::Bool(b) if *b == value)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(v as i64)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

/// Whether a series holds dates or datetimes
pub fn is_temporal(series: &Series) -> bool {
    matches!(series.dtype(), DataType::Date | DataType::Datetime(_, _))
}

/// Temporal column as epoch milliseconds
pub fn temporal_millis(series: &Series) -> PolarsResult<Vec<Option<i64>>> {
    let millis = series
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
        .cast(&DataType::Int64)?;
    Ok(millis.i64()?.into_iter().collect())
}

/// Epoch milliseconds back into a datetime series
pub fn millis_series(name: &str, millis: Vec<Option<i64>>) -> PolarsResult<Series> {
    Series::new(name, millis).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
}
