//! Descriptors - predicates a source checks its value against
//!
//! A descriptor never alters a value. It either accepts it or reports what it
//! expected, and the owning source turns that report into a validation error.

use crate::config::DataConfig;
use crate::types::{is_temporal, Value, DEFAULT_TIME_COLUMN};
use std::fmt;
use std::sync::Arc;

/// Why a value was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectationFailure {
    pub expected: String,
    pub observed: String,
}

impl ExpectationFailure {
    pub fn new(expected: impl Into<String>, value: &Value) -> Self {
        Self {
            expected: expected.into(),
            observed: value.describe(),
        }
    }
}

/// Stateless validation predicate over a value
pub trait Descriptor: fmt::Debug + Send + Sync {
    /// Human-readable statement of what is required
    fn expectation(&self) -> String;

    /// Accept or reject `value`
    fn check(&self, value: &Value) -> Result<(), ExpectationFailure>;
}

/// Shared handle so copies of a stage share immutable descriptors
pub type DescriptorRef = Arc<dyn Descriptor>;

/// Value must be a table
#[derive(Debug, Clone, Copy, Default)]
pub struct IsTabular;

impl Descriptor for IsTabular {
    fn expectation(&self) -> String {
        "a table".to_string()
    }

    fn check(&self, value: &Value) -> Result<(), ExpectationFailure> {
        match value {
            Value::Frame(_) => Ok(()),
            other => Err(ExpectationFailure::new(self.expectation(), other)),
        }
    }
}

/// Value must be a table indexed by a temporal column
#[derive(Debug, Clone)]
pub struct IsTimeIndexed {
    column: String,
}

impl IsTimeIndexed {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }

    pub fn from_config(config: &DataConfig) -> Self {
        Self::new(config.time_column.clone())
    }

    pub fn column(&self) -> &str {
        &self.column
    }
}

impl Default for IsTimeIndexed {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_COLUMN)
    }
}

impl Descriptor for IsTimeIndexed {
    fn expectation(&self) -> String {
        format!("a time series indexed by temporal column '{}'", self.column)
    }

    fn check(&self, value: &Value) -> Result<(), ExpectationFailure> {
        let indexed = value
            .as_frame()
            .and_then(|df| df.column(&self.column).ok())
            .map(is_temporal)
            .unwrap_or(false);

        if indexed {
            Ok(())
        } else {
            Err(ExpectationFailure::new(self.expectation(), value))
        }
    }
}

/// Table must carry every listed column
#[derive(Debug, Clone)]
pub struct HasColumns {
    columns: Vec<String>,
}

impl HasColumns {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Descriptor for HasColumns {
    fn expectation(&self) -> String {
        format!("columns [{}]", self.columns.join(", "))
    }

    fn check(&self, value: &Value) -> Result<(), ExpectationFailure> {
        let df = match value {
            Value::Frame(df) => df,
            other => return Err(ExpectationFailure::new(self.expectation(), other)),
        };

        let present = df.get_column_names();
        let missing: Vec<&str> = self
            .columns
            .iter()
            .map(|c| c.as_str())
            .filter(|c| !present.contains(c))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ExpectationFailure::new(
                format!("{} (missing [{}])", self.expectation(), missing.join(", ")),
                value,
            ))
        }
    }
}

/// Fitted model must expose every listed attribute
#[derive(Debug, Clone)]
pub struct HasAttributes {
    attributes: Vec<String>,
}

impl HasAttributes {
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }
}

impl Descriptor for HasAttributes {
    fn expectation(&self) -> String {
        format!("a model with attributes [{}]", self.attributes.join(", "))
    }

    fn check(&self, value: &Value) -> Result<(), ExpectationFailure> {
        let model = match value {
            Value::Model(model) => model,
            other => return Err(ExpectationFailure::new(self.expectation(), other)),
        };

        let missing: Vec<&str> = self
            .attributes
            .iter()
            .map(|a| a.as_str())
            .filter(|a| !model.has_attribute(a))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ExpectationFailure::new(
                format!("{} (missing [{}])", self.expectation(), missing.join(", ")),
                value,
            ))
        }
    }
}

/// Ad-hoc predicate with a fixed expectation text
#[derive(Clone)]
pub struct Predicate {
    expectation: String,
    check: Arc<dyn Fn(&Value) -> bool + Send + Sync>,
}

impl Predicate {
    pub fn new<F>(expectation: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self {
            expectation: expectation.into(),
            check: Arc::new(check),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("expectation", &self.expectation)
            .finish()
    }
}

impl Descriptor for Predicate {
    fn expectation(&self) -> String {
        self.expectation.clone()
    }

    fn check(&self, value: &Value) -> Result<(), ExpectationFailure> {
        if (self.check)(value) {
            Ok(())
        } else {
            Err(ExpectationFailure::new(self.expectation(), value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FittedModel;
    use polars::prelude::*;

    fn table() -> Value {
        df!("a" => &[1i64, 2], "c" => &[3i64, 4]).unwrap().into()
    }

    #[test]
    fn test_is_tabular() {
        assert!(IsTabular.check(&table()).is_ok());
        let err = IsTabular
            .check(&FittedModel::new("linear").into())
            .unwrap_err();
        assert_eq!(err.expected, "a table");
        assert_eq!(err.observed, "Model(linear: )");
    }

    #[test]
    fn test_has_columns_names_missing() {
        let err = HasColumns::new(["a", "b"]).check(&table()).unwrap_err();
        assert!(err.expected.contains("missing [b]"));
        assert!(!err.expected.contains("missing [a"));
        assert!(HasColumns::new(["a", "c"]).check(&table()).is_ok());
    }

    #[test]
    fn test_has_attributes() {
        let model: Value = FittedModel::new("linear")
            .with_attribute("coef_", vec![1.0])
            .into();
        assert!(HasAttributes::new(["coef_"]).check(&model).is_ok());
        let err = HasAttributes::new(["coef_", "intercept_"])
            .check(&model)
            .unwrap_err();
        assert!(err.expected.contains("missing [intercept_]"));
    }

    #[test]
    fn test_is_time_indexed() {
        let dates = Series::new("date", &[0i32, 1]).cast(&DataType::Date).unwrap();
        let ts: Value = DataFrame::new(vec![dates, Series::new("close", &[1.0, 2.0])])
            .unwrap()
            .into();

        assert!(IsTimeIndexed::default().check(&ts).is_ok());
        assert!(IsTimeIndexed::new("timestamp").check(&ts).is_err());
        assert!(IsTimeIndexed::default().check(&table()).is_err());
    }

    #[test]
    fn test_verdict_is_stable() {
        let desc = HasColumns::new(["a"]);
        let value = table();
        assert_eq!(desc.check(&value), desc.check(&value));
    }

    #[test]
    fn test_predicate() {
        let non_empty = Predicate::new("a non-empty table", |v| {
            v.as_frame().map(|df| df.height() > 0).unwrap_or(false)
        });
        assert!(non_empty.check(&table()).is_ok());
        assert!(non_empty.check(&Value::Empty).is_err());
    }
}
