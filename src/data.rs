//! External data providers feeding the leaves of a graph

use crate::error::Result;
use crate::options::RunOptions;
use crate::types::{is_temporal, Value};
use polars::prelude::*;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Leaf input a source can be bound to.
///
/// Providers may perform I/O; they are called once per pull.
pub trait DataProvider: fmt::Debug + Send + Sync {
    fn provide(&self, opts: &RunOptions) -> Result<Value>;
}

/// In-memory table handed out on every pull
#[derive(Debug, Clone)]
pub struct FrameProvider {
    frame: DataFrame,
}

impl FrameProvider {
    pub fn new(frame: DataFrame) -> Self {
        Self { frame }
    }
}

impl DataProvider for FrameProvider {
    fn provide(&self, _opts: &RunOptions) -> Result<Value> {
        Ok(Value::Frame(self.frame.clone()))
    }
}

/// CSV file read through polars
#[derive(Debug, Clone)]
pub struct CsvProvider {
    path: PathBuf,
    time_column: Option<String>,
}

impl CsvProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            time_column: None,
        }
    }

    /// Parse `column` as dates so the table counts as a time series
    pub fn with_time_column(mut self, column: impl Into<String>) -> Self {
        self.time_column = Some(column.into());
        self
    }
}

impl DataProvider for CsvProvider {
    fn provide(&self, _opts: &RunOptions) -> Result<Value> {
        log::debug!("Reading {}", self.path.display());

        let mut df = CsvReader::from_path(&self.path)?
            .has_header(true)
            .with_try_parse_dates(self.time_column.is_some())
            .finish()?;

        // intraday columns already parse as datetimes; only text is cast
        if let Some(column) = &self.time_column {
            let series = df.column(column)?;
            if !is_temporal(series) {
                let parsed = series.cast(&DataType::Date)?;
                df.with_column(parsed)?;
            }
        }

        Ok(Value::Frame(df))
    }
}

type ProvideFn = dyn Fn(&RunOptions) -> Result<Value> + Send + Sync;

/// Provider backed by a closure
#[derive(Clone)]
pub struct FnProvider {
    name: String,
    func: Arc<ProvideFn>,
}

impl FnProvider {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&RunOptions) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

impl fmt::Debug for FnProvider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FnProvider").field("name", &self.name).finish()
    }
}

impl DataProvider for FnProvider {
    fn provide(&self, opts: &RunOptions) -> Result<Value> {
        (self.func)(opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_frame_provider() {
        let df = df!("a" => &[1i64, 2]).unwrap();
        let value = FrameProvider::new(df.clone())
            .provide(&RunOptions::new())
            .unwrap();
        assert_eq!(value, Value::Frame(df));
    }

    #[test]
    fn test_csv_provider_parses_dates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "date,close").unwrap();
        writeln!(file, "2020-01-02,10.5").unwrap();
        writeln!(file, "2020-01-03,11.0").unwrap();
        file.flush().unwrap();

        let value = CsvProvider::new(file.path())
            .with_time_column("date")
            .provide(&RunOptions::new())
            .unwrap();

        let df = value.as_frame().unwrap();
        assert_eq!(df.height(), 2);
        assert!(is_temporal(df.column("date").unwrap()));
    }

    #[test]
    fn test_csv_provider_keeps_intraday_times() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "date,close").unwrap();
        writeln!(file, "2021-03-01 09:30:00,10.5").unwrap();
        writeln!(file, "2021-03-01 15:30:00,11.0").unwrap();
        file.flush().unwrap();

        let value = CsvProvider::new(file.path())
            .with_time_column("date")
            .provide(&RunOptions::new())
            .unwrap();

        let date = value.as_frame().unwrap().column("date").unwrap().clone();
        assert!(matches!(date.dtype(), DataType::Datetime(_, _)));
        assert_eq!(date.n_unique().unwrap(), 2);
    }

    #[test]
    fn test_csv_provider_missing_file() {
        let result = CsvProvider::new("/nonexistent/prices.csv").provide(&RunOptions::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_fn_provider_sees_options() {
        let provider = FnProvider::new("echo", |opts| {
            Ok(if opts.get("empty").is_some() {
                Value::Empty
            } else {
                Value::Frame(df!("a" => &[1i64]).unwrap())
            })
        });

        let opts = RunOptions::new().with("empty", true);
        assert!(provider.provide(&opts).unwrap().is_empty());
        assert!(!provider.provide(&RunOptions::new()).unwrap().is_empty());
    }
}
