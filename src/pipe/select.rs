//! Pipes selecting a subset of a table's rows or columns
//!
//! Column names are single-level; each pipe resolves its own columns.

use crate::descriptor::{HasColumns, IsTabular, IsTimeIndexed};
use crate::error::{PipeError, Result};
use crate::options::RunOptions;
use crate::pipe::Pipe;
use crate::source::{Source, DATA_IN};
use crate::types::{temporal_millis, Scalar, Value, DEFAULT_TIME_COLUMN};
use chrono::{Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use hashbrown::HashMap;
use polars::prelude::*;
use std::fmt;
use std::sync::Arc;

fn collect_names<I, S>(columns: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    columns.into_iter().map(Into::into).collect()
}

fn select_columns(df: &DataFrame, columns: &[String]) -> PolarsResult<DataFrame> {
    df.select(columns.iter().map(|c| c.as_str()))
}

/// Columns to inspect: the configured ones, or every column
fn checked_columns(df: &DataFrame, columns: &Option<Vec<String>>) -> Vec<String> {
    match columns {
        Some(cols) => cols.clone(),
        None => df
            .get_column_names()
            .into_iter()
            .map(|c| c.to_string())
            .collect(),
    }
}

/// Per row, whether the cell holds one of `values`.
///
/// Nulls never match, and neither does any cell of a column no scalar can
/// hold (dates, categoricals, lists).
fn membership(series: &Series, values: &[Scalar]) -> PolarsResult<Vec<bool>> {
    let mask = match series.dtype() {
        DataType::String => series
            .str()?
            .into_iter()
            .map(|v| v.map_or(false, |v| values.iter().any(|s| s.matches_str(v))))
            .collect(),
        DataType::Boolean => series
            .bool()?
            .into_iter()
            .map(|v| v.map_or(false, |v| values.iter().any(|s| s.matches_bool(v))))
            .collect(),
        dt if dt.is_numeric() => {
            let floats = series.cast(&DataType::Float64)?;
            floats
                .f64()?
                .into_iter()
                .map(|v| v.map_or(false, |v| values.iter().any(|s| s.matches_f64(v))))
                .collect()
        }
        _ => vec![false; series.len()],
    };
    Ok(mask)
}

fn filter_rows(df: &DataFrame, keep: &[bool]) -> PolarsResult<DataFrame> {
    df.filter(&BooleanChunked::from_slice("keep", keep))
}

/// Keep only the given columns, in the given order
#[derive(Debug, Clone)]
pub struct ColSelect {
    source: Source,
    columns: Vec<String>,
}

impl ColSelect {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = collect_names(columns);
        Self {
            source: Source::new(DATA_IN)
                .with_desc(IsTabular)
                .with_desc(HasColumns::new(columns.clone())),
            columns,
        }
    }
}

impl Pipe for ColSelect {
    crate::pipe_plumbing!("ColSelect");

    fn transform(&self, data: Value, _opts: &RunOptions) -> Result<Value> {
        let df = data.into_frame(self.name())?;
        Ok(Value::Frame(select_columns(&df, &self.columns)?))
    }
}

/// Drop columns by name
#[derive(Debug, Clone)]
pub struct ColDrop {
    source: Source,
    columns: Vec<String>,
}

impl ColDrop {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = collect_names(columns);
        Self {
            source: Source::new(DATA_IN)
                .with_desc(IsTabular)
                .with_desc(HasColumns::new(columns.clone())),
            columns,
        }
    }
}

impl Pipe for ColDrop {
    crate::pipe_plumbing!("ColDrop");

    fn transform(&self, data: Value, _opts: &RunOptions) -> Result<Value> {
        let df = data.into_frame(self.name())?;
        let remaining: Vec<String> = df
            .get_column_names()
            .into_iter()
            .filter(|c| !self.columns.iter().any(|d| d == c))
            .map(|c| c.to_string())
            .collect();
        Ok(Value::Frame(select_columns(&df, &remaining)?))
    }
}

/// Rename columns; names not present in the table are ignored
#[derive(Debug, Clone)]
pub struct ColRename {
    source: Source,
    renames: Vec<(String, String)>,
}

impl ColRename {
    pub fn new<I, K, V>(renames: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            source: Source::new(DATA_IN).with_desc(IsTabular),
            renames: renames
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Pipe for ColRename {
    crate::pipe_plumbing!("ColRename");

    fn transform(&self, data: Value, _opts: &RunOptions) -> Result<Value> {
        let mut df = data.into_frame(self.name())?;
        let names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|c| {
                self.renames
                    .iter()
                    .rev()
                    .find(|(old, _)| old == c)
                    .map(|(_, new)| new.clone())
                    .unwrap_or_else(|| c.to_string())
            })
            .collect();
        df.set_column_names(&names)?;
        Ok(Value::Frame(df))
    }
}

/// Move columns to fixed positions; the rest keep their relative order
#[derive(Debug, Clone)]
pub struct ColReorder {
    source: Source,
    positions: Vec<(String, usize)>,
}

impl ColReorder {
    pub fn new<I, S>(positions: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let positions: Vec<(String, usize)> =
            positions.into_iter().map(|(c, p)| (c.into(), p)).collect();
        Self {
            source: Source::new(DATA_IN)
                .with_desc(IsTabular)
                .with_desc(HasColumns::new(positions.iter().map(|(c, _)| c.clone()))),
            positions,
        }
    }
}

impl Pipe for ColReorder {
    crate::pipe_plumbing!("ColReorder");

    fn transform(&self, data: Value, _opts: &RunOptions) -> Result<Value> {
        let df = data.into_frame(self.name())?;
        let mut order: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|c| c.to_string())
            .collect();

        for (column, position) in &self.positions {
            if let Some(i) = order.iter().position(|c| c == column) {
                let moved = order.remove(i);
                order.insert((*position).min(order.len()), moved);
            }
        }

        Ok(Value::Frame(select_columns(&df, &order)?))
    }
}

fn parse_bound(text: &str, end_of_day: bool) -> Result<NaiveDateTime> {
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Ok(dt);
        }
    }

    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|e| PipeError::ConfigError(format!("invalid date '{}': {}", text, e)))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| PipeError::ConfigError(format!("invalid date '{}'", text)))?;

    if end_of_day {
        Ok(midnight + Duration::days(1) - Duration::milliseconds(1))
    } else {
        Ok(midnight)
    }
}

fn to_millis(dt: &NaiveDateTime) -> i64 {
    Utc.from_utc_datetime(dt).timestamp_millis()
}

/// Keep rows whose time index falls inside an inclusive range.
///
/// A date-only end bound covers that whole day.
#[derive(Debug, Clone)]
pub struct DateSelect {
    source: Source,
    column: String,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
}

impl DateSelect {
    pub fn new(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let mut select = Self::between(None, None);
        if let Some(start) = start {
            select.set_start(start)?;
        }
        if let Some(end) = end {
            select.set_end(end)?;
        }
        Ok(select)
    }

    pub fn between(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        Self {
            source: Source::new(DATA_IN).with_desc(IsTimeIndexed::default()),
            column: DEFAULT_TIME_COLUMN.to_string(),
            start,
            end,
        }
    }

    /// Index on `column` instead of the default time column
    pub fn on_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self.source = Source::new(DATA_IN).with_desc(IsTimeIndexed::new(self.column.clone()));
        self
    }

    pub fn set_start(&mut self, start: &str) -> Result<&mut Self> {
        self.start = Some(parse_bound(start, false)?);
        Ok(self)
    }

    pub fn set_end(&mut self, end: &str) -> Result<&mut Self> {
        self.end = Some(parse_bound(end, true)?);
        Ok(self)
    }

    pub fn start(&self) -> Option<NaiveDateTime> {
        self.start
    }

    pub fn end(&self) -> Option<NaiveDateTime> {
        self.end
    }
}

impl Pipe for DateSelect {
    crate::pipe_plumbing!("DateSelect");

    fn transform(&self, data: Value, _opts: &RunOptions) -> Result<Value> {
        let df = data.into_frame(self.name())?;
        let start = self.start.as_ref().map(to_millis);
        let end = self.end.as_ref().map(to_millis);

        let keep: Vec<bool> = temporal_millis(df.column(&self.column)?)?
            .into_iter()
            .map(|t| match t {
                Some(t) => start.map_or(true, |s| t >= s) && end.map_or(true, |e| t <= e),
                None => false,
            })
            .collect();

        Ok(Value::Frame(filter_rows(&df, &keep)?))
    }
}

/// Drop rows holding nulls, optionally only looking at some columns
#[derive(Debug, Clone)]
pub struct DropNa {
    source: Source,
    subset: Option<Vec<String>>,
}

impl DropNa {
    pub fn new() -> Self {
        Self {
            source: Source::new(DATA_IN).with_desc(IsTabular),
            subset: None,
        }
    }

    pub fn subset<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = collect_names(columns);
        self.source.add_desc(HasColumns::new(columns.clone()));
        self.subset = Some(columns);
        self
    }
}

impl Default for DropNa {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipe for DropNa {
    crate::pipe_plumbing!("DropNa");

    fn transform(&self, data: Value, _opts: &RunOptions) -> Result<Value> {
        let df = data.into_frame(self.name())?;
        Ok(Value::Frame(df.drop_nulls(self.subset.as_deref())?))
    }
}

/// Drop rows where any checked column holds one of the values
#[derive(Debug, Clone)]
pub struct ValDrop {
    source: Source,
    values: Vec<Scalar>,
    columns: Option<Vec<String>>,
}

impl ValDrop {
    pub fn new<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        Self {
            source: Source::new(DATA_IN).with_desc(IsTabular),
            values: values.into_iter().map(Into::into).collect(),
            columns: None,
        }
    }

    /// Only check these columns
    pub fn on<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = collect_names(columns);
        self.source.add_desc(HasColumns::new(columns.clone()));
        self.columns = Some(columns);
        self
    }
}

impl Pipe for ValDrop {
    crate::pipe_plumbing!("ValDrop");

    fn transform(&self, data: Value, _opts: &RunOptions) -> Result<Value> {
        let df = data.into_frame(self.name())?;
        let mut keep = vec![true; df.height()];

        for column in checked_columns(&df, &self.columns) {
            let hits = membership(df.column(&column)?, &self.values)?;
            for (k, hit) in keep.iter_mut().zip(hits) {
                *k &= !hit;
            }
        }

        Ok(Value::Frame(filter_rows(&df, &keep)?))
    }
}

/// Keep rows where every checked column holds one of the values
#[derive(Debug, Clone)]
pub struct ValKeep {
    source: Source,
    values: Vec<Scalar>,
    columns: Option<Vec<String>>,
}

impl ValKeep {
    pub fn new<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        Self {
            source: Source::new(DATA_IN).with_desc(IsTabular),
            values: values.into_iter().map(Into::into).collect(),
            columns: None,
        }
    }

    /// Only check these columns
    pub fn on<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = collect_names(columns);
        self.source.add_desc(HasColumns::new(columns.clone()));
        self.columns = Some(columns);
        self
    }
}

impl Pipe for ValKeep {
    crate::pipe_plumbing!("ValKeep");

    fn transform(&self, data: Value, _opts: &RunOptions) -> Result<Value> {
        let df = data.into_frame(self.name())?;
        let mut keep = vec![true; df.height()];

        for column in checked_columns(&df, &self.columns) {
            let hits = membership(df.column(&column)?, &self.values)?;
            for (k, hit) in keep.iter_mut().zip(hits) {
                *k &= hit;
            }
        }

        Ok(Value::Frame(filter_rows(&df, &keep)?))
    }
}

/// Keep rows where some checked column holds a value seen at least
/// `threshold` times in that column
#[derive(Debug, Clone)]
pub struct FreqDrop {
    source: Source,
    threshold: usize,
    columns: Option<Vec<String>>,
}

impl FreqDrop {
    pub fn new(threshold: usize) -> Self {
        Self {
            source: Source::new(DATA_IN).with_desc(IsTabular),
            threshold,
            columns: None,
        }
    }

    pub fn on<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = collect_names(columns);
        self.source.add_desc(HasColumns::new(columns.clone()));
        self.columns = Some(columns);
        self
    }
}

impl Pipe for FreqDrop {
    crate::pipe_plumbing!("FreqDrop");

    fn transform(&self, data: Value, _opts: &RunOptions) -> Result<Value> {
        let df = data.into_frame(self.name())?;
        let mut keep = vec![false; df.height()];

        for column in checked_columns(&df, &self.columns) {
            let series = df.column(&column)?;
            // nulls are neither counted nor kept on their own account
            let keys = (0..series.len())
                .map(|i| {
                    series.get(i).map(|v| match v {
                        AnyValue::Null => None,
                        v => Some(v.to_string()),
                    })
                })
                .collect::<PolarsResult<Vec<Option<String>>>>()?;

            let mut counts: HashMap<&str, usize> = HashMap::new();
            for key in keys.iter().flatten() {
                *counts.entry(key.as_str()).or_insert(0) += 1;
            }

            for (k, key) in keep.iter_mut().zip(&keys) {
                if let Some(key) = key {
                    *k |= counts[key.as_str()] >= self.threshold;
                }
            }
        }

        Ok(Value::Frame(filter_rows(&df, &keep)?))
    }
}

/// How per-cell verdicts combine into a row verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reducer {
    #[default]
    Any,
    All,
    /// Exactly one
    Xor,
}

impl Reducer {
    pub fn reduce<I: IntoIterator<Item = bool>>(&self, verdicts: I) -> bool {
        let mut iter = verdicts.into_iter();
        match self {
            Reducer::Any => iter.any(|v| v),
            Reducer::All => iter.all(|v| v),
            Reducer::Xor => iter.filter(|v| *v).count() == 1,
        }
    }
}

/// Predicate over a single cell
#[derive(Clone)]
pub struct RowCondition(Arc<dyn Fn(&AnyValue) -> bool + Send + Sync>);

impl RowCondition {
    pub fn new<F>(condition: F) -> Self
    where
        F: Fn(&AnyValue) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(condition))
    }

    /// Condition on the cell's numeric value; non-numeric cells never match
    pub fn numeric<F>(condition: F) -> Self
    where
        F: Fn(f64) -> bool + Send + Sync + 'static,
    {
        Self::new(move |v| v.extract::<f64>().map_or(false, &condition))
    }

    fn test(&self, value: &AnyValue) -> bool {
        (self.0)(value)
    }
}

impl fmt::Debug for RowCondition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("RowCondition")
    }
}

/// Conditions deciding which rows `RowDrop` removes
#[derive(Debug, Clone)]
pub enum RowConditions {
    /// Every condition is checked against every checked column
    Each(Vec<RowCondition>),
    /// Each condition only looks at its own column
    PerColumn(Vec<(String, RowCondition)>),
}

/// Drop rows satisfying callable conditions
#[derive(Debug, Clone)]
pub struct RowDrop {
    source: Source,
    conditions: RowConditions,
    columns: Option<Vec<String>>,
    reducer: Reducer,
}

impl RowDrop {
    pub fn new(conditions: RowConditions) -> Self {
        let mut source = Source::new(DATA_IN).with_desc(IsTabular);
        let columns = match &conditions {
            RowConditions::PerColumn(pairs) => {
                let cols: Vec<String> = pairs.iter().map(|(c, _)| c.clone()).collect();
                source.add_desc(HasColumns::new(cols.clone()));
                Some(cols)
            }
            RowConditions::Each(_) => None,
        };

        Self {
            source,
            conditions,
            columns,
            reducer: Reducer::default(),
        }
    }

    /// Restrict `Each` conditions to these columns
    pub fn on<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = collect_names(columns);
        self.source.add_desc(HasColumns::new(columns.clone()));
        self.columns = Some(columns);
        self
    }

    pub fn reduce(mut self, reducer: Reducer) -> Self {
        self.reducer = reducer;
        self
    }

    fn row_eligible(&self, columns: &[&Series], row: usize) -> PolarsResult<bool> {
        match &self.conditions {
            RowConditions::Each(conditions) => {
                let cells = columns
                    .iter()
                    .map(|s| s.get(row))
                    .collect::<PolarsResult<Vec<_>>>()?;
                Ok(self.reducer.reduce(
                    conditions
                        .iter()
                        .map(|cond| self.reducer.reduce(cells.iter().map(|c| cond.test(c)))),
                ))
            }
            RowConditions::PerColumn(pairs) => {
                let mut verdicts = Vec::with_capacity(pairs.len());
                for ((_, cond), series) in pairs.iter().zip(columns) {
                    verdicts.push(cond.test(&series.get(row)?));
                }
                Ok(self.reducer.reduce(verdicts))
            }
        }
    }
}

impl Pipe for RowDrop {
    crate::pipe_plumbing!("RowDrop");

    fn transform(&self, data: Value, _opts: &RunOptions) -> Result<Value> {
        let df = data.into_frame(self.name())?;
        let names: Vec<String> = match &self.conditions {
            RowConditions::PerColumn(pairs) => pairs.iter().map(|(c, _)| c.clone()).collect(),
            RowConditions::Each(_) => checked_columns(&df, &self.columns),
        };
        let columns = names
            .iter()
            .map(|c| df.column(c))
            .collect::<PolarsResult<Vec<_>>>()?;

        let keep = (0..df.height())
            .map(|row| self.row_eligible(&columns, row).map(|drop| !drop))
            .collect::<PolarsResult<Vec<bool>>>()?;

        Ok(Value::Frame(filter_rows(&df, &keep)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::graph::Graph;
    use crate::source::Binding;

    fn ab() -> DataFrame {
        df!("a" => &[1i64, 4, 18], "b" => &[4i64, 5, 11]).unwrap()
    }

    fn run(pipe: impl Pipe + 'static, df: DataFrame) -> Result<DataFrame> {
        let mut graph = Graph::new();
        let node = graph.add_pipe(pipe);
        graph.bind_primary(node, Binding::literal(df))?;
        graph
            .run(node, &RunOptions::new())?
            .into_frame("test")
    }

    fn ints(df: &DataFrame, column: &str) -> Vec<Option<i64>> {
        df.column(column).unwrap().i64().unwrap().into_iter().collect()
    }

    fn dated() -> DataFrame {
        let dates = Series::new("date", &[18262i32, 18263, 18264, 18265])
            .cast(&DataType::Date)
            .unwrap();
        DataFrame::new(vec![dates, Series::new("close", &[1.0, 2.0, 3.0, 4.0])]).unwrap()
    }

    #[test]
    fn test_col_select_subsets_in_order() {
        let df = df!("a" => &[1i64], "b" => &[2i64], "c" => &[3i64]).unwrap();
        let out = run(ColSelect::new(["c", "a"]), df).unwrap();
        assert_eq!(out.get_column_names(), vec!["c", "a"]);
    }

    #[test]
    fn test_col_select_missing_column() {
        let df = df!("a" => &[1i64]).unwrap();
        let err = run(ColSelect::new(["a", "b"]), df).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("missing [b]"));
    }

    #[test]
    fn test_col_drop() {
        let df = df!("num" => &[8i64, 5], "char" => &["a", "b"]).unwrap();
        let out = run(ColDrop::new(["num"]), df).unwrap();
        assert_eq!(out.get_column_names(), vec!["char"]);
    }

    #[test]
    fn test_col_rename() {
        let df = df!("num" => &[8i64, 5], "char" => &["a", "b"]).unwrap();
        let out = run(ColRename::new([("num", "len")]), df).unwrap();
        assert_eq!(out.get_column_names(), vec!["len", "char"]);
        assert_eq!(ints(&out, "len"), vec![Some(8), Some(5)]);
    }

    #[test]
    fn test_col_rename_swap() {
        let df = df!("a" => &[1i64], "b" => &[2i64]).unwrap();
        let out = run(ColRename::new([("a", "b"), ("b", "a")]), df).unwrap();
        assert_eq!(out.get_column_names(), vec!["b", "a"]);
        assert_eq!(ints(&out, "b"), vec![Some(1)]);
    }

    #[test]
    fn test_col_reorder() {
        let df = df!("a" => &[8i64], "b" => &[4i64], "c" => &[3i64], "d" => &[7i64]).unwrap();
        let out = run(ColReorder::new([("b", 0), ("c", 3)]), df).unwrap();
        assert_eq!(out.get_column_names(), vec!["b", "a", "d", "c"]);
        assert_eq!(ints(&out, "c"), vec![Some(3)]);
    }

    #[test]
    fn test_date_select_inclusive() {
        // 2020-01-01 .. 2020-01-04
        let out = run(
            DateSelect::new(Some("2020-01-02"), Some("2020-01-03")).unwrap(),
            dated(),
        )
        .unwrap();
        let close: Vec<Option<f64>> = out.column("close").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(close, vec![Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_date_select_open_ended() {
        let out = run(DateSelect::new(Some("2020-01-03"), None).unwrap(), dated()).unwrap();
        assert_eq!(out.height(), 2);
    }

    #[test]
    fn test_date_select_rejects_bad_dates() {
        let err = DateSelect::new(Some("yesterday"), None).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_date_select_requires_time_index() {
        let err = run(DateSelect::new(None, None).unwrap(), ab()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_drop_na() {
        let df = df!("a" => &[Some(1i64), Some(4), Some(1)], "b" => &[Some(4i64), None, Some(11)])
            .unwrap();
        let out = run(DropNa::new(), df.clone()).unwrap();
        assert_eq!(ints(&out, "a"), vec![Some(1), Some(1)]);

        let out = run(DropNa::new().subset(["a"]), df).unwrap();
        assert_eq!(out.height(), 3);
    }

    #[test]
    fn test_val_drop_single_column() {
        let out = run(ValDrop::new([4]).on(["a"]), ab()).unwrap();
        assert_eq!(ints(&out, "a"), vec![Some(1), Some(18)]);
        assert_eq!(ints(&out, "b"), vec![Some(4), Some(11)]);
    }

    #[test]
    fn test_val_drop_all_columns() {
        let out = run(ValDrop::new([4]), ab()).unwrap();
        assert_eq!(ints(&out, "a"), vec![Some(18)]);
    }

    #[test]
    fn test_val_keep() {
        let df = df!("a" => &[1i64, 4, 5], "b" => &[4i64, 5, 11]).unwrap();
        let out = run(ValKeep::new([4, 5]).on(["a"]), df.clone()).unwrap();
        assert_eq!(ints(&out, "a"), vec![Some(4), Some(5)]);

        let out = run(ValKeep::new([4, 5]), df).unwrap();
        assert_eq!(ints(&out, "a"), vec![Some(4)]);
    }

    #[test]
    fn test_val_drop_strings() {
        let df = df!("sym" => &["AAPL", "MSFT", "AAPL"], "px" => &[1.0, 2.0, 3.0]).unwrap();
        let out = run(ValDrop::new(["AAPL"]).on(["sym"]), df).unwrap();
        assert_eq!(out.height(), 1);
    }

    #[test]
    fn test_value_filters_skip_unmatchable_columns() {
        let dates = Series::new("date", &[18262i32, 18263, 18264])
            .cast(&DataType::Date)
            .unwrap();
        let mut df = ab();
        df.with_column(dates).unwrap();

        let out = run(ValDrop::new([4]), df.clone()).unwrap();
        assert_eq!(ints(&out, "a"), vec![Some(18)]);
        assert_eq!(out.width(), 3);

        let out = run(ValKeep::new([4, 5]), df.clone()).unwrap();
        assert_eq!(out.height(), 0);

        let out = run(ValKeep::new([4, 5]).on(["a", "b"]), df).unwrap();
        assert_eq!(ints(&out, "b"), vec![Some(5)]);
    }

    #[test]
    fn test_freq_drop_ignores_nulls() {
        let df = df!("a" => &[None, None, Some(1i64)], "b" => &[4i64, 5, 11]).unwrap();
        let out = run(FreqDrop::new(2).on(["a"]), df.clone()).unwrap();
        assert_eq!(out.height(), 0);

        let out = run(FreqDrop::new(1).on(["a"]), df).unwrap();
        assert_eq!(ints(&out, "b"), vec![Some(11)]);
    }

    #[test]
    fn test_freq_drop() {
        let df = df!("a" => &[1i64, 4, 1], "b" => &[4i64, 5, 11]).unwrap();
        let out = run(FreqDrop::new(2).on(["a"]), df).unwrap();
        assert_eq!(ints(&out, "b"), vec![Some(4), Some(11)]);
    }

    #[test]
    fn test_row_drop_each() {
        let df = df!("a" => &[1i64, 4, 5], "b" => &[4i64, 5, 11]).unwrap();
        let cond = RowConditions::Each(vec![RowCondition::numeric(|x| x < 2.0)]);
        let out = run(RowDrop::new(cond), df).unwrap();
        assert_eq!(ints(&out, "a"), vec![Some(4), Some(5)]);
    }

    #[test]
    fn test_row_drop_per_column() {
        let df = df!("a" => &[1i64, 4, 5], "b" => &[4i64, 5, 11]).unwrap();
        let cond = RowConditions::PerColumn(vec![(
            "a".to_string(),
            RowCondition::numeric(|x| x == 4.0),
        )]);
        let out = run(RowDrop::new(cond), df).unwrap();
        assert_eq!(ints(&out, "a"), vec![Some(1), Some(5)]);
    }

    #[test]
    fn test_row_drop_reducers() {
        let df = df!("a" => &[1i64, 4, 5], "b" => &[4i64, 5, 11]).unwrap();
        let big = || RowConditions::Each(vec![RowCondition::numeric(|x| x > 4.5)]);

        let out = run(RowDrop::new(big()).reduce(Reducer::All), df.clone()).unwrap();
        assert_eq!(ints(&out, "a"), vec![Some(1), Some(4)]);

        let out = run(RowDrop::new(big()).reduce(Reducer::Xor), df).unwrap();
        assert_eq!(ints(&out, "a"), vec![Some(1), Some(5)]);
    }

    #[test]
    fn test_reducer() {
        assert!(Reducer::Any.reduce([false, true]));
        assert!(!Reducer::All.reduce([false, true]));
        assert!(Reducer::Xor.reduce([false, true]));
        assert!(!Reducer::Xor.reduce([true, true]));
    }
}
