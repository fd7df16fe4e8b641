//! Graphers - applications drawing their sources onto a figure output
//!
//! Every grapher exposes a figure output `data_out`. Calls accumulate on
//! the figure across runs until it is reset.

use crate::application::{Application, RunContext};
use crate::builder::{Algorithm, Builder, Built, PieceRegistry};
use crate::descriptor::{HasAttributes, HasColumns, IsTabular, IsTimeIndexed};
use crate::error::{PipeError, Result};
use crate::options::{kwargs, merge_opts, Kwargs, RunOptions, DATA_LABEL, FORECAST_LABEL};
use crate::output::{Canvas, Coord, Figure, Output, Outputs, PlotCall, PlotKind};
use crate::source::{Source, Sources, DATA_IN, DATA_OUT};
use crate::types::{
    is_temporal, millis_series, temporal_millis, Value, DEFAULT_TIME_COLUMN, MAX_EXCEEDANCE,
    RETURNS,
};
use polars::prelude::*;
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use std::iter;

/// Second source of `ForecastGrapher`
pub const FORECAST_IN: &str = "forecast_in";

/// Model source of `LMGrapher`
pub const LINEAR_MODEL: &str = "linear_model";

const DEFAULT_DATA_LABEL: &str = "Data";
const DEFAULT_FORECAST_LABEL: &str = "Forecast";

/// Column kwargs `ColumnMultiGrapher` takes out of a piece, each with an `{axis}_index` flag
const AXES: [&str; 3] = ["x", "y", "z"];

/// Name of the row position column
const POSITION_COLUMN: &str = "index";

impl Algorithm for PlotKind {
    fn names() -> Vec<&'static str> {
        PlotKind::ALL.iter().map(PlotKind::as_str).collect()
    }

    fn from_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    fn name(&self) -> &'static str {
        self.as_str()
    }

    fn check_kwargs(&self, kwargs: &Kwargs) -> Result<()> {
        if let Some(alpha) = kwargs.get("alpha") {
            match alpha.as_f64() {
                Some(a) if (0.0..=1.0).contains(&a) => {}
                _ => {
                    return Err(PipeError::ConfigError(format!(
                        "alpha must be a number in [0, 1], got {}",
                        alpha
                    )))
                }
            }
        }

        for key in ["linewidth", "s"] {
            match kwargs.get(key) {
                Some(v) if !v.is_number() => {
                    return Err(PipeError::ConfigError(format!(
                        "{} must be a number, got {}",
                        key, v
                    )))
                }
                _ => {}
            }
        }

        Ok(())
    }
}

fn figure_outputs(figure: impl Figure + 'static) -> Outputs {
    iter::once(Output::figure(DATA_OUT, figure)).collect()
}

fn plot(outputs: &mut Outputs, label: &str, call: PlotCall) -> Result<()> {
    outputs.get_mut(label, DATA_OUT)?.plot(label, call)
}

fn legend(outputs: &mut Outputs, label: &str, labels: Vec<String>, loc: &str) -> Result<()> {
    outputs.get_mut(label, DATA_OUT)?.legend(label, labels, loc)
}

fn reset_figure(outputs: &mut Outputs) {
    if let Ok(out) = outputs.get_mut("", DATA_OUT) {
        out.reset();
    }
}

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|c| c.to_string())
        .collect()
}

/// Row positions `start..start + n`, the x axis of tables without one
fn position_series(n: usize, start: i64) -> Series {
    Series::new(POSITION_COLUMN, (start..start + n as i64).collect::<Vec<i64>>())
}

/// Split a table into its x column and the y columns plotted against it.
///
/// Without explicit y columns every column except x is plotted.
fn split_xy(
    df: &DataFrame,
    x: Option<&str>,
    y: Option<&[String]>,
) -> PolarsResult<(Option<Series>, DataFrame)> {
    let xs = x.map(|x| df.column(x).cloned()).transpose()?;
    let ys = match (y, x) {
        (Some(cols), _) => df.select(cols.iter().map(|c| c.as_str()))?,
        (None, Some(x)) => df.drop(x)?,
        (None, None) => df.clone(),
    };
    Ok((xs, ys))
}

fn float_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    Ok(series.cast(&DataType::Float64)?.f64()?.into_iter().collect())
}

/// Plots an entire table
#[derive(Debug, Clone)]
pub struct Grapher {
    sources: Sources,
    outputs: Outputs,
}

impl Grapher {
    pub fn new() -> Self {
        Self::with_figure(Canvas::new())
    }

    pub fn with_figure(figure: impl Figure + 'static) -> Self {
        Self {
            sources: iter::once(Source::new(DATA_IN).with_desc(IsTabular)).collect(),
            outputs: figure_outputs(figure),
        }
    }

    /// Clear everything drawn so far
    pub fn reset_out(&mut self) {
        reset_figure(&mut self.outputs);
    }
}

impl Default for Grapher {
    fn default() -> Self {
        Self::new()
    }
}

impl Application for Grapher {
    crate::app_plumbing!("Grapher");

    fn run(&mut self, ctx: &mut RunContext<'_>, opts: &RunOptions) -> Result<()> {
        let data = ctx.source_from(&self.sources, DATA_IN, opts)?;
        if data.is_empty() {
            return Ok(());
        }

        let label = ctx.label();
        let df = data.into_frame(label)?;
        plot(
            &mut self.outputs,
            label,
            PlotCall::new(df).with_style(opts.graph_opts()),
        )
    }
}

/// Plots chosen y columns against an x column
#[derive(Debug, Clone)]
pub struct XYGrapher {
    name: &'static str,
    sources: Sources,
    outputs: Outputs,
    x: Option<String>,
    y: Option<Vec<String>>,
    legend: Option<String>,
    time_column: Option<String>,
}

impl XYGrapher {
    pub fn new() -> Self {
        Self::with_figure(Canvas::new())
    }

    pub fn with_figure(figure: impl Figure + 'static) -> Self {
        let mut grapher = Self {
            name: "XYGrapher",
            sources: Sources::new(),
            outputs: figure_outputs(figure),
            x: None,
            y: None,
            legend: None,
            time_column: None,
        };
        grapher.redeclare();
        grapher
    }

    /// Grapher plotting against the time column
    pub fn time_series() -> Self {
        let mut grapher = Self::new();
        grapher.name = "TimeSeriesGrapher";
        grapher.on_time_column(DEFAULT_TIME_COLUMN)
    }

    /// Use `column` as the time index and x axis
    pub fn on_time_column(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.x = Some(column.clone());
        self.time_column = Some(column);
        self.redeclare();
        self
    }

    pub fn x(mut self, column: impl Into<String>) -> Self {
        self.x = Some(column.into());
        self.redeclare();
        self
    }

    pub fn y<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.y = Some(columns.into_iter().map(Into::into).collect());
        self.redeclare();
        self
    }

    /// Add a legend at `loc`
    pub fn legend(mut self, loc: impl Into<String>) -> Self {
        self.legend = Some(loc.into());
        self
    }

    pub fn reset_out(&mut self) {
        reset_figure(&mut self.outputs);
    }

    fn redeclare(&mut self) {
        let mut source = Source::new(DATA_IN).with_desc(IsTabular);
        if let Some(column) = &self.time_column {
            source.add_desc(IsTimeIndexed::new(column.clone()));
        }

        let columns: Vec<String> = self
            .x
            .iter()
            .chain(self.y.iter().flatten())
            .cloned()
            .collect();
        if !columns.is_empty() {
            source.add_desc(HasColumns::new(columns));
        }

        self.sources = iter::once(source).collect();
    }
}

impl Default for XYGrapher {
    fn default() -> Self {
        Self::new()
    }
}

impl Application for XYGrapher {
    crate::app_plumbing!();

    fn name(&self) -> &str {
        self.name
    }

    fn run(&mut self, ctx: &mut RunContext<'_>, opts: &RunOptions) -> Result<()> {
        let data = ctx.source_from(&self.sources, DATA_IN, opts)?;
        if data.is_empty() {
            return Ok(());
        }

        let label = ctx.label();
        let df = data.into_frame(label)?;
        let (x, y) = split_xy(&df, self.x.as_deref(), self.y.as_deref())?;
        let labels = column_names(&y);

        let mut call = PlotCall::new(y).with_style(opts.graph_opts());
        if let Some(x) = x {
            call = call.with_x(x);
        }
        plot(&mut self.outputs, label, call)?;

        if let Some(loc) = &self.legend {
            legend(&mut self.outputs, label, labels, loc)?;
        }
        Ok(())
    }
}

/// Source name of grid coordinate `coord`
pub fn coord_source(coord: Coord) -> String {
    format!("{}_{}_{}", DATA_IN, coord.0, coord.1)
}

fn grid_coords(rows: usize, cols: usize) -> Vec<Coord> {
    (0..rows)
        .flat_map(|r| (0..cols).map(move |c| (r, c)))
        .collect()
}

fn grid_sources(coords: &[Coord]) -> Sources {
    coords
        .iter()
        .map(|&c| Source::new(coord_source(c)).with_desc(IsTabular))
        .collect()
}

/// Grid builders plotting one panel per coordinate
trait FanOut: Builder<Key = Coord, Algorithm = PlotKind> {
    /// Column drawn on the horizontal axis at `coord`
    fn x_column(&self, _coord: &Coord) -> Option<String> {
        None
    }

    /// Columns the data at `coord` must carry
    fn required_columns(&self, _coord: &Coord) -> Vec<String> {
        Vec::new()
    }
}

/// One plot call per coordinate, in row-major order.
///
/// Coordinates resolving to no data are skipped; any other failure aborts.
fn fan_out<B: FanOut>(
    builder: &B,
    sources: &Sources,
    ctx: &mut RunContext<'_>,
    opts: &RunOptions,
) -> Result<Vec<PlotCall>> {
    let label = ctx.label();
    let graph_opts = opts.graph_opts();
    let coords: Vec<Coord> = builder.pieces().keys().copied().collect();
    let mut calls = Vec::with_capacity(coords.len());

    for coord in coords {
        let data = ctx.source_from(sources, &coord_source(coord), opts)?;
        if data.is_empty() {
            log::warn!("{}: no data at {:?}, skipping", label, coord);
            continue;
        }

        let required = builder.required_columns(&coord);
        let data = if required.is_empty() {
            data
        } else {
            Source::new(coord_source(coord))
                .with_desc(HasColumns::new(required))
                .admit(label, data)?
        };

        let built = builder.build_model(data, &coord)?;
        let df = built.data.into_frame(label)?;
        let call = match builder.x_column(&coord) {
            Some(x) => {
                let xs = df.column(&x)?.clone();
                PlotCall::new(df.drop(&x)?).with_x(xs)
            }
            None => PlotCall::new(df),
        };

        calls.push(
            call.at(coord)
                .with_kind_opt(built.algorithm)
                .with_style(merge_opts(&graph_opts, &built.kwargs)),
        );
    }

    Ok(calls)
}

/// Grid of independent panels, each with its own source and plot kind
#[derive(Debug, Clone)]
pub struct MultiGrapher {
    shape: Coord,
    sources: Sources,
    outputs: Outputs,
    pieces: PieceRegistry<Coord, PlotKind>,
}

impl MultiGrapher {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::with_figure(rows, cols, Canvas::grid(rows, cols))
    }

    pub fn with_figure(rows: usize, cols: usize, figure: impl Figure + 'static) -> Self {
        let coords = grid_coords(rows, cols);
        Self {
            shape: (rows, cols),
            sources: grid_sources(&coords),
            outputs: figure_outputs(figure),
            pieces: PieceRegistry::init_pieces(coords),
        }
    }

    /// (rows, cols)
    pub fn shape(&self) -> Coord {
        self.shape
    }

    /// Source feeding `coord`
    pub fn source_name(&self, coord: Coord) -> Result<String> {
        self.pieces.check_key(&coord)?;
        Ok(coord_source(coord))
    }

    pub fn reset_out(&mut self) {
        reset_figure(&mut self.outputs);
    }
}

impl Builder for MultiGrapher {
    type Key = Coord;
    type Algorithm = PlotKind;

    fn pieces(&self) -> &PieceRegistry<Coord, PlotKind> {
        &self.pieces
    }

    fn pieces_mut(&mut self) -> &mut PieceRegistry<Coord, PlotKind> {
        &mut self.pieces
    }
}

impl FanOut for MultiGrapher {}

impl Application for MultiGrapher {
    crate::app_plumbing!("MultiGrapher");

    fn run(&mut self, ctx: &mut RunContext<'_>, opts: &RunOptions) -> Result<()> {
        let calls = fan_out(&*self, &self.sources, ctx, opts)?;
        for call in calls {
            plot(&mut self.outputs, ctx.label(), call)?;
        }
        Ok(())
    }
}

fn column_kwarg(value: JsonValue) -> Vec<String> {
    match value {
        JsonValue::String(s) => vec![s],
        JsonValue::Array(items) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// What a piece plots along one axis
#[derive(Debug, Clone, PartialEq)]
enum AxisPick {
    Columns(Vec<String>),
    /// Row positions, for tables without a column to use
    Index,
}

/// Take the axis kwargs out of `kwargs`; a named column wins over the index flag
fn take_axes(kwargs: &mut Kwargs) -> [Option<AxisPick>; 3] {
    AXES.map(|axis| {
        let columns = kwargs.remove(axis).map(column_kwarg).unwrap_or_default();
        let index = kwargs
            .remove(&format!("{}_index", axis))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        if !columns.is_empty() {
            Some(AxisPick::Columns(columns))
        } else if index {
            Some(AxisPick::Index)
        } else {
            None
        }
    })
}

/// Picked columns in x, y, z order.
///
/// When neither y nor z is picked the rest of the table follows x.
fn pick_columns(df: &DataFrame, axes: &[Option<AxisPick>; 3]) -> PolarsResult<DataFrame> {
    let mut columns = Vec::new();
    for pick in axes.iter().flatten() {
        match pick {
            AxisPick::Columns(names) => {
                for name in names {
                    columns.push(df.column(name)?.clone());
                }
            }
            AxisPick::Index => columns.push(position_series(df.height(), 0)),
        }
    }

    if axes[1].is_none() && axes[2].is_none() {
        let taken: Vec<String> = columns.iter().map(|s| s.name().to_string()).collect();
        let rest: Vec<Series> = df
            .get_columns()
            .iter()
            .filter(|s| !taken.iter().any(|t| t == s.name()))
            .cloned()
            .collect();
        columns.extend(rest);
    }

    DataFrame::new(columns)
}

/// `MultiGrapher` whose pieces also pick the columns each panel plots.
///
/// The `x`, `y` and `z` piece kwargs name columns and `x_index`, `y_index`
/// or `z_index` set to true plot row positions instead. All of them are
/// taken out of the style options before plotting.
#[derive(Debug, Clone)]
pub struct ColumnMultiGrapher {
    shape: Coord,
    sources: Sources,
    outputs: Outputs,
    pieces: PieceRegistry<Coord, PlotKind>,
}

impl ColumnMultiGrapher {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::with_figure(rows, cols, Canvas::grid(rows, cols))
    }

    pub fn with_figure(rows: usize, cols: usize, figure: impl Figure + 'static) -> Self {
        let coords = grid_coords(rows, cols);
        Self {
            shape: (rows, cols),
            sources: grid_sources(&coords),
            outputs: figure_outputs(figure),
            pieces: PieceRegistry::init_pieces(coords),
        }
    }

    pub fn shape(&self) -> Coord {
        self.shape
    }

    pub fn reset_out(&mut self) {
        reset_figure(&mut self.outputs);
    }

    fn piece_axes(&self, coord: &Coord) -> [Option<AxisPick>; 3] {
        match self.pieces.get(coord) {
            Ok(piece) => take_axes(&mut piece.kwargs().clone()),
            Err(_) => Default::default(),
        }
    }
}

impl Builder for ColumnMultiGrapher {
    type Key = Coord;
    type Algorithm = PlotKind;

    fn pieces(&self) -> &PieceRegistry<Coord, PlotKind> {
        &self.pieces
    }

    fn pieces_mut(&mut self) -> &mut PieceRegistry<Coord, PlotKind> {
        &mut self.pieces
    }

    fn build_model(&self, data: Value, key: &Coord) -> Result<Built<PlotKind>> {
        let piece = self.pieces.get(key)?;
        let mut kwargs = piece.kwargs().clone();
        let axes = take_axes(&mut kwargs);

        let data = match data {
            Value::Frame(df) if axes.iter().any(Option::is_some) => {
                Value::Frame(pick_columns(&df, &axes)?)
            }
            other => other,
        };

        Ok(Built {
            data,
            algorithm: piece.name(),
            kwargs,
        })
    }
}

impl FanOut for ColumnMultiGrapher {
    fn x_column(&self, coord: &Coord) -> Option<String> {
        match self.piece_axes(coord).into_iter().next()? {
            Some(AxisPick::Columns(names)) => names.into_iter().next(),
            Some(AxisPick::Index) => Some(POSITION_COLUMN.to_string()),
            None => None,
        }
    }

    fn required_columns(&self, coord: &Coord) -> Vec<String> {
        self.piece_axes(coord)
            .into_iter()
            .flatten()
            .flat_map(|pick| match pick {
                AxisPick::Columns(names) => names,
                AxisPick::Index => Vec::new(),
            })
            .collect()
    }
}

impl Application for ColumnMultiGrapher {
    crate::app_plumbing!("ColumnMultiGrapher");

    fn run(&mut self, ctx: &mut RunContext<'_>, opts: &RunOptions) -> Result<()> {
        let calls = fan_out(&*self, &self.sources, ctx, opts)?;
        for call in calls {
            plot(&mut self.outputs, ctx.label(), call)?;
        }
        Ok(())
    }
}

/// Outer join of time-indexed tables on `time_column`, sorted by time.
///
/// Each table's value columns are named after its label, suffixed with the
/// column name when a table has more than one.
fn outer_join(time_column: &str, tables: &[(&str, DataFrame)]) -> PolarsResult<(Series, DataFrame)> {
    let mut names = Vec::new();
    let mut columns = Vec::new();
    for (label, df) in tables {
        let values: Vec<&Series> = df
            .get_columns()
            .iter()
            .filter(|s| s.name() != time_column)
            .collect();
        for s in &values {
            if values.len() == 1 {
                names.push(label.to_string());
            } else {
                names.push(format!("{} {}", label, s.name()));
            }
            columns.push(float_values(s)?);
        }
    }

    let width = names.len();
    let mut rows: BTreeMap<i64, Vec<Option<f64>>> = BTreeMap::new();
    let mut offset = 0;
    for (_, df) in tables {
        let times = temporal_millis(df.column(time_column)?)?;
        let count = df.width() - 1;
        for (i, time) in times.into_iter().enumerate() {
            if let Some(t) = time {
                let row = rows.entry(t).or_insert_with(|| vec![None; width]);
                for j in offset..offset + count {
                    row[j] = columns[j][i];
                }
            }
        }
        offset += count;
    }

    let x = millis_series(time_column, rows.keys().map(|t| Some(*t)).collect())?;
    let y = DataFrame::new(
        names
            .iter()
            .enumerate()
            .map(|(j, name)| Series::new(name, rows.values().map(|r| r[j]).collect::<Vec<_>>()))
            .collect(),
    )?;
    Ok((x, y))
}

/// Plots a table together with its forecast.
///
/// Labels come from the `data_label` and `forecast_label` run options.
#[derive(Debug, Clone)]
pub struct ForecastGrapher {
    time_column: String,
    sources: Sources,
    outputs: Outputs,
}

impl ForecastGrapher {
    pub fn new() -> Self {
        Self::with_figure(Canvas::new())
    }

    pub fn with_figure(figure: impl Figure + 'static) -> Self {
        let mut grapher = Self {
            time_column: DEFAULT_TIME_COLUMN.to_string(),
            sources: Sources::new(),
            outputs: figure_outputs(figure),
        };
        grapher.redeclare();
        grapher
    }

    pub fn on_time_column(mut self, column: impl Into<String>) -> Self {
        self.time_column = column.into();
        self.redeclare();
        self
    }

    pub fn reset_out(&mut self) {
        reset_figure(&mut self.outputs);
    }

    fn redeclare(&mut self) {
        let indexed = |name: &str| {
            Source::new(name)
                .with_desc(IsTabular)
                .with_desc(IsTimeIndexed::new(self.time_column.clone()))
        };
        self.sources = [indexed(DATA_IN), indexed(FORECAST_IN)].into_iter().collect();
    }
}

impl Default for ForecastGrapher {
    fn default() -> Self {
        Self::new()
    }
}

impl Application for ForecastGrapher {
    crate::app_plumbing!("ForecastGrapher");

    fn run(&mut self, ctx: &mut RunContext<'_>, opts: &RunOptions) -> Result<()> {
        let data = ctx.source_from(&self.sources, DATA_IN, opts)?;
        let forecast = ctx.source_from(&self.sources, FORECAST_IN, opts)?;
        let label = ctx.label();

        let mut tables = Vec::with_capacity(2);
        if !data.is_empty() {
            let name = opts.get_str(DATA_LABEL).unwrap_or(DEFAULT_DATA_LABEL);
            tables.push((name, data.into_frame(label)?));
        }
        if !forecast.is_empty() {
            let name = opts.get_str(FORECAST_LABEL).unwrap_or(DEFAULT_FORECAST_LABEL);
            tables.push((name, forecast.into_frame(label)?));
        }
        if tables.is_empty() {
            return Ok(());
        }

        let (x, y) = outer_join(&self.time_column, &tables)?;
        plot(
            &mut self.outputs,
            label,
            PlotCall::new(y).with_x(x).with_style(opts.graph_opts()),
        )
    }
}

/// Value-at-risk chart: risk lines plus the negated returns coloured by
/// their exceedance
#[derive(Debug, Clone)]
pub struct VaRGrapher {
    time_column: String,
    sources: Sources,
    outputs: Outputs,
}

impl VaRGrapher {
    pub fn new() -> Self {
        Self::with_figure(Canvas::new())
    }

    pub fn with_figure(figure: impl Figure + 'static) -> Self {
        let source = Source::new(DATA_IN)
            .with_desc(IsTabular)
            .with_desc(HasColumns::new([RETURNS, MAX_EXCEEDANCE]));
        Self {
            time_column: DEFAULT_TIME_COLUMN.to_string(),
            sources: iter::once(source).collect(),
            outputs: figure_outputs(figure),
        }
    }

    /// Column used as x axis when present
    pub fn on_time_column(mut self, column: impl Into<String>) -> Self {
        self.time_column = column.into();
        self
    }

    pub fn reset_out(&mut self) {
        reset_figure(&mut self.outputs);
    }
}

impl Default for VaRGrapher {
    fn default() -> Self {
        Self::new()
    }
}

impl Application for VaRGrapher {
    crate::app_plumbing!("VaRGrapher");

    fn run(&mut self, ctx: &mut RunContext<'_>, opts: &RunOptions) -> Result<()> {
        let data = ctx.source_from(&self.sources, DATA_IN, opts)?;
        if data.is_empty() {
            return Ok(());
        }

        let label = ctx.label();
        let df = data.into_frame(label)?;
        let x = match df.column(&self.time_column) {
            Ok(s) if is_temporal(s) => s.clone(),
            _ => position_series(df.height(), 0),
        };

        let skip = [RETURNS, MAX_EXCEEDANCE, self.time_column.as_str()];
        let lines: Vec<&str> = df
            .get_column_names()
            .into_iter()
            .filter(|c| !skip.contains(c))
            .collect();
        let graph_opts = opts.graph_opts();

        if !lines.is_empty() {
            let style = merge_opts(&graph_opts, &kwargs(json!({"linewidth": 0.5, "alpha": 0.6})));
            let call = PlotCall::new(df.select(lines)?)
                .with_x(x.clone())
                .with_kind(PlotKind::Line)
                .with_style(style);
            plot(&mut self.outputs, label, call)?;
        }

        let negated: Vec<Option<f64>> = float_values(df.column(RETURNS)?)?
            .into_iter()
            .map(|v| v.map(|v| -v))
            .collect();
        let exceedance = float_values(df.column(MAX_EXCEEDANCE)?)?;

        let style = merge_opts(&graph_opts, &kwargs(json!({"c": exceedance, "alpha": 0.5})));
        let call = PlotCall::new(DataFrame::new(vec![Series::new(RETURNS, negated)])?)
            .with_x(x)
            .with_kind(PlotKind::Scatter)
            .with_style(style);
        plot(&mut self.outputs, label, call)
    }
}

/// Plots data against the lines of a fitted linear model.
///
/// Column `i` of the plotted data is paired with coefficient `i`.
#[derive(Debug, Clone)]
pub struct LMGrapher {
    sources: Sources,
    outputs: Outputs,
    x: Option<String>,
    y: Option<Vec<String>>,
    legend: Option<String>,
}

impl LMGrapher {
    pub fn new() -> Self {
        Self::with_figure(Canvas::new())
    }

    pub fn with_figure(figure: impl Figure + 'static) -> Self {
        let mut grapher = Self {
            sources: Sources::new(),
            outputs: figure_outputs(figure),
            x: None,
            y: None,
            legend: None,
        };
        grapher.redeclare();
        grapher
    }

    pub fn x(mut self, column: impl Into<String>) -> Self {
        self.x = Some(column.into());
        self.redeclare();
        self
    }

    pub fn y<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.y = Some(columns.into_iter().map(Into::into).collect());
        self.redeclare();
        self
    }

    pub fn legend(mut self, loc: impl Into<String>) -> Self {
        self.legend = Some(loc.into());
        self
    }

    pub fn reset_out(&mut self) {
        reset_figure(&mut self.outputs);
    }

    fn redeclare(&mut self) {
        let mut data = Source::new(DATA_IN).with_desc(IsTabular);
        let columns: Vec<String> = self
            .x
            .iter()
            .chain(self.y.iter().flatten())
            .cloned()
            .collect();
        if !columns.is_empty() {
            data.add_desc(HasColumns::new(columns));
        }

        let model = Source::new(LINEAR_MODEL).with_desc(HasAttributes::new(["coef_", "intercept_"]));
        self.sources = [data, model].into_iter().collect();
    }

    fn too_few(label: &str, what: &str, needed: usize, found: usize) -> PipeError {
        PipeError::Validation {
            stage: label.to_string(),
            source_name: LINEAR_MODEL.to_string(),
            expected: format!("at least {} {}", needed, what),
            observed: format!("{} {}", found, what),
        }
    }
}

impl Default for LMGrapher {
    fn default() -> Self {
        Self::new()
    }
}

impl Application for LMGrapher {
    crate::app_plumbing!("LMGrapher");

    fn run(&mut self, ctx: &mut RunContext<'_>, opts: &RunOptions) -> Result<()> {
        let data = ctx.source_from(&self.sources, DATA_IN, opts)?;
        let model = ctx.source_from(&self.sources, LINEAR_MODEL, opts)?;
        if data.is_empty() || model.is_empty() {
            return Ok(());
        }

        let label = ctx.label();
        let df = data.into_frame(label)?;
        let lm = model.into_model(label)?;
        let (x, y) = split_xy(&df, self.x.as_deref(), self.y.as_deref())?;

        // fitted lines are evaluated at x, or at 1..=n without one
        let linspace: Vec<f64> = match &x {
            Some(x) => float_values(x)?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect(),
            None => (1..=df.height()).map(|i| i as f64).collect(),
        };
        let x = x.unwrap_or_else(|| position_series(df.height(), 0));

        let coef = lm.attribute("coef_").unwrap_or(&[]);
        let intercept = lm.attribute("intercept_").unwrap_or(&[]);
        if coef.len() < y.width() {
            return Err(Self::too_few(label, "coefficients", y.width(), coef.len()));
        }
        if intercept.len() != 1 && intercept.len() < y.width() {
            return Err(Self::too_few(label, "intercepts", y.width(), intercept.len()));
        }

        let graph_opts = opts.graph_opts();
        let scatter_opts = merge_opts(&graph_opts, &kwargs(json!({"s": 1.5})));

        for (i, series) in y.get_columns().iter().enumerate() {
            let b = if intercept.len() == 1 { intercept[0] } else { intercept[i] };
            let fitted: Vec<f64> = linspace.iter().map(|v| v * coef[i] + b).collect();

            let points = PlotCall::new(DataFrame::new(vec![series.clone()])?)
                .with_x(x.clone())
                .with_kind(PlotKind::Scatter)
                .with_style(scatter_opts.clone());
            plot(&mut self.outputs, label, points)?;

            let line = PlotCall::new(DataFrame::new(vec![Series::new(series.name(), fitted)])?)
                .with_x(x.clone())
                .with_kind(PlotKind::Line)
                .with_style(graph_opts.clone());
            plot(&mut self.outputs, label, line)?;
        }

        if let Some(loc) = &self.legend {
            legend(&mut self.outputs, label, column_names(&y), loc)?;
        }
        Ok(())
    }
}
