//! Outputs, figures and the built-in recording canvas
//!
//! An output either holds the last value its stage produced or wraps a
//! figure that graphers plot into. Figures accumulate calls until reset.

use crate::config::GraphConfig;
use crate::error::{PipeError, Result};
use crate::options::{GraphOpts, RunOptions};
use crate::types::Value;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;

/// Grid coordinate (row, col) of a panel
pub type Coord = (usize, usize);

/// Kind of plot a call renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotKind {
    #[default]
    Line,
    Scatter,
    Bar,
    Hist,
    Area,
}

impl PlotKind {
    pub const ALL: [PlotKind; 5] = [
        PlotKind::Line,
        PlotKind::Scatter,
        PlotKind::Bar,
        PlotKind::Hist,
        PlotKind::Area,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlotKind::Line => "line",
            PlotKind::Scatter => "scatter",
            PlotKind::Bar => "bar",
            PlotKind::Hist => "hist",
            PlotKind::Area => "area",
        }
    }
}

impl fmt::Display for PlotKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PlotKind {
    type Err = PipeError;

    fn from_str(s: &str) -> Result<Self> {
        PlotKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| PipeError::ConfigError(format!("unknown plot kind '{}'", s)))
    }
}

/// One request to draw data onto a figure
#[derive(Debug, Clone)]
pub struct PlotCall {
    pub coord: Option<Coord>,
    pub kind: Option<PlotKind>,
    /// Horizontal axis; row position when absent
    pub x: Option<Series>,
    pub y: DataFrame,
    pub style: GraphOpts,
}

impl PlotCall {
    pub fn new(y: DataFrame) -> Self {
        Self {
            coord: None,
            kind: None,
            x: None,
            y,
            style: GraphOpts::new(),
        }
    }

    pub fn with_x(mut self, x: Series) -> Self {
        self.x = Some(x);
        self
    }

    pub fn with_kind(mut self, kind: PlotKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_kind_opt(mut self, kind: Option<PlotKind>) -> Self {
        self.kind = kind;
        self
    }

    pub fn at(mut self, coord: Coord) -> Self {
        self.coord = Some(coord);
        self
    }

    pub fn with_style(mut self, style: GraphOpts) -> Self {
        self.style = style;
        self
    }

    fn summary(&self) -> serde_json::Value {
        json!({
            "coord": self.coord.map(|(r, c)| vec![r, c]),
            "kind": self.kind.map(|k| k.as_str()),
            "x": self.x.as_ref().map(|s| s.name().to_string()),
            "columns": self.y.get_column_names(),
            "rows": self.y.height(),
            "style": self.style,
        })
    }
}

impl PartialEq for PlotCall {
    fn eq(&self, other: &Self) -> bool {
        let same_x = match (&self.x, &other.x) {
            (Some(a), Some(b)) => a.name() == b.name() && a.equals_missing(b),
            (None, None) => true,
            _ => false,
        };
        self.coord == other.coord
            && self.kind == other.kind
            && same_x
            && self.y.get_column_names() == other.y.get_column_names()
            && self.y.equals_missing(&other.y)
            && self.style == other.style
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Legend {
    pub labels: Vec<String>,
    pub loc: String,
}

/// Renderable state of a figure at request time
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FigureSnapshot {
    shape: Option<Coord>,
    calls: Vec<PlotCall>,
    legend: Option<Legend>,
}

impl FigureSnapshot {
    pub fn shape(&self) -> Option<Coord> {
        self.shape
    }

    pub fn calls(&self) -> &[PlotCall] {
        &self.calls
    }

    pub fn legend(&self) -> Option<&Legend> {
        self.legend.as_ref()
    }

    /// Coordinates in the order they were drawn
    pub fn coords(&self) -> Vec<Coord> {
        self.calls.iter().filter_map(|c| c.coord).collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "shape": self.shape.map(|(r, c)| vec![r, c]),
            "calls": self.calls.iter().map(PlotCall::summary).collect::<Vec<_>>(),
            "legend": self.legend,
        })
    }
}

/// Rendering surface graphers draw on
pub trait Figure: fmt::Debug + Send + Sync {
    fn plot(&mut self, call: PlotCall) -> Result<()>;

    fn legend(&mut self, _labels: Vec<String>, _loc: &str) {}

    fn request(&self, query: &RunOptions) -> Result<FigureSnapshot>;

    /// Clear accumulated state
    fn reset(&mut self);

    fn box_clone(&self) -> Box<dyn Figure>;
}

impl Clone for Box<dyn Figure> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Figure recording every call in order
#[derive(Debug, Clone, Default)]
pub struct Canvas {
    shape: Option<Coord>,
    default_kind: PlotKind,
    calls: Vec<PlotCall>,
    legend: Option<Legend>,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canvas split into `rows` x `cols` panels
    pub fn grid(rows: usize, cols: usize) -> Self {
        Self {
            shape: Some((rows, cols)),
            ..Self::default()
        }
    }

    pub fn from_config(config: &GraphConfig) -> Self {
        Self::new().with_default_kind(config.default_kind)
    }

    pub fn with_default_kind(mut self, kind: PlotKind) -> Self {
        self.default_kind = kind;
        self
    }
}

impl Figure for Canvas {
    fn plot(&mut self, mut call: PlotCall) -> Result<()> {
        if let (Some((rows, cols)), Some((r, c))) = (self.shape, call.coord) {
            if r >= rows || c >= cols {
                return Err(PipeError::ConfigError(format!(
                    "coordinate ({}, {}) outside a {}x{} canvas",
                    r, c, rows, cols
                )));
            }
        }
        call.kind.get_or_insert(self.default_kind);
        self.calls.push(call);
        Ok(())
    }

    fn legend(&mut self, labels: Vec<String>, loc: &str) {
        self.legend = Some(Legend {
            labels,
            loc: loc.to_string(),
        });
    }

    fn request(&self, _query: &RunOptions) -> Result<FigureSnapshot> {
        Ok(FigureSnapshot {
            shape: self.shape,
            calls: self.calls.clone(),
            legend: self.legend.clone(),
        })
    }

    fn reset(&mut self) {
        self.calls.clear();
        self.legend = None;
    }

    fn box_clone(&self) -> Box<dyn Figure> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Data(Option<Value>),
    Figure(Box<dyn Figure>),
}

/// Named output slot
#[derive(Debug, Clone)]
pub struct Output {
    name: String,
    slot: Slot,
}

impl Output {
    /// Output holding produced values
    pub fn data(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: Slot::Data(None),
        }
    }

    /// Output wrapping a figure
    pub fn figure(name: impl Into<String>, figure: impl Figure + 'static) -> Self {
        Self {
            name: name.into(),
            slot: Slot::Figure(Box::new(figure)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_figure(&self) -> bool {
        matches!(self.slot, Slot::Figure(_))
    }

    /// Store a produced value, replacing the previous one
    pub fn set(&mut self, stage: &str, value: Value) -> Result<()> {
        match &mut self.slot {
            Slot::Data(slot) => {
                *slot = Some(value);
                Ok(())
            }
            Slot::Figure(_) => Err(PipeError::ConfigError(format!(
                "cannot store a value in figure output '{}' of {}",
                self.name, stage
            ))),
        }
    }

    /// Most recent value, or the figure's current rendering
    pub fn request(&self, stage: &str, query: &RunOptions) -> Result<Value> {
        match &self.slot {
            Slot::Data(Some(value)) => Ok(value.clone()),
            Slot::Data(None) => Err(PipeError::OutputUnset {
                stage: stage.to_string(),
                output: self.name.clone(),
            }),
            Slot::Figure(figure) => Ok(Value::Figure(figure.request(query)?)),
        }
    }

    pub fn plot(&mut self, stage: &str, call: PlotCall) -> Result<()> {
        self.figure_mut(stage)?.plot(call)
    }

    pub fn legend(&mut self, stage: &str, labels: Vec<String>, loc: &str) -> Result<()> {
        self.figure_mut(stage)?.legend(labels, loc);
        Ok(())
    }

    /// Forget the produced value or clear the figure
    pub fn reset(&mut self) {
        match &mut self.slot {
            Slot::Data(slot) => *slot = None,
            Slot::Figure(figure) => figure.reset(),
        }
    }

    /// Same configuration, nothing produced yet
    pub fn fresh(&self) -> Self {
        let mut out = self.clone();
        out.reset();
        out
    }

    fn figure_mut(&mut self, stage: &str) -> Result<&mut Box<dyn Figure>> {
        match &mut self.slot {
            Slot::Figure(figure) => Ok(figure),
            Slot::Data(_) => Err(PipeError::NotAFigure {
                stage: stage.to_string(),
                output: self.name.clone(),
            }),
        }
    }
}

/// Ordered set of uniquely named outputs
#[derive(Debug, Clone, Default)]
pub struct Outputs {
    list: Vec<Output>,
}

impl Outputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, stage: &str, output: Output) -> Result<&mut Self> {
        if self.list.iter().any(|o| o.name() == output.name()) {
            return Err(PipeError::ConfigError(format!(
                "{} already declares output '{}'",
                stage,
                output.name()
            )));
        }
        self.list.push(output);
        Ok(self)
    }

    pub fn get(&self, stage: &str, name: &str) -> Result<&Output> {
        match self.list.iter().position(|o| o.name() == name) {
            Some(i) => Ok(&self.list[i]),
            None => Err(self.unknown(stage, name)),
        }
    }

    pub fn get_mut(&mut self, stage: &str, name: &str) -> Result<&mut Output> {
        match self.list.iter().position(|o| o.name() == name) {
            Some(i) => Ok(&mut self.list[i]),
            None => Err(self.unknown(stage, name)),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.list.iter().map(|o| o.name().to_string()).collect()
    }

    pub fn fresh(&self) -> Self {
        Self {
            list: self.list.iter().map(Output::fresh).collect(),
        }
    }

    fn unknown(&self, stage: &str, name: &str) -> PipeError {
        PipeError::UnknownOutput {
            stage: stage.to_string(),
            output: name.to_string(),
            available: self.names(),
        }
    }
}

impl FromIterator<Output> for Outputs {
    /// Later outputs replace earlier ones of the same name
    fn from_iter<I: IntoIterator<Item = Output>>(iter: I) -> Self {
        let mut outputs = Outputs::new();
        for output in iter {
            match outputs.list.iter().position(|o| o.name() == output.name()) {
                Some(i) => outputs.list[i] = output,
                None => outputs.list.push(output),
            }
        }
        outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df!("a" => &[1.0, 2.0]).unwrap()
    }

    #[test]
    fn test_plot_kind_parsing() {
        assert_eq!("scatter".parse::<PlotKind>().unwrap(), PlotKind::Scatter);
        assert!("pie".parse::<PlotKind>().is_err());
        assert_eq!(PlotKind::default(), PlotKind::Line);
    }

    #[test]
    fn test_data_output_unset_then_set() {
        let mut out = Output::data("data_out");
        let err = out.request("Stage", &RunOptions::new()).unwrap_err();
        assert!(matches!(err, PipeError::OutputUnset { .. }));

        out.set("Stage", Value::Frame(frame())).unwrap();
        assert_eq!(
            out.request("Stage", &RunOptions::new()).unwrap(),
            Value::Frame(frame())
        );

        out.reset();
        assert!(out.request("Stage", &RunOptions::new()).is_err());
    }

    #[test]
    fn test_plot_on_data_output_fails() {
        let mut out = Output::data("data_out");
        let err = out.plot("Stage", PlotCall::new(frame())).unwrap_err();
        assert!(matches!(err, PipeError::NotAFigure { .. }));
    }

    #[test]
    fn test_canvas_records_and_resets() {
        let mut out = Output::figure("data_out", Canvas::new());
        out.plot("Grapher", PlotCall::new(frame())).unwrap();
        out.plot("Grapher", PlotCall::new(frame()).with_kind(PlotKind::Scatter))
            .unwrap();

        let snapshot = out.request("Grapher", &RunOptions::new()).unwrap();
        let calls = snapshot.as_figure().unwrap().calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].kind, Some(PlotKind::Line));
        assert_eq!(calls[1].kind, Some(PlotKind::Scatter));

        out.reset();
        let snapshot = out.request("Grapher", &RunOptions::new()).unwrap();
        assert!(snapshot.as_figure().unwrap().calls().is_empty());
    }

    #[test]
    fn test_canvas_rejects_out_of_grid() {
        let mut canvas = Canvas::grid(1, 2);
        assert!(canvas.plot(PlotCall::new(frame()).at((0, 1))).is_ok());
        assert!(canvas.plot(PlotCall::new(frame()).at((1, 0))).is_err());
    }

    #[test]
    fn test_fresh_output_forgets_state() {
        let mut out = Output::figure("data_out", Canvas::new());
        out.plot("Grapher", PlotCall::new(frame())).unwrap();
        let copy = out.fresh();
        let snapshot = copy.request("Grapher", &RunOptions::new()).unwrap();
        assert!(snapshot.as_figure().unwrap().calls().is_empty());
    }

    #[test]
    fn test_snapshot_json() {
        let mut canvas = Canvas::grid(1, 1).with_default_kind(PlotKind::Bar);
        canvas.plot(PlotCall::new(frame()).at((0, 0))).unwrap();
        canvas.legend(vec!["a".into()], "upper left");

        let json = canvas.request(&RunOptions::new()).unwrap().to_json();
        assert_eq!(json["shape"], json!([1, 1]));
        assert_eq!(json["calls"][0]["kind"], json!("bar"));
        assert_eq!(json["calls"][0]["columns"], json!(["a"]));
        assert_eq!(json["legend"]["loc"], json!("upper left"));
    }
}
