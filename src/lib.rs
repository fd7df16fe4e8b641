//! # Dalio
//!
//! Composable, validated pipelines for tabular financial data.
//!
//! Stages live in a [`Graph`](graph::Graph) and are wired through named
//! sources. Pulling a stage resolves its sources, which pull their upstream
//! stages in turn; every source checks its descriptors before the value is
//! handed on, so bad data is reported at the stage that first sees it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dalio::prelude::*;
//! use polars::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let prices = df!("close" => &[101.5, 102.0], "volume" => &[10i64, 12])?;
//!
//!     let mut graph = Graph::new();
//!     let line = PipeLine::builder(&mut graph)
//!         .pipe(ColSelect::new(["close", "volume"]))
//!         .pipe(ColRename::new([("close", "px")]))
//!         .source(Binding::literal(prices))
//!         .build()?;
//!
//!     let grapher = graph.add_application(Grapher::new());
//!     graph.bind_primary(grapher, line.binding()?)?;
//!     let figure = graph.run(grapher, &RunOptions::new())?;
//!     println!("{}", figure);
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod builder;
pub mod config;
pub mod data;
pub mod descriptor;
pub mod error;
pub mod graph;
pub mod options;
pub mod output;
pub mod pipe;
pub mod source;
pub mod types;

pub mod prelude {
    //! Commonly used types and traits
    pub use crate::application::{
        Application, ColumnMultiGrapher, ForecastGrapher, Grapher, LMGrapher, MultiGrapher,
        RunContext, VaRGrapher, XYGrapher,
    };
    pub use crate::builder::{Algorithm, Builder, Piece, PieceRegistry};
    pub use crate::config::DalioConfig;
    pub use crate::data::{CsvProvider, DataProvider, FnProvider, FrameProvider};
    pub use crate::descriptor::{Descriptor, HasAttributes, HasColumns, IsTabular, IsTimeIndexed};
    pub use crate::error::{ErrorKind, PipeError, Result};
    pub use crate::graph::{Graph, NodeId};
    pub use crate::options::RunOptions;
    pub use crate::output::{Canvas, Figure, PlotCall, PlotKind};
    pub use crate::pipe::*;
    pub use crate::source::{Binding, Source, DATA_IN, DATA_OUT};
    pub use crate::types::{FittedModel, Scalar, Value};
}
