//! Applications - terminal stages with any number of sources and outputs
//!
//! Unlike a pipe, an application decides itself which sources to resolve
//! and which outputs to write. Graphers are the built-in family.

pub mod graphers;

use crate::error::Result;
use crate::options::RunOptions;
use crate::output::Outputs;
use crate::source::{Sources, Upstream};
use crate::types::Value;
use std::any::Any;

pub use graphers::{
    ColumnMultiGrapher, ForecastGrapher, Grapher, LMGrapher, MultiGrapher, VaRGrapher, XYGrapher,
};

/// Stage consuming named sources and producing named outputs
pub trait Application: Send + Sync {
    fn name(&self) -> &str;

    fn sources(&self) -> &Sources;

    fn sources_mut(&mut self) -> &mut Sources;

    fn outputs(&self) -> &Outputs;

    fn outputs_mut(&mut self) -> &mut Outputs;

    /// Resolve whichever sources are needed and write the outputs.
    ///
    /// Sources are resolved in the order the implementation asks for them.
    fn run(&mut self, ctx: &mut RunContext<'_>, opts: &RunOptions) -> Result<()>;

    /// Same configuration, sources unbound, outputs cleared
    fn copy(&self) -> Box<dyn Application>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// What an application sees of the graph while it runs
pub struct RunContext<'a> {
    label: &'a str,
    upstream: &'a mut dyn Upstream,
}

impl<'a> RunContext<'a> {
    pub fn new(label: &'a str, upstream: &'a mut dyn Upstream) -> Self {
        Self { label, upstream }
    }

    /// Label of the running node, used in errors
    pub fn label(&self) -> &'a str {
        self.label
    }

    /// Resolve and validate the named source
    pub fn source_from(&mut self, sources: &Sources, name: &str, opts: &RunOptions) -> Result<Value> {
        sources
            .get(self.label, name)?
            .resolve(self.label, &mut *self.upstream, opts)
    }
}

/// Implements the parts of `Application` shared by every cloneable
/// application with `sources` and `outputs` fields.
#[macro_export]
macro_rules! app_plumbing {
    ($name:literal) => {
        fn name(&self) -> &str {
            $name
        }

        $crate::app_plumbing!();
    };
    () => {
        fn sources(&self) -> &$crate::source::Sources {
            &self.sources
        }

        fn sources_mut(&mut self) -> &mut $crate::source::Sources {
            &mut self.sources
        }

        fn outputs(&self) -> &$crate::output::Outputs {
            &self.outputs
        }

        fn outputs_mut(&mut self) -> &mut $crate::output::Outputs {
            &mut self.outputs
        }

        fn copy(&self) -> Box<dyn $crate::application::Application> {
            let mut copy = self.clone();
            copy.sources = self.sources.disconnected();
            copy.outputs = self.outputs.fresh();
            Box::new(copy)
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    };
}
