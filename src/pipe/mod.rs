//! Pipes - single-source transformation stages - and pipelines of them

pub mod select;

use crate::error::{PipeError, Result};
use crate::graph::{Graph, NodeId};
use crate::options::RunOptions;
use crate::source::{Binding, Source};
use crate::types::Value;
use std::any::Any;

pub use select::{
    ColDrop, ColRename, ColReorder, ColSelect, DateSelect, DropNa, FreqDrop, Reducer, RowCondition,
    RowConditions, RowDrop, ValDrop, ValKeep,
};

/// Atomic transformation: one validated source in, one value out.
///
/// `transform` must depend only on its input and the pipe's configuration,
/// so that a copy fed the same data produces the same value.
pub trait Pipe: Send + Sync {
    /// Stage name used in errors and logs
    fn name(&self) -> &str;

    fn source(&self) -> &Source;

    fn source_mut(&mut self) -> &mut Source;

    fn transform(&self, data: Value, opts: &RunOptions) -> Result<Value>;

    /// Same configuration, source left unbound
    fn copy(&self) -> Box<dyn Pipe>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Implements the parts of `Pipe` every cloneable pipe with a `source`
/// field shares.
#[macro_export]
macro_rules! pipe_plumbing {
    ($name:literal) => {
        fn name(&self) -> &str {
            $name
        }

        fn source(&self) -> &$crate::source::Source {
            &self.source
        }

        fn source_mut(&mut self) -> &mut $crate::source::Source {
            &mut self.source
        }

        fn copy(&self) -> Box<dyn $crate::pipe::Pipe> {
            let mut copy = self.clone();
            copy.source.unbind();
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

/// Ordered chain of pipe nodes.
///
/// Every stage's source is bound to the previous stage's output, so the
/// chain's source is its head's source and its output is its tail's
/// output. Pulling the tail pulls the whole chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipeLine {
    stages: Vec<NodeId>,
}

impl PipeLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fluent assembly ending in an explicit `build`
    pub fn builder(graph: &mut Graph) -> PipeLineBuilder<'_> {
        PipeLineBuilder {
            graph,
            line: PipeLine::new(),
            error: None,
        }
    }

    pub fn head(&self) -> Option<NodeId> {
        self.stages.first().copied()
    }

    pub fn tail(&self) -> Option<NodeId> {
        self.stages.last().copied()
    }

    pub fn stages(&self) -> &[NodeId] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Append an existing pipe node, wiring it to the current tail.
    ///
    /// On an empty chain the node becomes head and tail and keeps whatever
    /// binding its source already has.
    pub fn append(&mut self, graph: &mut Graph, node: NodeId) -> Result<&mut Self> {
        graph.pipe(node)?;

        if self.stages.contains(&node) {
            return Err(PipeError::ConfigError(format!(
                "{} is already part of this pipeline",
                graph.label(node)?
            )));
        }

        if let Some(tail) = self.tail() {
            graph.bind_primary(node, Binding::node(tail))?;
        }

        self.stages.push(node);
        Ok(self)
    }

    /// Add `pipe` to the graph and append it
    pub fn append_pipe(&mut self, graph: &mut Graph, pipe: impl Pipe + 'static) -> Result<&mut Self> {
        let node = graph.add_pipe(pipe);
        self.append(graph, node)
    }

    /// Append a whole sub-pipeline, wiring its head to the current tail
    pub fn extend(&mut self, graph: &mut Graph, other: &PipeLine) -> Result<&mut Self> {
        if let Some(shared) = other.stages.iter().find(|id| self.stages.contains(id)) {
            return Err(PipeError::ConfigError(format!(
                "{} is already part of this pipeline",
                graph.label(*shared)?
            )));
        }

        if let (Some(tail), Some(head)) = (self.tail(), other.head()) {
            graph.bind_primary(head, Binding::node(tail))?;
        }

        self.stages.extend_from_slice(&other.stages);
        Ok(self)
    }

    /// Bind the chain's public source (its head's source)
    pub fn bind_source(&self, graph: &mut Graph, binding: Binding) -> Result<()> {
        let head = self.head().ok_or_else(Self::empty_error)?;
        graph.bind_primary(head, binding)?;
        Ok(())
    }

    /// Binding other stages use to consume this chain's output
    pub fn binding(&self) -> Result<Binding> {
        self.tail().map(Binding::node).ok_or_else(Self::empty_error)
    }

    /// Pull the whole chain through its tail
    pub fn run(&self, graph: &mut Graph, opts: &RunOptions) -> Result<Value> {
        let tail = self.tail().ok_or_else(Self::empty_error)?;
        graph.run(tail, opts)
    }

    /// Copy every stage and rewire the copies; the new head is unbound
    pub fn copy(&self, graph: &mut Graph) -> Result<PipeLine> {
        let mut line = PipeLine::new();
        for &stage in &self.stages {
            let copy = graph.copy_node(stage)?;
            line.append(graph, copy)?;
        }
        Ok(line)
    }

    fn empty_error() -> PipeError {
        PipeError::ConfigError("pipeline has no stages".to_string())
    }
}

/// Fluent pipeline assembly.
///
/// Configuration errors are kept until `build`, which also checks the
/// assembled chain for cycles.
pub struct PipeLineBuilder<'g> {
    graph: &'g mut Graph,
    line: PipeLine,
    error: Option<PipeError>,
}

impl<'g> PipeLineBuilder<'g> {
    pub fn pipe(mut self, pipe: impl Pipe + 'static) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.line.append_pipe(self.graph, pipe) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn node(mut self, node: NodeId) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.line.append(self.graph, node) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn line(mut self, other: &PipeLine) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.line.extend(self.graph, other) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Bind the head's source
    pub fn source(mut self, binding: Binding) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.line.bind_source(self.graph, binding) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn build(self) -> Result<PipeLine> {
        if let Some(e) = self.error {
            return Err(e);
        }

        let tail = self.line.tail().ok_or_else(PipeLine::empty_error)?;
        self.graph.pull_order(tail)?;

        log::info!(
            "Assembled pipeline of {} stages ending at {}",
            self.line.len(),
            self.graph.label(tail)?
        );

        Ok(self.line)
    }
}
