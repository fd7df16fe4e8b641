//! Stage graph - arena of pipes and applications wired through sources
//!
//! Every stage lives in a slot addressed by its `NodeId`. Sources refer to
//! upstream stages by id, so wiring never holds live references. A stage
//! is taken out of its slot while it executes; pulling it again before it
//! is put back means the wiring loops.

use crate::application::{Application, RunContext};
use crate::builder::Builder;
use crate::error::{PipeError, Result};
use crate::options::{Kwargs, RunOptions};
use crate::output::Output;
use crate::pipe::Pipe;
use crate::source::{Binding, Source, Upstream, DATA_OUT};
use crate::types::Value;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::fmt;

/// Index of a stage in its graph
pub type NodeId = usize;

enum Node {
    Pipe { pipe: Box<dyn Pipe>, output: Output },
    App(Box<dyn Application>),
}

struct Slot {
    label: String,
    node: Option<Node>,
}

/// Arena owning every stage
#[derive(Default)]
pub struct Graph {
    slots: Vec<Slot>,
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list()
            .entries(self.slots.iter().map(|s| &s.label))
            .finish()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pipe(&mut self, pipe: impl Pipe + 'static) -> NodeId {
        self.add_boxed_pipe(Box::new(pipe))
    }

    pub fn add_boxed_pipe(&mut self, pipe: Box<dyn Pipe>) -> NodeId {
        let label = format!("{}#{}", pipe.name(), self.slots.len());
        self.insert(
            label,
            Node::Pipe {
                pipe,
                output: Output::data(DATA_OUT),
            },
        )
    }

    pub fn add_application(&mut self, app: impl Application + 'static) -> NodeId {
        self.add_boxed_application(Box::new(app))
    }

    pub fn add_boxed_application(&mut self, app: Box<dyn Application>) -> NodeId {
        let label = format!("{}#{}", app.name(), self.slots.len());
        self.insert(label, Node::App(app))
    }

    fn insert(&mut self, label: String, node: Node) -> NodeId {
        let id = self.slots.len();
        log::debug!("Added node {}", label);
        self.slots.push(Slot {
            label,
            node: Some(node),
        });
        id
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Stage name suffixed with its id, as used in errors
    pub fn label(&self, id: NodeId) -> Result<&str> {
        self.slots
            .get(id)
            .map(|s| s.label.as_str())
            .ok_or(PipeError::UnknownNode(id))
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        let slot = self.slots.get(id).ok_or(PipeError::UnknownNode(id))?;
        slot.node.as_ref().ok_or_else(|| PipeError::CyclicPull {
            stage: slot.label.clone(),
            node: id,
        })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<(&str, &mut Node)> {
        let slot = self.slots.get_mut(id).ok_or(PipeError::UnknownNode(id))?;
        match slot.node.as_mut() {
            Some(node) => Ok((slot.label.as_str(), node)),
            None => Err(PipeError::CyclicPull {
                stage: slot.label.clone(),
                node: id,
            }),
        }
    }

    pub fn pipe(&self, id: NodeId) -> Result<&dyn Pipe> {
        match self.node(id)? {
            Node::Pipe { pipe, .. } => Ok(pipe.as_ref()),
            Node::App(_) => Err(self.wrong_kind(id, "pipe")),
        }
    }

    /// Concrete pipe at `id`, for reconfiguration
    pub fn pipe_mut<T: Pipe + 'static>(&mut self, id: NodeId) -> Result<&mut T> {
        let err = self.wrong_kind(id, std::any::type_name::<T>());
        match self.node_mut(id)?.1 {
            Node::Pipe { pipe, .. } => pipe.as_any_mut().downcast_mut::<T>().ok_or(err),
            Node::App(_) => Err(err),
        }
    }

    pub fn application<T: Application + 'static>(&self, id: NodeId) -> Result<&T> {
        match self.node(id)? {
            Node::App(app) => app
                .as_any()
                .downcast_ref::<T>()
                .ok_or_else(|| self.wrong_kind(id, std::any::type_name::<T>())),
            Node::Pipe { .. } => Err(self.wrong_kind(id, std::any::type_name::<T>())),
        }
    }

    pub fn application_mut<T: Application + 'static>(&mut self, id: NodeId) -> Result<&mut T> {
        let err = self.wrong_kind(id, std::any::type_name::<T>());
        match self.node_mut(id)?.1 {
            Node::App(app) => app.as_any_mut().downcast_mut::<T>().ok_or(err),
            Node::Pipe { .. } => Err(err),
        }
    }

    fn wrong_kind(&self, id: NodeId, expected: &str) -> PipeError {
        let label = self.label(id).unwrap_or("?");
        PipeError::ConfigError(format!("{} is not a {}", label, expected))
    }

    pub fn source(&self, id: NodeId, name: &str) -> Result<&Source> {
        let label = self.label(id)?;
        match self.node(id)? {
            Node::Pipe { pipe, .. } if pipe.source().name() == name => Ok(pipe.source()),
            Node::Pipe { pipe, .. } => Err(PipeError::UnknownSource {
                stage: label.to_string(),
                source_name: name.to_string(),
                available: vec![pipe.source().name().to_string()],
            }),
            Node::App(app) => app.sources().get(label, name),
        }
    }

    fn source_mut(&mut self, id: NodeId, name: &str) -> Result<&mut Source> {
        let (label, node) = self.node_mut(id)?;
        match node {
            Node::Pipe { pipe, .. } => {
                if pipe.source().name() == name {
                    Ok(pipe.source_mut())
                } else {
                    Err(PipeError::UnknownSource {
                        stage: label.to_string(),
                        source_name: name.to_string(),
                        available: vec![pipe.source().name().to_string()],
                    })
                }
            }
            Node::App(app) => app.sources_mut().get_mut(label, name),
        }
    }

    pub fn source_names(&self, id: NodeId) -> Result<Vec<String>> {
        Ok(match self.node(id)? {
            Node::Pipe { pipe, .. } => vec![pipe.source().name().to_string()],
            Node::App(app) => app.sources().names(),
        })
    }

    pub fn output_names(&self, id: NodeId) -> Result<Vec<String>> {
        Ok(match self.node(id)? {
            Node::Pipe { output, .. } => vec![output.name().to_string()],
            Node::App(app) => app.outputs().names(),
        })
    }

    /// Bind `id`'s source `name`, returning the binding it replaces.
    ///
    /// Bindings to another node must name an existing output and must not
    /// make `id` depend on itself.
    pub fn bind(&mut self, id: NodeId, name: &str, binding: Binding) -> Result<Option<Binding>> {
        self.source(id, name)?;

        if let Binding::Node { node, output } = &binding {
            let available = self.output_names(*node)?;
            if !available.iter().any(|o| o == output) {
                return Err(PipeError::UnknownOutput {
                    stage: self.label(*node)?.to_string(),
                    output: output.clone(),
                    available,
                });
            }

            if *node == id || self.depends_on(*node, id)? {
                return Err(PipeError::CycleDetected {
                    stage: self.label(id)?.to_string(),
                    source_name: name.to_string(),
                    node: *node,
                });
            }
        }

        log::debug!("Binding {}.{}", self.label(id)?, name);
        Ok(self.source_mut(id, name)?.bind(binding))
    }

    /// Bind the pipe's source, or an application's first source
    pub fn bind_primary(&mut self, id: NodeId, binding: Binding) -> Result<Option<Binding>> {
        let name = self.source_names(id)?.into_iter().next().ok_or_else(|| {
            PipeError::ConfigError(format!("{} declares no sources", self.label(id).unwrap_or("?")))
        })?;
        self.bind(id, &name, binding)
    }

    pub fn unbind(&mut self, id: NodeId, name: &str) -> Result<Option<Binding>> {
        Ok(self.source_mut(id, name)?.unbind())
    }

    /// Nodes `id`'s sources are bound to, in source order
    pub fn upstreams(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut nodes = Vec::new();
        match self.node(id)? {
            Node::Pipe { pipe, .. } => nodes.extend(pipe.source().binding().and_then(Binding::upstream_node)),
            Node::App(app) => nodes.extend(
                app.sources()
                    .iter()
                    .filter_map(|s| s.binding().and_then(Binding::upstream_node)),
            ),
        }
        Ok(nodes)
    }

    /// Whether pulling `from` eventually pulls `target`
    fn depends_on(&self, from: NodeId, target: NodeId) -> Result<bool> {
        let mut visited = HashSet::new();
        let mut stack = vec![from];

        while let Some(id) = stack.pop() {
            if id == target {
                return Ok(true);
            }
            if visited.insert(id) {
                stack.extend(self.upstreams(id)?);
            }
        }

        Ok(false)
    }

    /// Order in which pulling `id` executes nodes, upstreams first
    pub fn pull_order(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        self.visit(id, &mut visited, &mut rec_stack, &mut order)?;
        Ok(order)
    }

    fn visit(
        &self,
        id: NodeId,
        visited: &mut HashSet<NodeId>,
        rec_stack: &mut HashSet<NodeId>,
        order: &mut Vec<NodeId>,
    ) -> Result<()> {
        if rec_stack.contains(&id) {
            return Err(PipeError::CyclicPull {
                stage: self.label(id)?.to_string(),
                node: id,
            });
        }

        if !visited.insert(id) {
            return Ok(());
        }

        rec_stack.insert(id);
        for dep in self.upstreams(id)? {
            self.visit(dep, visited, rec_stack, order)?;
        }
        rec_stack.remove(&id);

        order.push(id);
        Ok(())
    }

    /// Pull `id`: resolve its sources, recompute it and return its primary
    /// output.
    ///
    /// Upstream nodes are recomputed on every pull. A failure leaves
    /// previously produced outputs in place.
    pub fn run(&mut self, id: NodeId, opts: &RunOptions) -> Result<Value> {
        let label = self.label(id)?.to_string();
        let mut node = self.slots[id].node.take().ok_or_else(|| PipeError::CyclicPull {
            stage: label.clone(),
            node: id,
        })?;

        log::debug!("Running {}", label);
        let result = self.execute(&label, &mut node, opts);
        self.slots[id].node = Some(node);

        result.map_err(|e| match e {
            PipeError::PolarsError(err) => PipeError::computation(&label, err.to_string()),
            other => other,
        })
    }

    fn execute(&mut self, label: &str, node: &mut Node, opts: &RunOptions) -> Result<Value> {
        match node {
            Node::Pipe { pipe, output } => {
                let data = pipe.source().resolve(label, self, opts)?;
                let value = if data.is_empty() {
                    data
                } else {
                    pipe.transform(data, opts)?
                };
                output.set(label, value)?;
                output.request(label, opts)
            }
            Node::App(app) => {
                let mut ctx = RunContext::new(label, self);
                app.run(&mut ctx, opts)?;
                match app.outputs().names().first() {
                    Some(primary) => app.outputs().get(label, primary)?.request(label, opts),
                    None => Ok(Value::Empty),
                }
            }
        }
    }

    /// Value (or rendering) currently held by output `name` of `id`
    pub fn request(&self, id: NodeId, name: &str, query: &RunOptions) -> Result<Value> {
        let label = self.label(id)?;
        match self.node(id)? {
            Node::Pipe { output, .. } if output.name() == name => output.request(label, query),
            Node::Pipe { output, .. } => Err(PipeError::UnknownOutput {
                stage: label.to_string(),
                output: name.to_string(),
                available: vec![output.name().to_string()],
            }),
            Node::App(app) => app.outputs().get(label, name)?.request(label, query),
        }
    }

    /// Clear output `name` of `id`
    pub fn reset(&mut self, id: NodeId, name: &str) -> Result<()> {
        let (label, node) = self.node_mut(id)?;
        match node {
            Node::Pipe { output, .. } if output.name() == name => output.reset(),
            Node::Pipe { output, .. } => {
                return Err(PipeError::UnknownOutput {
                    stage: label.to_string(),
                    output: name.to_string(),
                    available: vec![output.name().to_string()],
                })
            }
            Node::App(app) => app.outputs_mut().get_mut(label, name)?.reset(),
        }
        Ok(())
    }

    /// Add a disconnected copy of `id`, returning the copy's id
    pub fn copy_node(&mut self, id: NodeId) -> Result<NodeId> {
        let copy = match self.node(id)? {
            Node::Pipe { pipe, .. } => Node::Pipe {
                pipe: pipe.copy(),
                output: Output::data(DATA_OUT),
            },
            Node::App(app) => Node::App(app.copy()),
        };

        let name = match &copy {
            Node::Pipe { pipe, .. } => pipe.name().to_string(),
            Node::App(app) => app.name().to_string(),
        };
        let label = format!("{}#{}", name, self.slots.len());
        Ok(self.insert(label, copy))
    }

    /// Forward a piece selection to the builder application at `id`
    pub fn set_piece<T>(
        &mut self,
        id: NodeId,
        key: T::Key,
        name: &str,
        args: Vec<JsonValue>,
        kwargs: Kwargs,
    ) -> Result<()>
    where
        T: Application + Builder + 'static,
    {
        self.application_mut::<T>(id)?
            .set_piece(key, name, args, kwargs)?;
        Ok(())
    }
}

impl Upstream for Graph {
    fn pull(&mut self, node: NodeId, output: &str, opts: &RunOptions) -> Result<Value> {
        let value = self.run(node, opts)?;
        let primary = self.output_names(node)?.into_iter().next();
        if primary.as_deref() == Some(output) {
            Ok(value)
        } else {
            self.request(node, output, opts)
        }
    }
}
