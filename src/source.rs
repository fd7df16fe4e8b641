//! Sources - named, validated input slots
//!
//! Resolving a source fetches the bound value and runs every attached
//! descriptor over it in attachment order. The first failing descriptor
//! decides the error. Values are returned untouched.

use crate::data::DataProvider;
use crate::descriptor::{Descriptor, DescriptorRef};
use crate::error::{PipeError, Result};
use crate::graph::NodeId;
use crate::options::RunOptions;
use crate::types::Value;
use std::sync::Arc;

/// Default output every pipe and grapher exposes
pub const DATA_OUT: &str = "data_out";

/// Default source every pipe and grapher exposes
pub const DATA_IN: &str = "data_in";

/// What a source pulls its value from
#[derive(Debug, Clone)]
pub enum Binding {
    /// Constant value
    Literal(Value),
    /// External leaf provider
    Provider(Arc<dyn DataProvider>),
    /// Named output of another node in the same graph
    Node { node: NodeId, output: String },
}

impl Binding {
    pub fn literal(value: impl Into<Value>) -> Self {
        Binding::Literal(value.into())
    }

    /// Binding that always resolves to the "no data" marker
    pub fn empty() -> Self {
        Binding::Literal(Value::Empty)
    }

    pub fn provider(provider: impl DataProvider + 'static) -> Self {
        Binding::Provider(Arc::new(provider))
    }

    /// Primary output of `node`
    pub fn node(node: NodeId) -> Self {
        Self::output(node, DATA_OUT)
    }

    pub fn output(node: NodeId, output: impl Into<String>) -> Self {
        Binding::Node {
            node,
            output: output.into(),
        }
    }

    pub fn upstream_node(&self) -> Option<NodeId> {
        match self {
            Binding::Node { node, .. } => Some(*node),
            _ => None,
        }
    }
}

/// Pulls the value of another node's output.
///
/// Implemented by the graph; sources only see this seam.
pub trait Upstream {
    fn pull(&mut self, node: NodeId, output: &str, opts: &RunOptions) -> Result<Value>;
}

/// Named input slot with its descriptors and optional binding
#[derive(Debug, Clone)]
pub struct Source {
    name: String,
    descriptors: Vec<DescriptorRef>,
    binding: Option<Binding>,
}

impl Source {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptors: Vec::new(),
            binding: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach a descriptor (consuming form, for construction)
    pub fn with_desc(mut self, desc: impl Descriptor + 'static) -> Self {
        self.add_desc(desc);
        self
    }

    /// Attach a descriptor
    pub fn add_desc(&mut self, desc: impl Descriptor + 'static) -> &mut Self {
        self.descriptors.push(Arc::new(desc));
        self
    }

    pub fn descriptors(&self) -> &[DescriptorRef] {
        &self.descriptors
    }

    pub fn binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Bind, returning whatever binding was replaced
    pub fn bind(&mut self, binding: Binding) -> Option<Binding> {
        self.binding.replace(binding)
    }

    pub fn unbind(&mut self) -> Option<Binding> {
        self.binding.take()
    }

    /// Same name and descriptors, no binding
    pub fn disconnected(&self) -> Self {
        Self {
            name: self.name.clone(),
            descriptors: self.descriptors.clone(),
            binding: None,
        }
    }

    /// Run every descriptor over `value`, returning it unchanged on success.
    ///
    /// The "no data" marker is passed through without being checked.
    pub fn admit(&self, stage: &str, value: Value) -> Result<Value> {
        if value.is_empty() {
            return Ok(value);
        }

        for desc in &self.descriptors {
            if let Err(failure) = desc.check(&value) {
                return Err(PipeError::Validation {
                    stage: stage.to_string(),
                    source_name: self.name.clone(),
                    expected: failure.expected,
                    observed: failure.observed,
                });
            }
        }

        Ok(value)
    }

    /// Fetch the bound value and validate it
    pub fn resolve(
        &self,
        stage: &str,
        upstream: &mut dyn Upstream,
        opts: &RunOptions,
    ) -> Result<Value> {
        let binding = self.binding.as_ref().ok_or_else(|| PipeError::UnboundSource {
            stage: stage.to_string(),
            source_name: self.name.clone(),
        })?;

        log::debug!("Resolving {}.{}", stage, self.name);

        let value = match binding {
            Binding::Literal(value) => value.clone(),
            Binding::Provider(provider) => provider.provide(opts)?,
            Binding::Node { node, output } => upstream.pull(*node, output, opts)?,
        };

        self.admit(stage, value)
    }
}

/// Ordered set of uniquely named sources
#[derive(Debug, Clone, Default)]
pub struct Sources {
    list: Vec<Source>,
}

impl Sources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare sources by name, in order
    pub fn init<I, S>(&mut self, stage: &str, names: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.add(stage, Source::new(name))?;
        }
        Ok(self)
    }

    pub fn add(&mut self, stage: &str, source: Source) -> Result<&mut Self> {
        if self.list.iter().any(|s| s.name() == source.name()) {
            return Err(PipeError::ConfigError(format!(
                "{} already declares source '{}'",
                stage,
                source.name()
            )));
        }
        self.list.push(source);
        Ok(self)
    }

    pub fn get(&self, stage: &str, name: &str) -> Result<&Source> {
        match self.list.iter().position(|s| s.name() == name) {
            Some(i) => Ok(&self.list[i]),
            None => Err(self.unknown(stage, name)),
        }
    }

    pub fn get_mut(&mut self, stage: &str, name: &str) -> Result<&mut Source> {
        match self.list.iter().position(|s| s.name() == name) {
            Some(i) => Ok(&mut self.list[i]),
            None => Err(self.unknown(stage, name)),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.list.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.list.iter()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Same sources with every binding dropped
    pub fn disconnected(&self) -> Self {
        Self {
            list: self.list.iter().map(Source::disconnected).collect(),
        }
    }

    fn unknown(&self, stage: &str, name: &str) -> PipeError {
        PipeError::UnknownSource {
            stage: stage.to_string(),
            source_name: name.to_string(),
            available: self.names(),
        }
    }
}

impl FromIterator<Source> for Sources {
    /// Later sources replace earlier ones of the same name
    fn from_iter<I: IntoIterator<Item = Source>>(iter: I) -> Self {
        let mut sources = Sources::new();
        for source in iter {
            match sources.list.iter().position(|s| s.name() == source.name()) {
                Some(i) => sources.list[i] = source,
                None => sources.list.push(source),
            }
        }
        sources
    }
}
