//! Error types for dalio

use thiserror::Error;

/// Broad class an error belongs to.
///
/// Configuration errors are raised while wiring stages, validation errors
/// while resolving a source, computation errors from inside a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    Computation,
}

/// Main error type for dalio
#[derive(Error, Debug)]
pub enum PipeError {
    #[error("Unbound source '{source_name}' on {stage}")]
    UnboundSource { stage: String, source_name: String },

    #[error("Unknown source '{source_name}' on {stage}, select one of {available:?}")]
    UnknownSource {
        stage: String,
        source_name: String,
        available: Vec<String>,
    },

    #[error("Unknown output '{output}' on {stage}, select one of {available:?}")]
    UnknownOutput {
        stage: String,
        output: String,
        available: Vec<String>,
    },

    #[error("Output '{output}' of {stage} has not been produced yet")]
    OutputUnset { stage: String, output: String },

    #[error("Output '{output}' of {stage} is not a figure")]
    NotAFigure { stage: String, output: String },

    #[error("Invalid piece key {key}, select one of {valid:?}")]
    UnknownPieceKey { key: String, valid: Vec<String> },

    #[error("Invalid piece name '{name}' for key {key}: expected one of {expected:?}")]
    InvalidPieceName {
        key: String,
        name: String,
        expected: Vec<&'static str>,
    },

    #[error("Unknown node {0}")]
    UnknownNode(usize),

    #[error("Binding {stage}.{source_name} would create a cycle through node {node}")]
    CycleDetected {
        stage: String,
        source_name: String,
        node: usize,
    },

    #[error("Cycle detected while pulling {stage} (node {node})")]
    CyclicPull { stage: String, node: usize },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation failed on {stage}.{source_name}: expected {expected}, observed {observed}")]
    Validation {
        stage: String,
        source_name: String,
        expected: String,
        observed: String,
    },

    #[error("Computation error in {stage}: {message}")]
    Computation { stage: String, message: String },

    #[error("Polars error: {0}")]
    PolarsError(#[from] polars::prelude::PolarsError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl PipeError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipeError::Validation { .. } => ErrorKind::Validation,
            PipeError::Computation { .. }
            | PipeError::PolarsError(_)
            | PipeError::IoError(_)
            | PipeError::SerdeError(_) => ErrorKind::Computation,
            _ => ErrorKind::Configuration,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    pub(crate) fn computation(stage: impl Into<String>, message: impl Into<String>) -> Self {
        PipeError::Computation {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for dalio operations
pub type Result<T> = std::result::Result<T, PipeError>;
