//! Framework configuration loaded from TOML
//!
//! ```toml
//! [data]
//! time_column = "timestamp"
//!
//! [graph]
//! default_kind = "scatter"
//!
//! [logging]
//! level = "debug"
//! ```

use crate::error::Result;
use crate::output::PlotKind;
use crate::types::DEFAULT_TIME_COLUMN;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DalioConfig {
    pub data: DataConfig,
    pub graph: GraphConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Column treated as the time index of a table
    pub time_column: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            time_column: DEFAULT_TIME_COLUMN.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Kind used when a plot call does not name one
    pub default_kind: PlotKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter, overridden by `RUST_LOG`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl DalioConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}

/// Install `env_logger` with the configured default filter.
///
/// Returns false when a logger was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.level))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = DalioConfig::default();
        assert_eq!(config.data.time_column, "date");
        assert_eq!(config.graph.default_kind, PlotKind::Line);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml() {
        let config = DalioConfig::from_toml_str(
            r#"
            [graph]
            default_kind = "scatter"
            "#,
        )
        .unwrap();

        assert_eq!(config.graph.default_kind, PlotKind::Scatter);
        assert_eq!(config.data.time_column, "date");
    }

    #[test]
    fn test_bad_kind_rejected() {
        let err = DalioConfig::from_toml_str("[graph]\ndefault_kind = \"pie\"").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[data]\ntime_column = \"timestamp\"").unwrap();

        let config = DalioConfig::from_path(file.path()).unwrap();
        assert_eq!(config.data.time_column, "timestamp");
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging(&LoggingConfig::default());
        assert!(!init_logging(&LoggingConfig::default()));
    }
}
