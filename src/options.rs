//! Run-time options passed through every pull
//!
//! The options map is open: stages read the keys they recognize and leave
//! everything else untouched for whoever consumes the value next.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Style options handed to a figure
pub type GraphOpts = Map<String, JsonValue>;

/// Keyword arguments attached to a piece
pub type Kwargs = Map<String, JsonValue>;

pub const GRAPH_OPTS: &str = "graph_opts";
pub const DATA_LABEL: &str = "data_label";
pub const FORECAST_LABEL: &str = "forecast_label";

/// Options map accepted by `run` and `transform`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunOptions {
    entries: Map<String, JsonValue>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option, replacing any previous value
    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Set one entry of the `graph_opts` object
    pub fn with_graph_opt(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        let opts = self
            .entries
            .entry(GRAPH_OPTS.to_string())
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if !opts.is_object() {
            *opts = JsonValue::Object(Map::new());
        }
        if let JsonValue::Object(map) = opts {
            map.insert(key.into(), value.into());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.entries.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|v| v.as_str())
    }

    /// Copy of the `graph_opts` object, empty when absent
    pub fn graph_opts(&self) -> GraphOpts {
        match self.entries.get(GRAPH_OPTS) {
            Some(JsonValue::Object(map)) => map.clone(),
            _ => GraphOpts::new(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Keyword arguments from a JSON object; anything else yields an empty map
pub fn kwargs(value: JsonValue) -> Kwargs {
    match value {
        JsonValue::Object(map) => map,
        _ => Kwargs::new(),
    }
}

/// Layer `overrides` on top of `base`
pub fn merge_opts(base: &GraphOpts, overrides: &GraphOpts) -> GraphOpts {
    let mut merged = base.clone();
    for (k, v) in overrides {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_graph_opts_accumulate() {
        let opts = RunOptions::new()
            .with_graph_opt("color", "red")
            .with_graph_opt("alpha", 0.5)
            .with(DATA_LABEL, "Prices");

        let graph = opts.graph_opts();
        assert_eq!(graph.get("color"), Some(&json!("red")));
        assert_eq!(graph.get("alpha"), Some(&json!(0.5)));
        assert_eq!(opts.get_str(DATA_LABEL), Some("Prices"));
    }

    #[test]
    fn test_unknown_keys_survive() {
        let opts = RunOptions::new().with("custom_flag", true);
        assert_eq!(opts.get("custom_flag"), Some(&json!(true)));
        assert!(opts.graph_opts().is_empty());
    }

    #[test]
    fn test_kwargs_from_json() {
        let kw = kwargs(json!({"x": "date", "alpha": 0.2}));
        assert_eq!(kw.len(), 2);
        assert!(kwargs(json!([1, 2])).is_empty());
    }

    #[test]
    fn test_merge_prefers_overrides() {
        let mut base = GraphOpts::new();
        base.insert("color".into(), json!("red"));
        base.insert("alpha".into(), json!(1.0));
        let mut over = GraphOpts::new();
        over.insert("alpha".into(), json!(0.3));

        let merged = merge_opts(&base, &over);
        assert_eq!(merged.get("color"), Some(&json!("red")));
        assert_eq!(merged.get("alpha"), Some(&json!(0.3)));
    }
}
