//! Tests for error classification and message formatting
//!
//! Every error must name the stage and source or piece it came from so a
//! failing pipeline can be debugged from the message alone.

use dalio::error::{ErrorKind, PipeError};
use dalio::prelude::*;
use polars::prelude::*;

#[cfg(test)]
mod configuration_errors {
    use super::*;

    #[test]
    fn test_unbound_source() {
        let err = PipeError::UnboundSource {
            stage: "ColSelect#0".to_string(),
            source_name: "data_in".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("ColSelect#0"));
        assert!(msg.contains("data_in"));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_unknown_piece_key_lists_valid_keys() {
        let err = PipeError::UnknownPieceKey {
            key: "(3, 0)".to_string(),
            valid: vec!["(0, 0)".to_string(), "(0, 1)".to_string()],
        };

        let msg = err.to_string();
        assert!(msg.contains("(3, 0)"));
        assert!(msg.contains("(0, 1)"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_invalid_piece_name() {
        let err = PipeError::InvalidPieceName {
            key: "(0, 0)".to_string(),
            name: "pie".to_string(),
            expected: vec!["line", "scatter"],
        };

        let msg = err.to_string();
        assert!(msg.contains("pie"));
        assert!(msg.contains("scatter"));
    }

    #[test]
    fn test_cycle_detected() {
        let err = PipeError::CycleDetected {
            stage: "ColRename#2".to_string(),
            source_name: "data_in".to_string(),
            node: 0,
        };

        assert!(err.to_string().contains("ColRename#2.data_in"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_output_unset() {
        let err = PipeError::OutputUnset {
            stage: "Grapher#1".to_string(),
            output: "data_out".to_string(),
        };
        assert!(err.to_string().contains("not been produced"));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_config_parse_error_from_toml() {
        let err = DalioConfig::from_toml_str("[graph]\ndefault_kind = 3").unwrap_err();
        assert!(matches!(err, PipeError::TomlError(_)));
    }
}

#[cfg(test)]
mod validation_errors {
    use super::*;

    #[test]
    fn test_validation_message() {
        let err = PipeError::Validation {
            stage: "ValDrop#4".to_string(),
            source_name: "data_in".to_string(),
            expected: "columns [a, b] (missing [b])".to_string(),
            observed: "DataFrame[3x1: a]".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("ValDrop#4.data_in"));
        assert!(msg.contains("missing [b]"));
        assert!(msg.contains("DataFrame[3x1: a]"));
        assert!(err.is_validation());
    }

    #[test]
    fn test_validation_raised_by_graph_names_origin() {
        let mut graph = Graph::new();
        let select = graph.add_pipe(ColSelect::new(["a", "b"]));
        let table = df!("a" => &[1i64, 2, 3]).unwrap();
        graph.bind_primary(select, Binding::literal(table)).unwrap();

        match graph.run(select, &RunOptions::new()).unwrap_err() {
            PipeError::Validation {
                stage,
                source_name,
                expected,
                observed,
            } => {
                assert_eq!(stage, "ColSelect#0");
                assert_eq!(source_name, DATA_IN);
                assert!(expected.contains("missing [b]"));
                assert_eq!(observed, "DataFrame[3x1: a]");
            }
            other => panic!("expected a validation error, got {other}"),
        }
    }
}

#[cfg(test)]
mod computation_errors {
    use super::*;

    #[test]
    fn test_polars_errors_convert() {
        let df = df!("a" => &[1i64]).unwrap();
        let err: PipeError = df.column("zzz").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Computation);
    }

    #[test]
    fn test_io_errors_convert() {
        let err: PipeError = std::io::Error::new(std::io::ErrorKind::NotFound, "prices.csv").into();
        assert!(err.to_string().contains("prices.csv"));
        assert_eq!(err.kind(), ErrorKind::Computation);
    }

    #[test]
    fn test_missing_csv_is_computation() {
        let mut graph = Graph::new();
        let node = graph.add_pipe(ColSelect::new(["close"]));
        graph
            .bind_primary(node, Binding::provider(CsvProvider::new("/nonexistent/prices.csv")))
            .unwrap();

        let err = graph.run(node, &RunOptions::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Computation);
    }
}
