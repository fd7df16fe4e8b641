//! Property tests for the composition guarantees

use dalio::prelude::*;
use dalio::application::graphers::coord_source;
use dalio::options::kwargs;
use polars::prelude::*;
use proptest::prelude::*;
use serde_json::json;

fn table(a: &[i64], b: &[i64]) -> DataFrame {
    df!("a" => a, "b" => b).unwrap()
}

fn columns() -> impl Strategy<Value = (Vec<i64>, Vec<i64>)> {
    (1usize..40).prop_flat_map(|n| {
        (
            prop::collection::vec(-20i64..20, n),
            prop::collection::vec(-20i64..20, n),
        )
    })
}

proptest! {
    #[test]
    fn test_resolution_never_changes_values((a, b) in columns()) {
        let df = table(&a, &b);
        let mut source = Source::new(DATA_IN)
            .with_desc(IsTabular)
            .with_desc(HasColumns::new(["a", "b"]));
        source.bind(Binding::literal(df.clone()));

        let value = source
            .resolve("Stage", &mut Graph::new(), &RunOptions::new())
            .unwrap();
        prop_assert_eq!(value, Value::Frame(df));
    }

    #[test]
    fn test_copy_runs_identically((a, b) in columns(), dropped in -20i64..20, threshold in 1usize..4) {
        let mut graph = Graph::new();
        let line = PipeLine::builder(&mut graph)
            .pipe(ValDrop::new([dropped]).on(["a"]))
            .pipe(FreqDrop::new(threshold))
            .source(Binding::literal(table(&a, &b)))
            .build()
            .unwrap();
        let original = line.run(&mut graph, &RunOptions::new()).unwrap();

        let copy = line.copy(&mut graph).unwrap();
        copy.bind_source(&mut graph, Binding::literal(table(&a, &b))).unwrap();
        prop_assert_eq!(copy.run(&mut graph, &RunOptions::new()).unwrap(), original);
    }

    #[test]
    fn test_chain_matches_manual_wiring((a, b) in columns(), keep in prop::collection::vec(-20i64..20, 1..5)) {
        let mut graph = Graph::new();
        let line = PipeLine::builder(&mut graph)
            .pipe(ValKeep::new(keep.clone()).on(["b"]))
            .pipe(ColRename::new([("a", "x")]))
            .source(Binding::literal(table(&a, &b)))
            .build()
            .unwrap();
        let chained = line.run(&mut graph, &RunOptions::new()).unwrap();

        let first = graph.add_pipe(ValKeep::new(keep).on(["b"]));
        let second = graph.add_pipe(ColRename::new([("a", "x")]));
        graph.bind_primary(first, Binding::literal(table(&a, &b))).unwrap();
        graph.bind_primary(second, Binding::node(first)).unwrap();
        prop_assert_eq!(graph.run(second, &RunOptions::new()).unwrap(), chained);
    }

    #[test]
    fn test_piece_round_trip(row in 0usize..3, col in 0usize..3, kind in 0usize..5, alpha in 0.0f64..=1.0) {
        let mut grapher = MultiGrapher::new(3, 3);
        let name = PlotKind::ALL[kind].as_str();
        let kw = kwargs(json!({"alpha": alpha}));
        grapher.set_piece((row, col), name, vec![], kw.clone()).unwrap();

        let built = grapher.build_model(Value::Empty, &(row, col)).unwrap();
        prop_assert_eq!(built.algorithm, Some(PlotKind::ALL[kind]));
        prop_assert_eq!(built.kwargs, kw);
    }

    #[test]
    fn test_undeclared_key_always_rejected(row in 2usize..10, name in ".*") {
        let mut grapher = MultiGrapher::new(2, 2);
        let err = grapher.set_piece((row, 0), &name, vec![], Default::default()).err().unwrap();
        let unknown_key = matches!(err, PipeError::UnknownPieceKey { .. });
        prop_assert!(unknown_key, "unexpected error: {}", err);
    }

    #[test]
    fn test_fan_out_order_is_row_major(rows in 1usize..4, cols in 1usize..4) {
        let mut graph = Graph::new();
        let node = graph.add_application(MultiGrapher::new(rows, cols));
        for r in (0..rows).rev() {
            for c in (0..cols).rev() {
                graph
                    .bind(node, &coord_source((r, c)), Binding::literal(table(&[1], &[2])))
                    .unwrap();
            }
        }

        let value = graph.run(node, &RunOptions::new()).unwrap();
        let coords = value.as_figure().unwrap().coords();
        let mut sorted = coords.clone();
        sorted.sort();
        prop_assert_eq!(coords.len(), rows * cols);
        prop_assert_eq!(coords, sorted);
    }
}
