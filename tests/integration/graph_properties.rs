//! Property tests for the head-node resolution protocol.

use kots_render::resolver::DepGraph;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn node(i: usize) -> String {
    format!("item{i}")
}

/// Acyclic graphs: edges only point from a node to lower-numbered nodes.
fn acyclic_graph() -> impl Strategy<Value = DepGraph> {
    (1usize..12)
        .prop_flat_map(|n| (Just(n), prop::collection::vec((0..n, 0..n), 0..30)))
        .prop_map(|(n, edges)| {
            let mut graph = DepGraph::new();
            for i in 0..n {
                graph.add_node(&node(i));
            }
            for (a, b) in edges {
                if a > b {
                    graph.add_dep(&node(a), &node(b));
                }
            }
            graph
        })
}

proptest! {
    #[test]
    fn resolution_visits_every_node_once(graph in acyclic_graph()) {
        let total = graph.len();
        let mut graph = graph;
        let mut visited = Vec::new();

        loop {
            let heads = graph.get_head_nodes().unwrap();
            if heads.is_empty() {
                break;
            }
            for head in &heads {
                prop_assert!(graph.dependencies_of(head).is_some_and(BTreeSet::is_empty));
            }
            for head in heads {
                prop_assert!(graph.resolve_dep(&head));
                visited.push(head);
            }
        }

        prop_assert!(graph.is_empty());
        prop_assert_eq!(visited.len(), total);
        let unique: BTreeSet<_> = visited.iter().collect();
        prop_assert_eq!(unique.len(), total);
        prop_assert_eq!(graph.resolved(), visited.as_slice());
    }

    #[test]
    fn cycle_error_names_cycle_members(graph in acyclic_graph(), len in 2usize..5) {
        let mut graph = graph;
        let cycle: Vec<String> = (0..len).map(|i| format!("loop{i}")).collect();
        for i in 0..len {
            graph.add_dep(&cycle[i], &cycle[(i + 1) % len]);
        }

        let err = loop {
            match graph.get_head_nodes() {
                Ok(heads) => {
                    prop_assert!(!heads.is_empty(), "cycle nodes can never become heads");
                    for head in heads {
                        prop_assert!(!head.starts_with("loop"));
                        graph.resolve_dep(&head);
                    }
                }
                Err(err) => break err,
            }
        };

        let message = err.to_string();
        for name in &cycle {
            let expected = format!("{name:?} depends on");
            prop_assert!(message.contains(&expected), "{} missing from {}", name, message);
        }
    }

    #[test]
    fn copy_is_independent(graph in acyclic_graph()) {
        let snapshot = graph.clone();
        let mut original = graph;

        let heads = original.get_head_nodes().unwrap();
        for head in &heads {
            original.resolve_dep(head);
        }

        prop_assert_eq!(snapshot.len(), original.len() + heads.len());
        for head in &heads {
            prop_assert!(snapshot.contains(head));
            prop_assert!(!original.contains(head));
        }
    }
}
