//! Property-based tests for interning, reverse-edge consistency and round trip.

use asgraph::schema::demo;
use asgraph::{EdgeSlot, Factory, StrTable};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Add { source: usize, target: usize },
    Remove { source: usize, target: usize },
    Clear { source: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..8usize, 0..8usize).prop_map(|(source, target)| Op::Add { source, target }),
        2 => (0..8usize, 0..8usize).prop_map(|(source, target)| Op::Remove { source, target }),
        1 => (0..8usize).prop_map(|source| Op::Clear { source }),
    ]
}

proptest! {
    #[test]
    fn prop_intern_resolve_identity(texts in prop::collection::vec("[a-zA-Z0-9_]{0,12}", 1..64)) {
        let mut table = StrTable::new(7);
        let keys: Vec<_> = texts.iter().map(|t| table.intern(t)).collect();
        for (text, key) in texts.iter().zip(&keys) {
            prop_assert_eq!(table.resolve(*key), text.as_str());
            prop_assert_eq!(table.intern(text), *key);
        }
    }

    #[test]
    fn prop_reverse_index_matches_forward_edges(ops in prop::collection::vec(op(), 0..64)) {
        let js = demo::javascript().unwrap();
        let mut f = Factory::new(js.schema.clone());
        f.enable_reverse_edges(None);
        let functions: Vec<_> = (0..8).map(|_| f.create(js.function).unwrap()).collect();
        let comments: Vec<_> = (0..8).map(|_| f.create(js.comment).unwrap()).collect();

        for op in ops {
            // Individual operations may fail (e.g. removing an absent edge);
            // only the index consistency afterwards matters.
            let _ = match op {
                Op::Add { source, target } => {
                    f.add_edge(functions[source], js.commentable_comments, comments[target])
                }
                Op::Remove { source, target } => {
                    f.remove_edge(functions[source], js.commentable_comments, comments[target])
                }
                Op::Clear { source } => f.clear_edge(functions[source], js.commentable_comments),
            };
        }

        for &comment in &comments {
            let mut expected: Vec<_> = functions
                .iter()
                .flat_map(|&func| {
                    let slot = f.edge_slot(func, js.commentable_comments).unwrap();
                    let hits = match slot {
                        EdgeSlot::Multi(targets) => targets.iter().filter(|&&t| t == comment).count(),
                        EdgeSlot::Single(_) => 0,
                    };
                    std::iter::repeat(func).take(hits)
                })
                .collect();
            let mut actual: Vec<_> = f
                .reverse_query(comment, js.commentable_comments)
                .unwrap()
                .collect();
            expected.sort_unstable();
            actual.sort_unstable();
            prop_assert_eq!(actual, expected);
        }
    }

    #[test]
    fn prop_round_trip_preserves_names(names in prop::collection::vec("[a-z]{1,10}", 1..32)) {
        let js = demo::javascript().unwrap();
        let mut f = Factory::new(js.schema.clone());
        let root = f.root().unwrap();
        let mut ids = Vec::new();
        for name in &names {
            let func = f.create(js.function).unwrap();
            f.set_str(func, js.name, name).unwrap();
            f.add_edge(root, js.program_body, func).unwrap();
            ids.push(func);
        }

        let mut bytes = Vec::new();
        f.save(&mut bytes).unwrap();
        let mut g = Factory::new(js.schema.clone());
        g.load(&mut bytes.as_slice()).unwrap();

        prop_assert_eq!(g.edge_targets(root, js.program_body), ids.clone());
        for (name, id) in names.iter().zip(&ids) {
            prop_assert_eq!(g.str_attr(*id, js.name).unwrap(), name.as_str());
        }
    }
}
