//! Unit tests for structural hashing and similarity scoring.

use asgraph::algorithms::{node_hash, similarity_score};
use asgraph::schema::demo;
use asgraph::{Factory, SimilarityConfig};
use std::collections::HashSet;

#[test]
fn test_equal_nodes_hash_equal_across_factories() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let mut g = Factory::new(js.schema.clone());
    let a = f.create(js.literal).unwrap();
    let b = g.create(js.literal).unwrap();
    for (factory, id) in [(&mut f, a), (&mut g, b)] {
        factory.set_str(id, js.raw, "42").unwrap();
        factory.set_attr(id, js.value, 42.0f64).unwrap();
    }
    assert_eq!(
        node_hash(&f, a, &mut HashSet::new()).unwrap(),
        node_hash(&g, b, &mut HashSet::new()).unwrap()
    );

    g.set_attr(b, js.value, 43.0f64).unwrap();
    assert_ne!(
        node_hash(&f, a, &mut HashSet::new()).unwrap(),
        node_hash(&g, b, &mut HashSet::new()).unwrap()
    );
}

#[test]
fn test_kind_participates_in_hash() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let ret = f.create(js.return_statement).unwrap();
    let prog = f.root().unwrap();
    f.set_attr(prog, js.source_type, asgraph::AttrValue::Enum(0)).unwrap();
    assert_ne!(
        node_hash(&f, ret, &mut HashSet::new()).unwrap(),
        node_hash(&f, prog, &mut HashSet::new()).unwrap()
    );
}

#[test]
fn test_visited_node_hashes_to_zero() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let ident = f.create(js.identifier).unwrap();
    let mut visited = HashSet::from([ident]);
    assert_eq!(node_hash(&f, ident, &mut visited).unwrap(), 0);
}

#[test]
fn test_similarity_across_factories() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let mut g = Factory::new(js.schema.clone());
    let a = f.create(js.function).unwrap();
    let b = g.create(js.function).unwrap();
    f.set_str(a, js.name, "render").unwrap();
    g.set_str(b, js.name, "render").unwrap();
    f.set_attr(a, js.is_async, true).unwrap();

    let config = SimilarityConfig::default();
    let score = similarity_score(&f, a, &g, b, &config).unwrap();
    // Four attributes (name, isAsync, isGenerator, paramCount), three equal.
    let expected = 3.0 / (4.0 / (1.0 - config.minimum)) + config.minimum;
    assert!((score - expected).abs() < 1e-9);
}

#[test]
fn test_similarity_missing_node() {
    let js = demo::javascript().unwrap();
    let f = Factory::new(js.schema.clone());
    let root = f.root().unwrap();
    assert!(similarity_score(&f, root, &f, 4242, &SimilarityConfig::default()).is_err());
}
