//! Unit tests for node filtering and the filter sidecar.

use asgraph::schema::demo;
use asgraph::{filter_path_for, Advisory, Factory};
use std::fs::File;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn set_mtime(path: &Path, time: SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

#[test]
fn test_filter_is_non_destructive() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let ret = f.create(js.return_statement).unwrap();
    let lit = f.create(js.literal).unwrap();
    f.set_edge(ret, js.return_statement_expression, lit).unwrap();

    f.set_filtered(lit, true).unwrap();
    assert_eq!(f.edge(ret, js.return_statement_expression), None);
    assert!(!f.iter().any(|n| n.id() == lit));
    assert_eq!(f.parent(lit), Some(ret));

    f.filter_off();
    assert_eq!(f.edge(ret, js.return_statement_expression), Some(lit));
    f.filter_on();

    f.set_filtered(lit, false).unwrap();
    assert_eq!(f.edge(ret, js.return_statement_expression), Some(lit));
}

#[test]
fn test_unfiltered_by_default() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let ident = f.create(js.identifier).unwrap();
    assert!(!f.is_filtered(ident));
    assert!(f.set_filtered(9999, true).is_err());
}

#[test]
fn test_sidecar_round_trip() {
    let dir = TempDir::new().unwrap();
    let graph = dir.path().join("app.jsi");
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let root = f.root().unwrap();
    let ret = f.create(js.return_statement).unwrap();
    f.add_edge(root, js.program_body, ret).unwrap();
    f.filter_subtree(ret).unwrap();
    f.save_to_path(&graph).unwrap();
    f.save_filter(filter_path_for(&graph)).unwrap();

    let now = SystemTime::now();
    set_mtime(&graph, now - Duration::from_secs(60));
    set_mtime(&filter_path_for(&graph), now);

    let mut g = Factory::new(js.schema.clone());
    g.load_from_path(&graph).unwrap();
    assert_eq!(g.load_filter_for_graph(&graph).unwrap(), None);
    assert!(g.is_filtered(ret));
    assert!(!g.is_filtered(root));
}

#[test]
fn test_stale_sidecar_is_skipped() {
    let dir = TempDir::new().unwrap();
    let graph = dir.path().join("app.jsi");
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let ident = f.create(js.identifier).unwrap();
    f.set_filtered(ident, true).unwrap();
    f.save_filter(filter_path_for(&graph)).unwrap();
    f.save_to_path(&graph).unwrap();

    let now = SystemTime::now();
    set_mtime(&filter_path_for(&graph), now - Duration::from_secs(60));
    set_mtime(&graph, now);

    let mut g = Factory::new(js.schema.clone());
    g.load_from_path(&graph).unwrap();
    let advisory = g.load_filter_for_graph(&graph).unwrap();
    assert!(matches!(advisory, Some(Advisory::StaleFilter { .. })));
    assert!(!g.is_filtered(ident));
}

#[test]
fn test_missing_sidecar_is_advisory() {
    let dir = TempDir::new().unwrap();
    let graph = dir.path().join("app.jsi");
    let js = demo::javascript().unwrap();
    let f = Factory::new(js.schema.clone());
    f.save_to_path(&graph).unwrap();

    let mut g = Factory::new(js.schema.clone());
    g.load_from_path(&graph).unwrap();
    let advisory = g.load_filter_for_graph(&graph).unwrap();
    assert_eq!(
        advisory,
        Some(Advisory::MissingFilter {
            filter: dir.path().join("app.fjsi")
        })
    );
}

#[test]
fn test_filter_ids_for_destroyed_nodes_are_dropped() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let a = f.create(js.identifier).unwrap();
    let b = f.create(js.identifier).unwrap();
    f.set_filtered(a, true).unwrap();
    f.set_filtered(b, true).unwrap();
    let mut bytes = Vec::new();
    f.write_filter(&mut bytes).unwrap();

    f.destroy(a).unwrap();
    f.read_filter(&mut bytes.as_slice()).unwrap();
    assert_eq!(f.filtered_count(), 1);
    assert!(f.is_filtered(b));
}
