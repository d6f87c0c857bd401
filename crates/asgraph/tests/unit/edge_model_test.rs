//! Unit tests for typed edges, ownership and the reverse-edge index.

use asgraph::schema::demo;
use asgraph::{EdgeSlot, Factory, GraphError};
use pretty_assertions::assert_eq;

#[test]
fn test_ownership_is_unique() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let func = f.create(js.function).unwrap();
    let other = f.create(js.function).unwrap();
    let param = f.create(js.identifier).unwrap();
    f.add_edge(func, js.function_params, param).unwrap();

    let err = f.add_edge(other, js.function_params, param).unwrap_err();
    assert!(matches!(err, GraphError::AlreadyOwned { node_id, parent } if node_id == param && parent == func));
    assert_eq!(f.edge_targets(func, js.function_params), vec![param]);
    assert!(f.edge_targets(other, js.function_params).is_empty());
}

#[test]
fn test_association_edges_do_not_own() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let var = f.create(js.variable_declaration).unwrap();
    let a = f.create(js.identifier).unwrap();
    let b = f.create(js.identifier).unwrap();
    f.set_edge(a, js.identifier_refers_to, var).unwrap();
    f.set_edge(b, js.identifier_refers_to, var).unwrap();
    assert!(f.is_individual(var));
}

#[test]
fn test_capability_edges_available_on_every_kind() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let comment = f.create(js.comment).unwrap();
    for kind in [js.identifier, js.literal, js.function, js.return_statement] {
        let node = f.create(kind).unwrap();
        f.add_edge(node, js.commentable_comments, comment).unwrap();
    }
    f.enable_reverse_edges(None);
    assert_eq!(
        f.reverse_edges().unwrap().count(comment, js.commentable_comments).unwrap(),
        4
    );
}

#[test]
fn test_reverse_index_tracks_every_mutation() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    f.enable_reverse_edges(None);

    let func = f.create(js.function).unwrap();
    let p1 = f.create(js.identifier).unwrap();
    let p2 = f.create(js.identifier).unwrap();
    f.add_edge(func, js.function_params, p1).unwrap();
    f.add_edge(func, js.function_params, p2).unwrap();
    let sources: Vec<_> = f.reverse_query(p2, js.function_params).unwrap().collect();
    assert_eq!(sources, vec![func]);

    f.remove_edge_at(func, js.function_params, 0).unwrap();
    assert_eq!(f.reverse_query(p1, js.function_params).unwrap().count(), 0);
    f.clear_edge(func, js.function_params).unwrap();
    assert_eq!(f.reverse_query(p2, js.function_params).unwrap().count(), 0);
    assert!(f.reverse_edges().unwrap().existing_edges(p2).unwrap().is_empty());
}

#[test]
fn test_reverse_query_is_restartable() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let var = f.create(js.variable_declaration).unwrap();
    let a = f.create(js.identifier).unwrap();
    let b = f.create(js.identifier).unwrap();
    f.set_edge(a, js.identifier_refers_to, var).unwrap();
    f.set_edge(b, js.identifier_refers_to, var).unwrap();
    f.enable_reverse_edges(None);

    let query = f.reverse_query(var, js.identifier_refers_to).unwrap();
    let first: Vec<_> = query.clone().collect();
    let second: Vec<_> = query.collect();
    assert_eq!(first, vec![a, b]);
    assert_eq!(first, second);
}

#[test]
fn test_reverse_query_hides_filtered_sources() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let var = f.create(js.variable_declaration).unwrap();
    let a = f.create(js.identifier).unwrap();
    let b = f.create(js.identifier).unwrap();
    f.set_edge(a, js.identifier_refers_to, var).unwrap();
    f.set_edge(b, js.identifier_refers_to, var).unwrap();
    f.enable_reverse_edges(None);
    f.set_filtered(a, true).unwrap();

    let sources: Vec<_> = f.reverse_query(var, js.identifier_refers_to).unwrap().collect();
    assert_eq!(sources, vec![b]);
}

#[test]
fn test_destroy_leaves_inbound_edges_dangling() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let var = f.create(js.variable_declaration).unwrap();
    let ident = f.create(js.identifier).unwrap();
    f.set_edge(ident, js.identifier_refers_to, var).unwrap();

    f.destroy(var).unwrap();
    assert_eq!(f.edge(ident, js.identifier_refers_to), None);
    assert_eq!(
        f.edge_slot(ident, js.identifier_refers_to).unwrap(),
        &EdgeSlot::Single(var)
    );
}

#[test]
fn test_destroy_this_node_only_orphans_children() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let bin = f.create(js.binary_expression).unwrap();
    let left = f.create(js.identifier).unwrap();
    let right = f.create(js.literal).unwrap();
    f.set_edge(bin, js.binary_expression_left, left).unwrap();
    f.set_edge(bin, js.binary_expression_right, right).unwrap();

    f.destroy_this_node_only(bin).unwrap();
    assert!(!f.exists(bin));
    assert!(f.is_individual(left));
    assert!(f.is_individual(right));
}

#[test]
fn test_destroy_removes_owned_subtree() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let root = f.root().unwrap();
    let ret = f.create(js.return_statement).unwrap();
    let bin = f.create(js.binary_expression).unwrap();
    let left = f.create(js.identifier).unwrap();
    f.add_edge(root, js.program_body, ret).unwrap();
    f.set_edge(ret, js.return_statement_expression, bin).unwrap();
    f.set_edge(bin, js.binary_expression_left, left).unwrap();

    f.destroy(ret).unwrap();
    assert!(!f.exists(ret) && !f.exists(bin) && !f.exists(left));
    assert!(f.edge_targets(root, js.program_body).is_empty());
    assert_eq!(f.len(), 1);
}
