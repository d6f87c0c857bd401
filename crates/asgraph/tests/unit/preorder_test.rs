//! Unit tests for the pre-order walk.

use asgraph::algorithms::{Preorder, Visitor};
use asgraph::schema::demo;
use asgraph::{EdgeKind, Factory, Node, NodeId, PreorderConfig};
use std::ops::ControlFlow;

#[derive(Default)]
struct Collect {
    began: bool,
    finished: bool,
    entered: Vec<NodeId>,
    edges: Vec<(NodeId, EdgeKind, NodeId)>,
    skip_edge: Option<EdgeKind>,
}

impl Visitor for Collect {
    fn begin(&mut self, _factory: &Factory) {
        self.began = true;
    }

    fn visit(&mut self, _factory: &Factory, node: &Node) -> ControlFlow<()> {
        self.entered.push(node.id());
        ControlFlow::Continue(())
    }

    fn visit_edge(&mut self, _factory: &Factory, source: NodeId, edge: EdgeKind, target: NodeId) -> bool {
        self.edges.push((source, edge, target));
        self.skip_edge != Some(edge)
    }

    fn finish(&mut self, _factory: &Factory) {
        self.finished = true;
    }
}

#[test]
fn test_children_follow_schema_order() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let bin = f.create(js.binary_expression).unwrap();
    let right = f.create(js.literal).unwrap();
    let left = f.create(js.identifier).unwrap();
    // Set in reverse; the walk still goes Left before Right.
    f.set_edge(bin, js.binary_expression_right, right).unwrap();
    f.set_edge(bin, js.binary_expression_left, left).unwrap();

    let mut collect = Collect::default();
    Preorder::default().run_from(&f, bin, &mut collect).unwrap();
    assert!(collect.began && collect.finished);
    assert_eq!(collect.entered, vec![bin, left, right]);
    assert_eq!(
        collect.edges,
        vec![
            (bin, js.binary_expression_left, left),
            (bin, js.binary_expression_right, right)
        ]
    );
}

#[test]
fn test_declined_edge_skips_subtree() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let func = f.create(js.function).unwrap();
    let param = f.create(js.identifier).unwrap();
    let ret = f.create(js.return_statement).unwrap();
    f.add_edge(func, js.function_params, param).unwrap();
    f.add_edge(func, js.function_body, ret).unwrap();

    let mut collect = Collect {
        skip_edge: Some(js.function_params),
        ..Default::default()
    };
    Preorder::default().run_from(&f, func, &mut collect).unwrap();
    assert_eq!(collect.entered, vec![func, ret]);
}

#[test]
fn test_run_walks_every_individual() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let root = f.root().unwrap();
    let loose = f.create(js.identifier).unwrap();
    let comment = f.create(js.comment).unwrap();

    let mut collect = Collect::default();
    Preorder::default().run(&f, &mut collect).unwrap();
    assert_eq!(collect.entered, vec![root, loose, comment]);

    let mut collect = Collect::default();
    Preorder::new(PreorderConfig::unsafe_fast()).run(&f, &mut collect).unwrap();
    assert_eq!(collect.entered, vec![root, loose]);
}

#[test]
fn test_cross_edge_tree() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let func = f.create(js.function).unwrap();
    let var = f.create(js.variable_declaration).unwrap();
    let init = f.create(js.literal).unwrap();
    f.set_edge(var, js.variable_declaration_init, init).unwrap();
    f.add_edge(func, js.function_captures, var).unwrap();

    let mut collect = Collect::default();
    Preorder::default().run_from(&f, func, &mut collect).unwrap();
    assert_eq!(collect.entered, vec![func]);

    let config = PreorderConfig {
        visit_cross_edge_tree: true,
        ..Default::default()
    };
    let mut collect = Collect::default();
    Preorder::new(config).run_from(&f, func, &mut collect).unwrap();
    assert_eq!(collect.entered, vec![func, var, init]);
}

#[test]
fn test_deep_chain_does_not_overflow() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let top = f.create(js.binary_expression).unwrap();
    let mut current = top;
    for _ in 0..50_000 {
        let next = f.create(js.binary_expression).unwrap();
        f.set_edge(current, js.binary_expression_left, next).unwrap();
        current = next;
    }

    let mut collect = Collect::default();
    Preorder::new(PreorderConfig::unsafe_fast())
        .run_from(&f, top, &mut collect)
        .unwrap();
    assert_eq!(collect.entered.len(), 50_001);
}
