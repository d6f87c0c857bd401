//! Depth-first pre-order walk over the ownership tree.
//!
//! The walk follows owning edges in schema order: capability by capability,
//! each edge's targets in insertion order. It is iterative, so arbitrarily
//! deep trees are safe. Which nodes are reached beyond the plain ownership
//! tree is controlled by [`PreorderConfig`].

use crate::config::PreorderConfig;
use crate::error::{GraphError, Result};
use crate::graph::{Factory, Node, NodeId};
use crate::schema::EdgeKind;
use log::debug;
use std::collections::{BTreeSet, HashSet};
use std::ops::ControlFlow;

/// Callbacks invoked by [`Preorder`]. Every method has an empty default.
pub trait Visitor {
    /// Called once before the walk.
    fn begin(&mut self, _factory: &Factory) {}

    /// Called when a node is entered. Returning `Break` stops the walk.
    fn visit(&mut self, _factory: &Factory, _node: &Node) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// Called when a node is left, after its whole subtree.
    fn visit_end(&mut self, _factory: &Factory, _node: &Node) {}

    /// Called before descending from `source` into `target` through `edge`.
    /// Returning `false` skips the target's subtree.
    fn visit_edge(
        &mut self,
        _factory: &Factory,
        _source: NodeId,
        _edge: EdgeKind,
        _target: NodeId,
    ) -> bool {
        true
    }

    /// Called after the target's subtree, or right after
    /// [`visit_edge`](Self::visit_edge) if it declined.
    fn visit_edge_end(&mut self, _factory: &Factory, _source: NodeId, _edge: EdgeKind, _target: NodeId) {}

    /// Called once after the walk, also when a visitor stopped it early.
    fn finish(&mut self, _factory: &Factory) {}
}

enum Frame {
    Enter(NodeId),
    Exit(NodeId),
    Edge(NodeId, EdgeKind, NodeId),
    EdgeEnd(NodeId, EdgeKind, NodeId),
}

#[derive(Default)]
struct WalkState {
    visited: HashSet<NodeId>,
    used_specials: BTreeSet<NodeId>,
}

/// Pre-order traversal driver.
#[derive(Debug, Clone, Default)]
pub struct Preorder {
    config: PreorderConfig,
}

impl Preorder {
    /// Create a traversal with the given settings.
    pub fn new(config: PreorderConfig) -> Self {
        Self { config }
    }

    /// Create a traversal with the settings configured on `factory`.
    pub fn for_factory(factory: &Factory) -> Self {
        Self::new(factory.config().preorder.clone())
    }

    /// Traversal settings.
    pub fn config(&self) -> &PreorderConfig {
        &self.config
    }

    /// Walk every individual (parentless) node in id order, then the special
    /// nodes.
    ///
    /// Special individuals (comments, types) are not walked in the first
    /// phase. They are reached only through the special-node phase, so with
    /// `visit_special_nodes` off they are not visited at all.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotFound`] only if the factory is inconsistent.
    pub fn run<V: Visitor + ?Sized>(&self, factory: &Factory, visitor: &mut V) -> Result<()> {
        let guard;
        let factory: &Factory = if self.config.visit_filtered {
            guard = factory.suspend_filter();
            &*guard
        } else {
            factory
        };

        let schema = factory.schema();
        let mut state = WalkState::default();
        visitor.begin(factory);
        for id in factory.individuals() {
            let special = factory.get(id).is_ok_and(|n| schema.is_special(n.kind()));
            if special || state.visited.contains(&id) {
                continue;
            }
            if self.walk(factory, id, visitor, &mut state)?.is_break() {
                visitor.finish(factory);
                return Ok(());
            }
        }
        self.walk_specials(factory, visitor, &mut state)?;
        visitor.finish(factory);
        Ok(())
    }

    /// Walk the tree owned by `root`, then the special nodes.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotFound`] if `root` does not exist or is
    /// filtered while filtered nodes are not visited.
    pub fn run_from<V: Visitor + ?Sized>(
        &self,
        factory: &Factory,
        root: NodeId,
        visitor: &mut V,
    ) -> Result<()> {
        let guard;
        let factory: &Factory = if self.config.visit_filtered {
            guard = factory.suspend_filter();
            &*guard
        } else {
            factory
        };
        if !factory.is_visible(root) {
            return Err(GraphError::NotFound { node_id: root });
        }

        let mut state = WalkState::default();
        visitor.begin(factory);
        if self.walk(factory, root, visitor, &mut state)?.is_continue() {
            self.walk_specials(factory, visitor, &mut state)?;
        }
        visitor.finish(factory);
        Ok(())
    }

    fn walk_specials<V: Visitor + ?Sized>(
        &self,
        factory: &Factory,
        visitor: &mut V,
        state: &mut WalkState,
    ) -> Result<()> {
        if !self.config.visit_special_nodes {
            return Ok(());
        }
        let schema = factory.schema();
        let specials: Vec<NodeId> = if self.config.special_used_only {
            state.used_specials.iter().copied().collect()
        } else {
            factory
                .iter()
                .filter(|node| schema.is_special(node.kind()) && node.parent().is_none())
                .map(Node::id)
                .collect()
        };
        for id in specials {
            if state.visited.contains(&id) || !factory.is_visible(id) {
                continue;
            }
            if self.walk(factory, id, visitor, state)?.is_break() {
                break;
            }
        }
        Ok(())
    }

    fn walk<V: Visitor + ?Sized>(
        &self,
        factory: &Factory,
        root: NodeId,
        visitor: &mut V,
        state: &mut WalkState,
    ) -> Result<ControlFlow<()>> {
        let schema = factory.schema();
        let mut stack = vec![Frame::Enter(root)];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(id) => {
                    if !factory.is_visible(id) {
                        continue;
                    }
                    if !state.visited.insert(id) && self.config.safe_mode {
                        debug!("Preorder reached node {id} again; skipped");
                        continue;
                    }
                    let node = factory.get(id)?;
                    if visitor.visit(factory, node).is_break() {
                        return Ok(ControlFlow::Break(()));
                    }
                    stack.push(Frame::Exit(id));

                    let Some(layout) = schema.layout(node.kind()) else {
                        continue;
                    };
                    let mut children = Vec::new();
                    for (&edge, slot) in layout.edges.iter().zip(node.edge_slots()) {
                        let owning = schema.edge(edge).is_some_and(|def| def.is_owning());
                        for &target in slot.targets() {
                            if !factory.is_visible(target) {
                                continue;
                            }
                            if owning {
                                children.push((edge, target));
                                continue;
                            }
                            let target_kind = factory.get(target)?.kind();
                            if schema.is_special(target_kind) {
                                state.used_specials.insert(target);
                            } else if self.config.visit_cross_edge_tree
                                && !state.visited.contains(&target)
                            {
                                children.push((edge, target));
                            }
                        }
                    }
                    for (edge, target) in children.into_iter().rev() {
                        stack.push(Frame::EdgeEnd(id, edge, target));
                        stack.push(Frame::Edge(id, edge, target));
                    }
                }
                Frame::Exit(id) => {
                    visitor.visit_end(factory, factory.get(id)?);
                }
                Frame::Edge(source, edge, target) => {
                    if visitor.visit_edge(factory, source, edge, target) {
                        stack.push(Frame::Enter(target));
                    }
                }
                Frame::EdgeEnd(source, edge, target) => {
                    visitor.visit_edge_end(factory, source, edge, target);
                }
            }
        }
        Ok(ControlFlow::Continue(()))
    }
}
