//! Reverse-edge index: for each target node, which sources point at it.
//!
//! The index is built on demand by one full scan and then maintained
//! incrementally by every edge mutation while it is enabled. Queries against a
//! factory without an index fail with [`GraphError::ReverseEdgesDisabled`].

use super::factory::Factory;
use super::node::NodeId;
use crate::error::{GraphError, Result};
use crate::schema::{EdgeKind, NodeKind, Schema};
use log::info;
use std::collections::{BTreeMap, HashMap};

/// Decides which source node kinds are indexed.
pub type EdgeSelector = fn(&Schema, NodeKind) -> bool;

/// Target -> edge kind -> sources, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ReverseEdges {
    selector: Option<EdgeSelector>,
    entries: HashMap<NodeId, BTreeMap<EdgeKind, Vec<NodeId>>>,
}

impl ReverseEdges {
    fn build(factory: &Factory, selector: Option<EdgeSelector>) -> Self {
        let mut index = Self {
            selector,
            entries: HashMap::new(),
        };
        let schema = &factory.schema;
        for node in factory.nodes.iter().flatten() {
            if !index.selects(schema, node.kind()) {
                continue;
            }
            let Some(layout) = schema.layout(node.kind()) else {
                continue;
            };
            for (&edge, slot) in layout.edges.iter().zip(node.edge_slots()) {
                for &target in slot.targets() {
                    if factory.exists(target) {
                        index.push(target, node.id(), edge);
                    }
                }
            }
        }
        index
    }

    fn selects(&self, schema: &Schema, kind: NodeKind) -> bool {
        self.selector.map_or(true, |select| select(schema, kind))
    }

    fn push(&mut self, target: NodeId, source: NodeId, edge: EdgeKind) {
        self.entries
            .entry(target)
            .or_default()
            .entry(edge)
            .or_default()
            .push(source);
    }

    pub(crate) fn insert(
        &mut self,
        schema: &Schema,
        target: NodeId,
        source: NodeId,
        source_kind: NodeKind,
        edge: EdgeKind,
    ) {
        if self.selects(schema, source_kind) {
            self.push(target, source, edge);
        }
    }

    /// Remove one occurrence of `source` from `target`'s `edge` entry.
    pub(crate) fn remove(&mut self, target: NodeId, source: NodeId, edge: EdgeKind) -> bool {
        let Some(by_edge) = self.entries.get_mut(&target) else {
            return false;
        };
        let Some(sources) = by_edge.get_mut(&edge) else {
            return false;
        };
        let Some(pos) = sources.iter().position(|&s| s == source) else {
            return false;
        };
        sources.remove(pos);
        if sources.is_empty() {
            by_edge.remove(&edge);
        }
        if by_edge.is_empty() {
            self.entries.remove(&target);
        }
        true
    }

    pub(crate) fn remove_target(&mut self, target: NodeId) {
        self.entries.remove(&target);
    }

    fn sources(&self, target: NodeId, edge: EdgeKind) -> &[NodeId] {
        self.entries
            .get(&target)
            .and_then(|by_edge| by_edge.get(&edge))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of indexed (target, edge, source) entries.
    pub fn entry_count(&self) -> usize {
        self.entries
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }
}

impl Factory {
    /// Build the reverse-edge index, or keep the current one if it was built
    /// with the same selector. `None` indexes every source kind.
    pub fn enable_reverse_edges(&mut self, selector: Option<EdgeSelector>) {
        if let Some(current) = &self.reverse {
            if current.selector.map(|f| f as usize) == selector.map(|f| f as usize) {
                return;
            }
            info!("Reverse-edge selector changed; rebuilding index");
        }
        let index = ReverseEdges::build(self, selector);
        info!(
            "Built reverse-edge index: {} entries over {} nodes",
            index.entry_count(),
            self.len()
        );
        self.reverse = Some(index);
    }

    /// Drop the reverse-edge index.
    pub fn disable_reverse_edges(&mut self) {
        self.reverse = None;
    }

    /// Whether the reverse-edge index is active.
    pub fn has_reverse_edges(&self) -> bool {
        self.reverse.is_some()
    }

    /// Query handle over the reverse-edge index.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::ReverseEdgesDisabled`] if the index is inactive.
    pub fn reverse_edges(&self) -> Result<ReverseQuery<'_>> {
        let index = self.reverse.as_ref().ok_or(GraphError::ReverseEdgesDisabled)?;
        Ok(ReverseQuery {
            factory: self,
            index,
        })
    }

    /// Sources pointing at `target` through `edge`.
    ///
    /// # Errors
    ///
    /// As [`ReverseQuery::query`], plus [`GraphError::ReverseEdgesDisabled`].
    pub fn reverse_query(&self, target: NodeId, edge: EdgeKind) -> Result<ReverseIter<'_>> {
        self.reverse_edges()?.query(target, edge)
    }
}

/// Read access to an active reverse-edge index.
#[derive(Debug, Clone, Copy)]
pub struct ReverseQuery<'a> {
    factory: &'a Factory,
    index: &'a ReverseEdges,
}

impl<'a> ReverseQuery<'a> {
    fn check(&self, target: NodeId, edge: EdgeKind) -> Result<()> {
        let node = self.factory.get(target)?;
        let schema = &self.factory.schema;
        if !schema.is_possible_edge(node.kind(), edge) {
            return Err(GraphError::InvalidEdgeKind {
                edge: schema.edge_name(edge).to_string(),
                node_kind: schema.kind_name(node.kind()).to_string(),
                reason: "edge can never point at this node kind".to_string(),
            });
        }
        Ok(())
    }

    /// Visible sources pointing at `target` through `edge`, in the order the
    /// edges were created. The iterator is cheap to clone and restart.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotFound`] for a missing target and
    /// [`GraphError::InvalidEdgeKind`] if `edge` can never target its kind.
    pub fn query(&self, target: NodeId, edge: EdgeKind) -> Result<ReverseIter<'a>> {
        self.check(target, edge)?;
        Ok(ReverseIter {
            factory: self.factory,
            sources: self.index.sources(target, edge).iter(),
        })
    }

    /// Number of visible sources pointing at `target` through `edge`.
    ///
    /// # Errors
    ///
    /// As [`query`](Self::query).
    pub fn count(&self, target: NodeId, edge: EdgeKind) -> Result<usize> {
        Ok(self.query(target, edge)?.count())
    }

    /// Edge kinds through which at least one visible source points at `target`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotFound`] for a missing target.
    pub fn existing_edges(&self, target: NodeId) -> Result<Vec<EdgeKind>> {
        self.factory.get(target)?;
        Ok(self
            .index
            .entries
            .get(&target)
            .map(|by_edge| {
                by_edge
                    .iter()
                    .filter(|(_, sources)| sources.iter().any(|&s| self.factory.is_visible(s)))
                    .map(|(&edge, _)| edge)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Edge kinds that could point at `target` according to the schema.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotFound`] for a missing target.
    pub fn possible_edges(&self, target: NodeId) -> Result<Vec<EdgeKind>> {
        let kind = self.factory.get(target)?.kind();
        Ok(self.factory.schema.possible_edges(kind))
    }
}

/// Lazy sequence of source nodes from a reverse-edge query.
#[derive(Debug, Clone)]
pub struct ReverseIter<'a> {
    factory: &'a Factory,
    sources: std::slice::Iter<'a, NodeId>,
}

impl Iterator for ReverseIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let factory = self.factory;
        self.sources.by_ref().copied().find(|&s| factory.is_visible(s))
    }
}
