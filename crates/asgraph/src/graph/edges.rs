//! Typed edge mutation and lookup.
//!
//! Every mutation validates the edge kind against the source node's kind, the
//! target's existence, factory and capability, and the ownership rule: a node
//! has at most one owning parent. Successful mutations keep parent links and
//! the reverse-edge index in step with the forward edges.

use super::factory::Factory;
use super::node::{EdgeSlot, NodeId, NodeRef};
use crate::error::{GraphError, Result};
use crate::schema::{Cardinality, EdgeDef, EdgeKind, Schema};
use log::debug;
use std::sync::Arc;

impl Factory {
    /// Resolve `edge` on `source` to a slot index, checking cardinality.
    fn edge_slot_index<'s>(
        &self,
        schema: &'s Schema,
        source: NodeId,
        edge: EdgeKind,
        multi: Option<bool>,
    ) -> Result<(usize, &'s EdgeDef)> {
        let node = self.get(source)?;
        let invalid = |reason: &str| GraphError::InvalidEdgeKind {
            edge: schema.edge_name(edge).to_string(),
            node_kind: schema.kind_name(node.kind()).to_string(),
            reason: reason.to_string(),
        };
        let def = schema.edge(edge).ok_or_else(|| invalid("undeclared edge kind"))?;
        let slot = schema
            .layout(node.kind())
            .and_then(|layout| layout.edge_slot(edge))
            .ok_or_else(|| invalid("not declared for this node kind"))?;
        match multi {
            Some(true) if !def.cardinality.is_multi() => {
                Err(invalid("single-valued edge used as a list"))
            }
            Some(false) if def.cardinality.is_multi() => {
                Err(invalid("multi-valued edge used as a single value"))
            }
            _ => Ok((slot, def)),
        }
    }

    /// Validate a target for `def`: same factory, existing, compatible kind.
    fn check_target(&self, schema: &Schema, def: &EdgeDef, target: NodeRef) -> Result<()> {
        if let Some(owner) = target.factory {
            if owner != self.id() {
                return Err(GraphError::CrossFactoryMismatch {
                    node_id: target.id,
                    expected: self.id(),
                    actual: owner,
                });
            }
        }
        let node = self
            .node(target.id)
            .ok_or(GraphError::DanglingTarget { node_id: target.id })?;
        if !schema.is_kind_of(node.kind(), def.target) {
            return Err(GraphError::IncompatibleTarget {
                edge: def.qualified_name.clone(),
                expected: schema.kind_name(def.target).to_string(),
                actual: schema.kind_name(node.kind()).to_string(),
                node_id: target.id,
            });
        }
        Ok(())
    }

    fn check_unowned(&self, def: &EdgeDef, target: NodeId) -> Result<()> {
        if def.is_owning() {
            if let Some(parent) = self.parent(target) {
                return Err(GraphError::AlreadyOwned {
                    node_id: target,
                    parent,
                });
            }
        }
        Ok(())
    }

    /// Record a new forward edge: parent link and reverse entry.
    fn link(&mut self, source: NodeId, edge: EdgeKind, target: NodeId, owning: bool) {
        if owning {
            if let Ok(node) = self.node_mut(target) {
                node.parent = Some((source, edge));
            }
        }
        let source_kind = self.node(source).map(|node| node.kind());
        if let (Some(reverse), Some(kind)) = (self.reverse.as_mut(), source_kind) {
            reverse.insert(&self.schema, target, source, kind, edge);
        }
    }

    /// Forget a forward edge that was just removed from its slot.
    fn unlink(&mut self, source: NodeId, edge: EdgeKind, target: NodeId, owning: bool) {
        if owning {
            if let Ok(node) = self.node_mut(target) {
                if node.parent == Some((source, edge)) {
                    node.parent = None;
                }
            }
        }
        if let Some(reverse) = self.reverse.as_mut() {
            reverse.remove(target, source, edge);
        }
    }

    fn slot_mut(&mut self, source: NodeId, slot: usize) -> Result<&mut EdgeSlot> {
        Ok(&mut self.node_mut(source)?.edges[slot])
    }

    /// Set a single-valued edge.
    ///
    /// Setting the current value again is a no-op. Setting the null id on an
    /// empty edge is a no-op; on a set edge it fails, use
    /// [`remove_edge`](Self::remove_edge) or [`clear_edge`](Self::clear_edge)
    /// instead.
    ///
    /// # Errors
    ///
    /// - [`GraphError::NotFound`] if `source` does not exist
    /// - [`GraphError::InvalidEdgeKind`] if the kind has no such single edge
    /// - [`GraphError::NullNotAllowed`] when nulling a set edge
    /// - [`GraphError::CrossFactoryMismatch`], [`GraphError::DanglingTarget`] or
    ///   [`GraphError::IncompatibleTarget`] for a bad target
    /// - [`GraphError::AlreadyOwned`] if an owning edge targets a node that
    ///   already has a parent
    pub fn set_edge(&mut self, source: NodeId, edge: EdgeKind, target: impl Into<NodeRef>) -> Result<()> {
        let target = target.into();
        let schema = Arc::clone(&self.schema);
        let (slot, def) = self.edge_slot_index(&schema, source, edge, Some(false))?;
        let current = match self.get(source)?.edges[slot] {
            EdgeSlot::Single(current) => current,
            EdgeSlot::Multi(_) => 0,
        };

        if target.id == 0 {
            if current != 0 {
                return Err(GraphError::NullNotAllowed {
                    edge: def.qualified_name.clone(),
                });
            }
            return Ok(());
        }
        self.check_target(&schema, def, target)?;
        if current == target.id {
            return Ok(());
        }
        self.check_unowned(def, target.id)?;

        if current != 0 {
            self.unlink(source, edge, current, def.is_owning());
        }
        *self.slot_mut(source, slot)? = EdgeSlot::Single(target.id);
        self.link(source, edge, target.id, def.is_owning());
        debug!("Set edge {}: {source} -> {}", def.qualified_name, target.id);
        Ok(())
    }

    /// Append a target to a multi-valued edge.
    ///
    /// Duplicates are allowed and position-significant unless the edge has
    /// set semantics.
    ///
    /// # Errors
    ///
    /// As [`set_edge`](Self::set_edge), plus [`GraphError::NullNotAllowed`] for
    /// the null id and [`GraphError::DuplicateTarget`] for a repeated target on
    /// a set-valued edge.
    pub fn add_edge(&mut self, source: NodeId, edge: EdgeKind, target: impl Into<NodeRef>) -> Result<()> {
        let target = target.into();
        let schema = Arc::clone(&self.schema);
        let (slot, def) = self.edge_slot_index(&schema, source, edge, Some(true))?;
        if target.id == 0 {
            return Err(GraphError::NullNotAllowed {
                edge: def.qualified_name.clone(),
            });
        }
        self.check_target(&schema, def, target)?;
        if def.cardinality == Cardinality::MultiSet
            && self.get(source)?.edges[slot].targets().contains(&target.id)
        {
            return Err(GraphError::DuplicateTarget {
                edge: def.qualified_name.clone(),
                node_id: target.id,
            });
        }
        self.check_unowned(def, target.id)?;

        if let EdgeSlot::Multi(targets) = self.slot_mut(source, slot)? {
            targets.push(target.id);
        }
        self.link(source, edge, target.id, def.is_owning());
        debug!("Added edge {}: {source} -> {}", def.qualified_name, target.id);
        Ok(())
    }

    /// Remove `target` from an edge of either cardinality. For multi-valued
    /// edges the first occurrence is removed.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::EdgeNotPresent`] if `target` is not a current
    /// value of the edge, besides the lookup errors of
    /// [`set_edge`](Self::set_edge).
    pub fn remove_edge(&mut self, source: NodeId, edge: EdgeKind, target: NodeId) -> Result<()> {
        let schema = Arc::clone(&self.schema);
        let (slot, def) = self.edge_slot_index(&schema, source, edge, None)?;
        let not_present = || GraphError::EdgeNotPresent {
            edge: def.qualified_name.clone(),
            source_id: source,
            node_id: target,
        };
        if target == 0 {
            return Err(not_present());
        }
        match self.slot_mut(source, slot)? {
            EdgeSlot::Single(current) if *current == target => *current = 0,
            EdgeSlot::Multi(targets) => {
                let pos = targets
                    .iter()
                    .position(|&t| t == target)
                    .ok_or_else(not_present)?;
                targets.remove(pos);
            }
            EdgeSlot::Single(_) => return Err(not_present()),
        }
        self.unlink(source, edge, target, def.is_owning());
        debug!("Removed edge {}: {source} -> {target}", def.qualified_name);
        Ok(())
    }

    /// Remove the target at `index` of a multi-valued edge and return it.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::EdgeNotPresent`] if `index` is out of range.
    pub fn remove_edge_at(&mut self, source: NodeId, edge: EdgeKind, index: usize) -> Result<NodeId> {
        let schema = Arc::clone(&self.schema);
        let (slot, def) = self.edge_slot_index(&schema, source, edge, Some(true))?;
        let removed = match self.slot_mut(source, slot)? {
            EdgeSlot::Multi(targets) if index < targets.len() => targets.remove(index),
            _ => {
                return Err(GraphError::EdgeNotPresent {
                    edge: def.qualified_name.clone(),
                    source_id: source,
                    node_id: 0,
                })
            }
        };
        self.unlink(source, edge, removed, def.is_owning());
        debug!("Removed edge {}[{index}]: {source} -> {removed}", def.qualified_name);
        Ok(removed)
    }

    /// Empty an edge. A multi-valued edge may already be empty; an unset
    /// single-valued edge is reported.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::EdgeNotPresent`] for an unset single-valued edge.
    pub fn clear_edge(&mut self, source: NodeId, edge: EdgeKind) -> Result<()> {
        let schema = Arc::clone(&self.schema);
        let (slot, def) = self.edge_slot_index(&schema, source, edge, None)?;
        let removed: Vec<NodeId> = match self.slot_mut(source, slot)? {
            EdgeSlot::Single(0) => {
                return Err(GraphError::EdgeNotPresent {
                    edge: def.qualified_name.clone(),
                    source_id: source,
                    node_id: 0,
                })
            }
            EdgeSlot::Single(current) => vec![std::mem::take(current)],
            EdgeSlot::Multi(targets) => std::mem::take(targets),
        };
        for target in removed {
            self.unlink(source, edge, target, def.is_owning());
        }
        Ok(())
    }

    /// Target of a single-valued edge.
    ///
    /// Returns `None` if the source or edge is invalid, the edge is unset, the
    /// target no longer exists, or the target is filtered. Filtering masks the
    /// edge without removing it.
    pub fn edge(&self, source: NodeId, edge: EdgeKind) -> Option<NodeId> {
        let (slot, _) = self
            .edge_slot_index(&self.schema, source, edge, Some(false))
            .ok()?;
        match self.node(source)?.edges[slot] {
            EdgeSlot::Single(target) if self.is_visible(target) => Some(target),
            _ => None,
        }
    }

    /// Visible targets of an edge of either cardinality, in order.
    pub fn edge_targets(&self, source: NodeId, edge: EdgeKind) -> Vec<NodeId> {
        self.edge_slot(source, edge)
            .map(|slot| {
                slot.targets()
                    .iter()
                    .copied()
                    .filter(|&target| self.is_visible(target))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Raw storage of an edge, ignoring the filter and target existence.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotFound`] or [`GraphError::InvalidEdgeKind`].
    pub fn edge_slot(&self, source: NodeId, edge: EdgeKind) -> Result<&EdgeSlot> {
        let (slot, _) = self.edge_slot_index(&self.schema, source, edge, None)?;
        Ok(&self.get(source)?.edges[slot])
    }
}
