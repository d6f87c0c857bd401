//! The node arena and its lifecycle operations.

use super::filter::Filter;
use super::node::{AttrValue, EdgeSlot, FactoryId, Node, NodeId, NodeRef, Position, FIRST_NODE_ID};
use super::reverse::ReverseEdges;
use crate::config::FactoryConfig;
use crate::error::{GraphError, Result};
use crate::schema::{AttrId, AttrType, NodeKind, Schema};
use crate::strtable::{Key, KeyMap, StrTable};
use log::{debug, trace};
use std::cell::Cell;
use std::collections::{HashSet, TryReserveError};
use std::ops::Deref;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

static NEXT_FACTORY_ID: AtomicU32 = AtomicU32::new(1);

/// Owner of every node of one graph.
///
/// A factory assigns node ids, creates and destroys nodes, and hosts the string
/// table, the filter and the optional reverse-edge index. Ids are handed out
/// densely starting at [`FIRST_NODE_ID`] and are never reused: destroying a
/// node leaves a tombstone in its slot.
///
/// Destroying a node does not detach edges that point at it from outside its
/// own subtree. Callers that need a clean graph detach inbound edges first,
/// typically by consulting the reverse-edge index.
#[derive(Debug)]
pub struct Factory {
    id: FactoryId,
    pub(crate) schema: Arc<Schema>,
    config: FactoryConfig,
    pub(crate) nodes: Vec<Option<Node>>,
    pub(crate) next_id: NodeId,
    live: usize,
    pub(crate) strings: StrTable,
    pub(crate) filter: Filter,
    filter_enabled: Cell<bool>,
    pub(crate) reverse: Option<ReverseEdges>,
    pub(crate) root: Option<NodeId>,
}

impl Factory {
    /// Create a factory with default configuration.
    ///
    /// If the schema declares a root kind, the root node is created
    /// immediately and receives id [`FIRST_NODE_ID`].
    pub fn new(schema: Arc<Schema>) -> Self {
        Self::with_config(schema, FactoryConfig::default())
    }

    /// Create a factory with explicit configuration.
    pub fn with_config(schema: Arc<Schema>, config: FactoryConfig) -> Self {
        let strings = StrTable::new(config.string_buckets);
        let mut factory = Self {
            id: NEXT_FACTORY_ID.fetch_add(1, Ordering::Relaxed),
            schema,
            config,
            nodes: empty_arena(),
            next_id: FIRST_NODE_ID,
            live: 0,
            strings,
            filter: Filter::default(),
            filter_enabled: Cell::new(true),
            reverse: None,
            root: None,
        };
        factory.create_root();
        factory
    }

    fn create_root(&mut self) {
        if let Some(kind) = self.schema.root_kind() {
            let id = self.next_id;
            if self.place(id, kind).is_ok() {
                self.root = Some(id);
            }
        }
    }

    /// Process-unique id of this factory.
    pub fn id(&self) -> FactoryId {
        self.id
    }

    /// Schema the factory was created with.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Configuration the factory was created with.
    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// The string table.
    pub fn strings(&self) -> &StrTable {
        &self.strings
    }

    /// The string table, mutably.
    pub fn strings_mut(&mut self) -> &mut StrTable {
        &mut self.strings
    }

    /// Root node, if the schema declares a root kind.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Id the next created node will receive. Every id below it has been
    /// handed out, including ids of destroyed nodes.
    pub fn next_id(&self) -> NodeId {
        self.next_id
    }

    /// Number of live nodes, filtered or not.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether the factory holds no live node.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// A reference to `id` tagged with this factory, for cross-factory checks.
    pub fn node_ref(&self, id: NodeId) -> NodeRef {
        NodeRef {
            factory: Some(self.id),
            id,
        }
    }

    /// Create a node of a concrete kind.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownNodeKind`] if the kind is undeclared or
    /// abstract, and [`GraphError::IdSpaceExhausted`] if no slot can be
    /// allocated for the next id.
    pub fn create(&mut self, kind: NodeKind) -> Result<NodeId> {
        if !self.schema.is_concrete(kind) {
            return Err(GraphError::UnknownNodeKind { kind });
        }
        let id = self.next_id;
        self.place(id, kind)
            .map_err(|_| GraphError::IdSpaceExhausted { node_id: id })?;
        debug!(
            "Created node: id={id}, kind={}",
            self.schema.kind_name(kind)
        );
        Ok(id)
    }

    /// Put a fresh node of `kind` into slot `id`, growing the arena as needed.
    /// Fails without side effects if the arena cannot grow that far.
    pub(crate) fn place(
        &mut self,
        id: NodeId,
        kind: NodeKind,
    ) -> std::result::Result<(), TryReserveError> {
        let index = id as usize;
        if self.nodes.len() <= index {
            self.nodes.try_reserve(index + 1 - self.nodes.len())?;
            self.nodes.resize_with(index + 1, || None);
        }
        self.nodes[index] = Some(Node::new(id, kind, &self.schema));
        self.live += 1;
        self.next_id = self.next_id.max(id.saturating_add(1));
        Ok(())
    }

    /// Whether `id` names a live node.
    pub fn exists(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Look a node up.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotFound`] if the id was never created or the node
    /// has been destroyed.
    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.node(id).ok_or(GraphError::NotFound { node_id: id })
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id as usize).and_then(Option::as_ref)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id as usize)
            .and_then(Option::as_mut)
            .ok_or(GraphError::NotFound { node_id: id })
    }

    /// Name of a node's kind.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotFound`] if the node does not exist.
    pub fn kind_name(&self, id: NodeId) -> Result<&str> {
        let kind = self.get(id)?.kind;
        Ok(self.schema.kind_name(kind))
    }

    /// Whether the node exists and is not masked by the filter.
    pub fn is_visible(&self, id: NodeId) -> bool {
        self.exists(id) && !(self.is_filter_on() && self.filter.contains(id))
    }

    /// Live nodes in id order. Filtered nodes are skipped while filtering is on.
    pub fn iter(&self) -> impl Iterator<Item = &Node> + '_ {
        let masked = self.is_filter_on();
        self.nodes
            .iter()
            .flatten()
            .filter(move |node| !masked || !self.filter.contains(node.id))
    }

    /// Owning parent of a node.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(Node::parent)
    }

    /// Whether the node exists and has no owning parent.
    pub fn is_individual(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|node| node.parent.is_none())
    }

    /// Visible nodes without an owning parent, in id order.
    pub fn individuals(&self) -> Vec<NodeId> {
        self.iter()
            .filter(|node| node.parent.is_none())
            .map(Node::id)
            .collect()
    }

    /// Direct owned children, in edge-declaration and insertion order,
    /// regardless of the filter.
    pub fn owned_children(&self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        let Some(layout) = self.schema.layout(node.kind) else {
            return Vec::new();
        };
        layout
            .edges
            .iter()
            .zip(&node.edges)
            .filter(|(&edge, _)| self.schema.edge(edge).is_some_and(|def| def.is_owning()))
            .flat_map(|(_, slot)| slot.targets().iter().copied())
            .filter(|&target| self.exists(target))
            .collect()
    }

    /// The node and everything it owns, in pre-order. Nodes reached twice are
    /// listed once.
    pub fn owned_subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !self.exists(current) || !seen.insert(current) {
                continue;
            }
            order.push(current);
            let children = self.owned_children(current);
            stack.extend(children.into_iter().rev());
        }
        order
    }

    // ---- attributes -------------------------------------------------------

    fn attr_slot(&self, id: NodeId, attr: AttrId) -> Result<(usize, AttrType)> {
        let node = self.get(id)?;
        let invalid = |reason: &str| GraphError::InvalidAttribute {
            name: self
                .schema
                .attr(attr)
                .map_or_else(|| attr.to_string(), |def| def.name.clone()),
            node_kind: self.schema.kind_name(node.kind).to_string(),
            reason: reason.to_string(),
        };
        let def = self.schema.attr(attr).ok_or_else(|| invalid("undeclared"))?;
        let slot = self
            .schema
            .layout(node.kind)
            .and_then(|layout| layout.attr_slot(attr))
            .ok_or_else(|| invalid("not declared for this kind"))?;
        Ok((slot, def.ty))
    }

    /// Read an attribute.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotFound`] for a missing node and
    /// [`GraphError::InvalidAttribute`] if the node's kind lacks the attribute.
    pub fn attr(&self, id: NodeId, attr: AttrId) -> Result<AttrValue> {
        let (slot, _) = self.attr_slot(id, attr)?;
        Ok(self.get(id)?.attrs[slot])
    }

    /// Read an attribute by name.
    ///
    /// # Errors
    ///
    /// As [`attr`](Self::attr).
    pub fn attr_named(&self, id: NodeId, name: &str) -> Result<AttrValue> {
        let kind = self.get(id)?.kind;
        let attr = self
            .schema
            .attr_by_name(kind, name)
            .ok_or_else(|| GraphError::InvalidAttribute {
                name: name.to_string(),
                node_kind: self.schema.kind_name(kind).to_string(),
                reason: "not declared for this kind".to_string(),
            })?;
        self.attr(id, attr)
    }

    fn type_mismatch(&self, id: NodeId, attr: AttrId, expected: AttrType, actual: AttrType) -> GraphError {
        GraphError::InvalidAttribute {
            name: self
                .schema
                .attr(attr)
                .map_or_else(|| attr.to_string(), |def| def.name.clone()),
            node_kind: self.kind_name(id).unwrap_or("<unknown>").to_string(),
            reason: format!("expected {expected:?}, got {actual:?}"),
        }
    }

    /// Write an attribute. Invalidates the node's cached hash.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidAttribute`] if the kind lacks the attribute
    /// or the value has the wrong type.
    pub fn set_attr(&mut self, id: NodeId, attr: AttrId, value: impl Into<AttrValue>) -> Result<()> {
        let value = value.into();
        let (slot, ty) = self.attr_slot(id, attr)?;
        if value.ty() != ty {
            return Err(self.type_mismatch(id, attr, ty, value.ty()));
        }
        let node = self.node_mut(id)?;
        node.attrs[slot] = value;
        node.invalidate_hash();
        trace!("Set attribute {attr} of node {id} to {value:?}");
        Ok(())
    }

    /// Intern `text` and store it in a string attribute.
    ///
    /// # Errors
    ///
    /// As [`set_attr`](Self::set_attr). A failed call interns nothing.
    pub fn set_str(&mut self, id: NodeId, attr: AttrId, text: &str) -> Result<Key> {
        let (_, ty) = self.attr_slot(id, attr)?;
        if ty != AttrType::Str {
            return Err(self.type_mismatch(id, attr, ty, AttrType::Str));
        }
        let key = self.strings.intern(text);
        self.set_attr(id, attr, AttrValue::Str(key))?;
        Ok(key)
    }

    /// Resolve a string attribute.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidAttribute`] if the attribute is not a string.
    pub fn str_attr(&self, id: NodeId, attr: AttrId) -> Result<&str> {
        match self.attr(id, attr)? {
            AttrValue::Str(key) => Ok(self.strings.resolve(key)),
            other => Err(self.type_mismatch(id, attr, AttrType::Str, other.ty())),
        }
    }

    /// Set a node's source range.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotFound`] if the node does not exist.
    pub fn set_position(&mut self, id: NodeId, position: Position) -> Result<()> {
        let node = self.node_mut(id)?;
        node.position = Some(position);
        node.invalidate_hash();
        Ok(())
    }

    /// A node's source range.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotFound`] if the node does not exist.
    pub fn position(&self, id: NodeId) -> Result<Option<Position>> {
        Ok(self.get(id)?.position)
    }

    // ---- destruction ------------------------------------------------------

    /// Destroy a node and the subtree it owns.
    ///
    /// The node is detached from its owning parent; every edge leaving a
    /// destroyed node is released (and removed from the reverse-edge index);
    /// filter entries are cleared; ids are retired. Edges from surviving nodes
    /// into the destroyed subtree are left in place.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotFound`] if the node does not exist.
    pub fn destroy(&mut self, id: NodeId) -> Result<()> {
        self.get(id)?;
        let subtree = self.owned_subtree(id);
        self.detach_from_parent(id);
        for &node_id in &subtree {
            self.release(node_id);
        }
        if self.root == Some(id) {
            self.root = None;
        }
        debug!("Destroyed node {id} with {} owned descendants", subtree.len() - 1);
        Ok(())
    }

    /// Destroy only this node. Nodes it owned become individuals.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotFound`] if the node does not exist.
    pub fn destroy_this_node_only(&mut self, id: NodeId) -> Result<()> {
        self.get(id)?;
        self.detach_from_parent(id);
        self.release(id);
        if self.root == Some(id) {
            self.root = None;
        }
        debug!("Destroyed node {id} alone");
        Ok(())
    }

    fn detach_from_parent(&mut self, id: NodeId) {
        let Some((parent, edge)) = self.node(id).and_then(|node| node.parent) else {
            return;
        };
        let slot = self
            .node(parent)
            .and_then(|p| self.schema.layout(p.kind))
            .and_then(|layout| layout.edge_slot(edge));
        if let (Some(slot), Ok(parent_node)) = (slot, self.node_mut(parent)) {
            match &mut parent_node.edges[slot] {
                EdgeSlot::Single(target) if *target == id => *target = 0,
                EdgeSlot::Multi(targets) => {
                    if let Some(pos) = targets.iter().position(|&t| t == id) {
                        targets.remove(pos);
                    }
                }
                _ => {}
            }
        }
        if let Some(reverse) = self.reverse.as_mut() {
            reverse.remove(id, parent, edge);
        }
        if let Ok(node) = self.node_mut(id) {
            node.parent = None;
        }
    }

    /// Release every outgoing edge of `id` and tombstone its slot.
    fn release(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id as usize).and_then(Option::take) else {
            return;
        };
        self.live -= 1;
        let schema = Arc::clone(&self.schema);
        if let Some(layout) = schema.layout(node.kind) {
            // Layout order is capability order: each capability releases its
            // own edges once.
            for (&edge, slot) in layout.edges.iter().zip(&node.edges) {
                let owning = schema.edge(edge).is_some_and(|def| def.is_owning());
                for &target in slot.targets() {
                    if let Some(reverse) = self.reverse.as_mut() {
                        reverse.remove(target, id, edge);
                    }
                    if owning {
                        if let Ok(child) = self.node_mut(target) {
                            if child.parent == Some((id, edge)) {
                                child.parent = None;
                            }
                        }
                    }
                }
            }
        }
        if let Some(reverse) = self.reverse.as_mut() {
            reverse.remove_target(id);
        }
        self.filter.remove(id);
    }

    /// Drop every node and string, returning to the freshly constructed state
    /// without a root. The reverse-edge index is disabled.
    pub fn clear(&mut self) {
        self.nodes = empty_arena();
        self.next_id = FIRST_NODE_ID;
        self.live = 0;
        self.strings = StrTable::new(self.config.string_buckets);
        self.filter.clear();
        self.reverse = None;
        self.root = None;
    }

    // ---- strings ----------------------------------------------------------

    /// Replace the string table, re-keying every string attribute and position
    /// through `map`. Returns the previous table.
    ///
    /// Keys already present in `map` are reused as-is; other strings are
    /// interned into `table` and recorded, so the same map can be shared by
    /// several factories moving into one table.
    pub fn swap_string_table(&mut self, mut table: StrTable, map: &mut KeyMap) -> StrTable {
        for node in self.nodes.iter_mut().flatten() {
            for value in node.attrs.iter_mut() {
                if let AttrValue::Str(key) = value {
                    *key = self.strings.remap_into(*key, &mut table, map);
                }
            }
            if let Some(position) = node.position.as_mut() {
                position.path = self.strings.remap_into(position.path, &mut table, map);
            }
        }
        debug!("Swapped string table ({} keys mapped)", map.len());
        std::mem::replace(&mut self.strings, table)
    }

    // ---- filter switch ----------------------------------------------------

    /// Whether filtered nodes are currently masked.
    pub fn is_filter_on(&self) -> bool {
        self.filter_enabled.get()
    }

    /// Mask filtered nodes (the default).
    pub fn filter_on(&self) {
        self.filter_enabled.set(true);
    }

    /// Stop masking filtered nodes. The filter itself is kept.
    pub fn filter_off(&self) {
        self.filter_enabled.set(false);
    }

    /// Turn masking off until the returned guard is dropped.
    pub fn suspend_filter(&self) -> FilterSuspended<'_> {
        let previous = self.filter_enabled.replace(false);
        FilterSuspended {
            factory: self,
            previous,
        }
    }
}

fn empty_arena() -> Vec<Option<Node>> {
    std::iter::repeat_with(|| None)
        .take(FIRST_NODE_ID as usize)
        .collect()
}

/// Guard returned by [`Factory::suspend_filter`]; restores the previous
/// filtering state on drop.
#[derive(Debug)]
pub struct FilterSuspended<'a> {
    factory: &'a Factory,
    previous: bool,
}

impl Deref for FilterSuspended<'_> {
    type Target = Factory;

    fn deref(&self) -> &Factory {
        self.factory
    }
}

impl Drop for FilterSuspended<'_> {
    fn drop(&mut self) {
        self.factory.filter_enabled.set(self.previous);
    }
}
