//! Copying subtrees between factories.

use crate::error::{GraphError, Result};
use crate::graph::{AttrValue, EdgeSlot, Factory, NodeId};
use crate::strtable::KeyMap;
use log::{debug, warn};
use std::collections::HashMap;

/// Correspondence between source and copied nodes and strings.
///
/// Reusing one map across several [`deep_copy`] calls into the same target
/// shares already copied nodes: association edges to a node copied earlier
/// point at that copy instead of cloning it again.
#[derive(Debug, Clone, Default)]
pub struct CopyMap {
    /// Source node id to copied node id
    pub nodes: HashMap<NodeId, NodeId>,
    /// Source string key to target string key
    pub keys: KeyMap,
}

/// Copy the subtree owned by `root` from `source` into `target`.
///
/// Nodes receive fresh ids in `target`; attributes and positions are copied
/// with their strings re-interned into `target`'s table. Owning edges are
/// rebuilt inside the copy. Association edges point at the copy of their
/// target: one already in `map`, or a new copy of the target's own subtree,
/// which becomes an individual in `target`. The filter is ignored and not
/// copied.
///
/// The copy is not transactional: on error, nodes copied so far stay in
/// `target` and in `map`.
///
/// # Parameters
/// - `source`: Factory to copy from
/// - `root`: Root of the subtree to copy
/// - `target`: Factory to copy into; must use a compatible schema
/// - `map`: Node and string correspondence, extended by the copy
///
/// # Returns
/// Id of the copy of `root`
///
/// # Errors
///
/// Returns [`GraphError::Schema`] if the schemas are incompatible,
/// [`GraphError::NotFound`] if `root` does not exist, and any edge validation
/// error raised while rebuilding edges.
pub fn deep_copy(
    source: &Factory,
    root: NodeId,
    target: &mut Factory,
    map: &mut CopyMap,
) -> Result<NodeId> {
    if !target.schema().is_compatible_with(source.schema()) {
        return Err(GraphError::schema(format!(
            "cannot copy from '{}' into '{}'",
            source.schema().file_type(),
            target.schema().file_type()
        )));
    }
    source.get(root)?;
    if let Some(&copied) = map.nodes.get(&root) {
        return Ok(copied);
    }

    let mut pending = vec![root];
    let mut created = Vec::new();
    while let Some(next) = pending.pop() {
        if map.nodes.contains_key(&next) {
            continue;
        }
        for id in source.owned_subtree(next) {
            if map.nodes.contains_key(&id) {
                continue;
            }
            let copy = copy_node(source, id, target, map)?;
            map.nodes.insert(id, copy);
            created.push(id);
            pending.extend(association_targets(source, id));
        }
    }

    for &id in &created {
        wire_edges(source, id, target, map)?;
    }
    debug!("Copied {} nodes from node {root}", created.len());
    map.nodes
        .get(&root)
        .copied()
        .ok_or(GraphError::NotFound { node_id: root })
}

fn copy_node(source: &Factory, id: NodeId, target: &mut Factory, map: &mut CopyMap) -> Result<NodeId> {
    let node = source.get(id)?;
    let copy = target.create(node.kind())?;
    let attrs: Vec<AttrValue> = node
        .attrs()
        .iter()
        .map(|value| match *value {
            AttrValue::Str(key) => {
                AttrValue::Str(source.strings().remap_into(key, &mut target.strings, &mut map.keys))
            }
            other => other,
        })
        .collect();
    let position = node.position().map(|p| {
        let mut p = *p;
        p.path = source
            .strings()
            .remap_into(p.path, &mut target.strings, &mut map.keys);
        p
    });

    let copied = target.node_mut(copy)?;
    copied.attrs = attrs;
    copied.position = position;
    Ok(copy)
}

fn association_targets(source: &Factory, id: NodeId) -> Vec<NodeId> {
    let schema = source.schema();
    let Some(node) = source.node(id) else {
        return Vec::new();
    };
    let Some(layout) = schema.layout(node.kind()) else {
        return Vec::new();
    };
    layout
        .edges
        .iter()
        .zip(node.edge_slots())
        .filter(|(&edge, _)| schema.edge(edge).is_some_and(|def| !def.is_owning()))
        .flat_map(|(_, slot)| slot.targets().iter().copied())
        .filter(|&t| source.exists(t))
        .collect()
}

fn wire_edges(source: &Factory, id: NodeId, target: &mut Factory, map: &CopyMap) -> Result<()> {
    let schema = source.schema();
    let Some(node) = source.node(id) else {
        return Ok(());
    };
    let Some(layout) = schema.layout(node.kind()) else {
        return Ok(());
    };
    let Some(&copy) = map.nodes.get(&id) else {
        return Ok(());
    };
    for (&edge, slot) in layout.edges.iter().zip(node.edge_slots()) {
        for &old in slot.targets() {
            let Some(&new) = map.nodes.get(&old) else {
                warn!("Edge {} of node {id} points at missing node {old}; not copied", schema.edge_name(edge));
                continue;
            };
            match slot {
                EdgeSlot::Single(_) => target.set_edge(copy, edge, new)?,
                EdgeSlot::Multi(_) => target.add_edge(copy, edge, new)?,
            }
        }
    }
    Ok(())
}
