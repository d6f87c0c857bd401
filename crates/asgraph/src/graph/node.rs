//! Node storage types.

use crate::schema::{AttrType, EdgeKind, NodeKind, Schema};
use crate::strtable::Key;
use serde::{Deserialize, Serialize};
use std::cell::Cell;

/// Dense node identity within one factory. `0` means "no node".
pub type NodeId = u32;

/// Process-unique identity of a factory.
pub type FactoryId = u32;

/// First id handed out by a factory; lower ids are reserved.
pub const FIRST_NODE_ID: NodeId = 100;

/// Source range of a node. `path` is a string-table key.
///
/// The `wide_*` fields hold the same range measured in display columns
/// (tabs expanded).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct Position {
    pub path: Key,
    pub line: u32,
    pub col: u32,
    pub end_line: u32,
    pub end_col: u32,
    pub wide_line: u32,
    pub wide_col: u32,
    pub wide_end_line: u32,
    pub wide_end_col: u32,
}

impl Position {
    /// A range in `path` with identical plain and wide coordinates.
    pub fn new(path: Key, line: u32, col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            path,
            line,
            col,
            end_line,
            end_col,
            wide_line: line,
            wide_col: col,
            wide_end_line: end_line,
            wide_end_col: end_col,
        }
    }
}

/// Value of a scalar attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttrValue {
    /// Boolean flag
    Bool(bool),
    /// Enumeration value
    Enum(u8),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// Floating point number
    Float(f64),
    /// Interned string
    Str(Key),
}

impl AttrValue {
    /// Zero value of a type.
    pub fn default_for(ty: AttrType) -> Self {
        match ty {
            AttrType::Bool => AttrValue::Bool(false),
            AttrType::Enum => AttrValue::Enum(0),
            AttrType::Int => AttrValue::Int(0),
            AttrType::Long => AttrValue::Long(0),
            AttrType::Float => AttrValue::Float(0.0),
            AttrType::Str => AttrValue::Str(0),
        }
    }

    /// Type of the value.
    pub fn ty(&self) -> AttrType {
        match self {
            AttrValue::Bool(_) => AttrType::Bool,
            AttrValue::Enum(_) => AttrType::Enum,
            AttrValue::Int(_) => AttrType::Int,
            AttrValue::Long(_) => AttrType::Long,
            AttrValue::Float(_) => AttrType::Float,
            AttrValue::Str(_) => AttrType::Str,
        }
    }

    /// The boolean, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            AttrValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// The string key, if this is a `Str`.
    pub fn as_key(&self) -> Option<Key> {
        match *self {
            AttrValue::Str(k) => Some(k),
            _ => None,
        }
    }

    /// Integral value of `Enum`, `Int` and `Long` attributes.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            AttrValue::Enum(v) => Some(i64::from(v)),
            AttrValue::Int(v) => Some(i64::from(v)),
            AttrValue::Long(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Int(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Long(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

/// Storage of one edge kind on one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeSlot {
    /// Single-valued; `0` when unset
    Single(NodeId),
    /// Multi-valued, in insertion order
    Multi(Vec<NodeId>),
}

impl EdgeSlot {
    /// Targets currently stored, in order.
    pub fn targets(&self) -> &[NodeId] {
        match self {
            EdgeSlot::Single(0) => &[],
            EdgeSlot::Single(id) => std::slice::from_ref(id),
            EdgeSlot::Multi(ids) => ids,
        }
    }
}

/// Address of a node together with the factory it came from.
///
/// Edge mutations accept anything convertible into a `NodeRef`. A bare
/// [`NodeId`] carries no factory and is taken to belong to the factory being
/// mutated; a reference obtained from [`Factory::node_ref`](crate::Factory::node_ref)
/// is checked against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    /// Owning factory, if known
    pub factory: Option<FactoryId>,
    /// Node id
    pub id: NodeId,
}

impl From<NodeId> for NodeRef {
    fn from(id: NodeId) -> Self {
        Self { factory: None, id }
    }
}

/// One node of the graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) position: Option<Position>,
    pub(crate) parent: Option<(NodeId, EdgeKind)>,
    pub(crate) attrs: Vec<AttrValue>,
    pub(crate) edges: Vec<EdgeSlot>,
    pub(crate) hash: Cell<Option<u32>>,
}

impl Node {
    pub(crate) fn new(id: NodeId, kind: NodeKind, schema: &Schema) -> Self {
        let (attrs, edges) = match schema.layout(kind) {
            Some(layout) => (
                layout
                    .attrs
                    .iter()
                    .filter_map(|&attr| schema.attr(attr))
                    .map(|def| AttrValue::default_for(def.ty))
                    .collect(),
                layout
                    .edges
                    .iter()
                    .filter_map(|&edge| schema.edge(edge))
                    .map(|def| {
                        if def.cardinality.is_multi() {
                            EdgeSlot::Multi(Vec::new())
                        } else {
                            EdgeSlot::Single(0)
                        }
                    })
                    .collect(),
            ),
            None => (Vec::new(), Vec::new()),
        };
        Self {
            id,
            kind,
            position: None,
            parent: None,
            attrs,
            edges,
            hash: Cell::new(None),
        }
    }

    /// Node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Concrete kind.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Source range, if set.
    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// Owning parent.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent.map(|(parent, _)| parent)
    }

    /// Owning parent and the edge it owns this node through.
    pub fn parent_edge(&self) -> Option<(NodeId, EdgeKind)> {
        self.parent
    }

    /// Attribute values in layout order.
    pub fn attrs(&self) -> &[AttrValue] {
        &self.attrs
    }

    /// Edge slots in layout order.
    pub fn edge_slots(&self) -> &[EdgeSlot] {
        &self.edges
    }

    pub(crate) fn invalidate_hash(&self) {
        self.hash.set(None);
    }
}
