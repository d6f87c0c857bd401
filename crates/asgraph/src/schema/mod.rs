//! Graph schemas: node kinds, capabilities, attributes and edge kinds.
//!
//! The engine is generic over the language being modelled. A language supplies
//! a [`Schema`] describing which node kinds exist, which capabilities
//! (abstract base kinds) each composes, and which attributes and edges each
//! capability contributes.
//!
//! For every concrete kind the schema precomputes a *capability list*: the
//! kind's ancestors in depth-first order, bases before derived kinds, each
//! appearing once even when reached through several paths. Every per-node
//! operation (save, load, destroy, hash, traversal) walks that list, so state
//! contributed by a shared capability is processed exactly once.
//!
//! ```
//! use asgraph::schema::{AttrType, Cardinality, Ownership, SchemaBuilder};
//!
//! let mut builder = SchemaBuilder::new("MiniLanguage", "1.0", "1.0");
//! let base = builder.abstract_kind("Base", &[]);
//! let expr = builder.abstract_kind("Expression", &[base]);
//! let ident = builder.kind("Identifier", &[expr]);
//! builder.attr(ident, "name", AttrType::Str);
//! let ret = builder.kind("Return", &[base]);
//! builder.edge(ret, "Value", expr, Cardinality::Single, Ownership::Owning);
//! let schema = builder.build().unwrap();
//!
//! assert!(schema.is_kind_of(ident, expr));
//! assert_eq!(schema.kind_name(ident), "Identifier");
//! ```

pub mod demo;

use crate::error::{GraphError, Result};
use std::collections::{HashMap, HashSet};

/// Index of a node kind within its schema. Written to disk as a 16-bit tag.
pub type NodeKind = u16;

/// Index of an edge kind within its schema.
pub type EdgeKind = u16;

/// Index of an attribute definition within its schema.
pub type AttrId = u16;

/// Value type of a scalar attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrType {
    /// Boolean flag, bit-packed on disk
    Bool,
    /// Small enumeration (one byte)
    Enum,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    /// 64-bit float
    Float,
    /// Interned string
    Str,
}

/// How many targets an edge holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// One target or none
    Single,
    /// Ordered list, duplicates allowed
    Multi,
    /// Ordered list, duplicates rejected
    MultiSet,
}

impl Cardinality {
    /// Whether the edge holds a list of targets.
    pub fn is_multi(self) -> bool {
        !matches!(self, Cardinality::Single)
    }
}

/// Whether an edge participates in the ownership tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// The source owns the target: the target gets a parent link
    Owning,
    /// Plain reference
    Association,
}

/// A node kind: concrete, or an abstract capability.
#[derive(Debug, Clone)]
pub struct KindDef {
    /// Kind name
    pub name: String,
    /// Abstract kinds cannot be instantiated
    pub is_abstract: bool,
    /// Nodes that live outside the ownership tree (types, comments)
    pub special: bool,
    /// Direct base kinds
    pub bases: Vec<NodeKind>,
    /// Attributes declared by this kind itself
    pub attrs: Vec<AttrId>,
    /// Edges declared by this kind itself
    pub edges: Vec<EdgeKind>,
}

/// A scalar attribute declared on a kind.
#[derive(Debug, Clone)]
pub struct AttrDef {
    /// Declaring kind
    pub owner: NodeKind,
    /// Attribute name, unique among the attributes a concrete kind inherits
    pub name: String,
    /// Value type
    pub ty: AttrType,
}

/// An edge kind declared on a kind.
#[derive(Debug, Clone)]
pub struct EdgeDef {
    /// Declaring kind
    pub owner: NodeKind,
    /// Short name, e.g. `Expression`
    pub name: String,
    /// Qualified name, e.g. `ReturnStatement_Expression`
    pub qualified_name: String,
    /// Capability every target must provide
    pub target: NodeKind,
    /// Single or multi-valued
    pub cardinality: Cardinality,
    /// Owning or association
    pub ownership: Ownership,
}

impl EdgeDef {
    /// Whether the edge is an owning edge.
    pub fn is_owning(&self) -> bool {
        self.ownership == Ownership::Owning
    }
}

/// Precomputed slot layout of one kind.
#[derive(Debug, Clone, Default)]
pub struct KindLayout {
    /// Capability list: ancestors first, the kind itself last, no repeats
    pub capabilities: Vec<NodeKind>,
    /// Attribute slots in capability order
    pub attrs: Vec<AttrId>,
    /// Edge slots in capability order
    pub edges: Vec<EdgeKind>,
    attr_slots: HashMap<AttrId, usize>,
    edge_slots: HashMap<EdgeKind, usize>,
}

impl KindLayout {
    /// Slot index of an attribute, if the kind has it.
    pub fn attr_slot(&self, attr: AttrId) -> Option<usize> {
        self.attr_slots.get(&attr).copied()
    }

    /// Slot index of an edge, if the kind has it.
    pub fn edge_slot(&self, edge: EdgeKind) -> Option<usize> {
        self.edge_slots.get(&edge).copied()
    }
}

/// A complete, validated language schema.
#[derive(Debug, Clone)]
pub struct Schema {
    file_type: String,
    api_version: String,
    binary_version: String,
    kinds: Vec<KindDef>,
    attrs: Vec<AttrDef>,
    edges: Vec<EdgeDef>,
    layouts: Vec<KindLayout>,
    root: Option<NodeKind>,
    kinds_by_name: HashMap<String, NodeKind>,
    edges_by_name: HashMap<String, EdgeKind>,
}

impl Schema {
    /// File-type tag written to graph headers.
    pub fn file_type(&self) -> &str {
        &self.file_type
    }

    /// API version written to graph headers.
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Binary version written to graph headers.
    pub fn binary_version(&self) -> &str {
        &self.binary_version
    }

    /// Kind created automatically as the root of every factory.
    pub fn root_kind(&self) -> Option<NodeKind> {
        self.root
    }

    /// Number of declared kinds.
    pub fn kind_count(&self) -> usize {
        self.kinds.len()
    }

    /// Definition of a kind.
    pub fn kind(&self, kind: NodeKind) -> Option<&KindDef> {
        self.kinds.get(usize::from(kind))
    }

    /// Name of a kind, or `"<unknown>"`.
    pub fn kind_name(&self, kind: NodeKind) -> &str {
        self.kind(kind).map_or("<unknown>", |k| k.name.as_str())
    }

    /// Look a kind up by name.
    pub fn kind_by_name(&self, name: &str) -> Option<NodeKind> {
        self.kinds_by_name.get(name).copied()
    }

    /// Whether `kind` is declared and instantiable.
    pub fn is_concrete(&self, kind: NodeKind) -> bool {
        self.kind(kind).is_some_and(|k| !k.is_abstract)
    }

    /// Whether nodes of `kind` are special (outside the ownership tree).
    pub fn is_special(&self, kind: NodeKind) -> bool {
        self.kind(kind).is_some_and(|k| k.special)
    }

    /// Whether `kind` is `capability` or composes it.
    pub fn is_kind_of(&self, kind: NodeKind, capability: NodeKind) -> bool {
        self.layout(kind)
            .is_some_and(|layout| layout.capabilities.contains(&capability))
    }

    /// Slot layout of a kind.
    pub fn layout(&self, kind: NodeKind) -> Option<&KindLayout> {
        self.layouts.get(usize::from(kind))
    }

    /// Definition of an attribute.
    pub fn attr(&self, attr: AttrId) -> Option<&AttrDef> {
        self.attrs.get(usize::from(attr))
    }

    /// Find an attribute of `kind` (own or inherited) by name.
    pub fn attr_by_name(&self, kind: NodeKind, name: &str) -> Option<AttrId> {
        self.layout(kind)?
            .attrs
            .iter()
            .copied()
            .find(|&attr| self.attrs[usize::from(attr)].name == name)
    }

    /// Number of declared edge kinds.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Definition of an edge kind.
    pub fn edge(&self, edge: EdgeKind) -> Option<&EdgeDef> {
        self.edges.get(usize::from(edge))
    }

    /// Qualified name of an edge kind, or `"<unknown>"`.
    pub fn edge_name(&self, edge: EdgeKind) -> &str {
        self.edge(edge)
            .map_or("<unknown>", |e| e.qualified_name.as_str())
    }

    /// Look an edge kind up by qualified name (`Owner_Name`).
    pub fn edge_by_name(&self, qualified_name: &str) -> Option<EdgeKind> {
        self.edges_by_name.get(qualified_name).copied()
    }

    /// Edge kinds whose targets may be nodes of `kind`.
    pub fn possible_edges(&self, kind: NodeKind) -> Vec<EdgeKind> {
        (0..self.edges.len() as EdgeKind)
            .filter(|&edge| self.is_possible_edge(kind, edge))
            .collect()
    }

    /// Whether a node of `kind` can be the target of `edge`.
    pub fn is_possible_edge(&self, kind: NodeKind, edge: EdgeKind) -> bool {
        self.edge(edge)
            .is_some_and(|def| self.is_kind_of(kind, def.target))
    }

    /// Whether two schemas describe the same file format.
    pub fn is_compatible_with(&self, other: &Schema) -> bool {
        self.file_type == other.file_type
            && self.api_version == other.api_version
            && self.kinds.len() == other.kinds.len()
            && self.edges.len() == other.edges.len()
            && self
                .kinds
                .iter()
                .zip(&other.kinds)
                .all(|(a, b)| a.name == b.name)
    }
}

/// Incremental schema construction.
///
/// Kinds must be declared after their bases; ids are handed out in
/// declaration order. Problems are collected and reported by
/// [`build`](Self::build).
#[derive(Debug)]
pub struct SchemaBuilder {
    file_type: String,
    api_version: String,
    binary_version: String,
    kinds: Vec<KindDef>,
    attrs: Vec<AttrDef>,
    edges: Vec<EdgeDef>,
    root: Option<NodeKind>,
    problems: Vec<String>,
}

impl SchemaBuilder {
    /// Start a schema with the given header values.
    pub fn new(
        file_type: impl Into<String>,
        api_version: impl Into<String>,
        binary_version: impl Into<String>,
    ) -> Self {
        Self {
            file_type: file_type.into(),
            api_version: api_version.into(),
            binary_version: binary_version.into(),
            kinds: Vec::new(),
            attrs: Vec::new(),
            edges: Vec::new(),
            root: None,
            problems: Vec::new(),
        }
    }

    fn push_kind(&mut self, name: &str, bases: &[NodeKind], is_abstract: bool) -> NodeKind {
        let id = self.kinds.len() as NodeKind;
        for &base in bases {
            if usize::from(base) >= self.kinds.len() {
                self.problems
                    .push(format!("kind '{name}' refers to undeclared base {base}"));
            }
        }
        self.kinds.push(KindDef {
            name: name.to_string(),
            is_abstract,
            special: false,
            bases: bases.to_vec(),
            attrs: Vec::new(),
            edges: Vec::new(),
        });
        id
    }

    /// Declare an abstract capability.
    pub fn abstract_kind(&mut self, name: &str, bases: &[NodeKind]) -> NodeKind {
        self.push_kind(name, bases, true)
    }

    /// Declare a concrete, instantiable kind.
    pub fn kind(&mut self, name: &str, bases: &[NodeKind]) -> NodeKind {
        self.push_kind(name, bases, false)
    }

    /// Mark a kind as special: it lives outside the ownership tree.
    pub fn special(&mut self, kind: NodeKind) -> &mut Self {
        match self.kinds.get_mut(usize::from(kind)) {
            Some(def) => def.special = true,
            None => self.problems.push(format!("cannot mark undeclared kind {kind} special")),
        }
        self
    }

    /// Declare the kind created as every factory's root.
    pub fn root(&mut self, kind: NodeKind) -> &mut Self {
        self.root = Some(kind);
        self
    }

    /// Declare an attribute on `kind`.
    pub fn attr(&mut self, kind: NodeKind, name: &str, ty: AttrType) -> AttrId {
        let id = self.attrs.len() as AttrId;
        match self.kinds.get_mut(usize::from(kind)) {
            Some(def) => def.attrs.push(id),
            None => self
                .problems
                .push(format!("attribute '{name}' declared on undeclared kind {kind}")),
        }
        self.attrs.push(AttrDef {
            owner: kind,
            name: name.to_string(),
            ty,
        });
        id
    }

    /// Declare an edge kind on `owner` whose targets must provide `target`.
    pub fn edge(
        &mut self,
        owner: NodeKind,
        name: &str,
        target: NodeKind,
        cardinality: Cardinality,
        ownership: Ownership,
    ) -> EdgeKind {
        let id = self.edges.len() as EdgeKind;
        let owner_name = match self.kinds.get_mut(usize::from(owner)) {
            Some(def) => {
                def.edges.push(id);
                def.name.clone()
            }
            None => {
                self.problems
                    .push(format!("edge '{name}' declared on undeclared kind {owner}"));
                String::new()
            }
        };
        self.edges.push(EdgeDef {
            owner,
            name: name.to_string(),
            qualified_name: format!("{owner_name}_{name}"),
            target,
            cardinality,
            ownership,
        });
        id
    }

    /// Validate the declarations and compute every kind's layout.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Schema`] listing every problem found: undeclared
    /// references, duplicate names, an abstract root, or more kinds than fit in
    /// a 16-bit tag.
    pub fn build(self) -> Result<Schema> {
        let mut problems = self.problems;
        if self.kinds.len() > usize::from(u16::MAX) || self.edges.len() > usize::from(u16::MAX) {
            problems.push("too many kinds or edges for 16-bit tags".to_string());
        }

        let mut kinds_by_name = HashMap::new();
        for (id, kind) in self.kinds.iter().enumerate() {
            if kinds_by_name.insert(kind.name.clone(), id as NodeKind).is_some() {
                problems.push(format!("duplicate kind name '{}'", kind.name));
            }
            if kind.bases.iter().any(|&base| usize::from(base) >= id) {
                problems.push(format!("kind '{}' must be declared after its bases", kind.name));
            }
        }

        let mut edges_by_name = HashMap::new();
        for (id, edge) in self.edges.iter().enumerate() {
            if edges_by_name
                .insert(edge.qualified_name.clone(), id as EdgeKind)
                .is_some()
            {
                problems.push(format!("duplicate edge name '{}'", edge.qualified_name));
            }
            if usize::from(edge.target) >= self.kinds.len() {
                problems.push(format!(
                    "edge '{}' targets undeclared kind {}",
                    edge.qualified_name, edge.target
                ));
            }
        }

        if let Some(root) = self.root {
            if self.kinds.get(usize::from(root)).map_or(true, |k| k.is_abstract) {
                problems.push(format!("root kind {root} must be a declared concrete kind"));
            }
        }

        if !problems.is_empty() {
            return Err(GraphError::schema(problems.join("; ")));
        }

        let layouts: Vec<KindLayout> = (0..self.kinds.len())
            .map(|kind| layout_for(&self.kinds, kind as NodeKind))
            .collect();

        for (kind, layout) in layouts.iter().enumerate() {
            let mut names = HashSet::new();
            for &attr in &layout.attrs {
                let name = &self.attrs[usize::from(attr)].name;
                if !names.insert(name.as_str()) {
                    problems.push(format!(
                        "kind '{}' inherits attribute '{name}' twice",
                        self.kinds[kind].name
                    ));
                }
            }
        }
        if !problems.is_empty() {
            return Err(GraphError::schema(problems.join("; ")));
        }

        Ok(Schema {
            file_type: self.file_type,
            api_version: self.api_version,
            binary_version: self.binary_version,
            kinds: self.kinds,
            attrs: self.attrs,
            edges: self.edges,
            layouts,
            root: self.root,
            kinds_by_name,
            edges_by_name,
        })
    }
}

fn layout_for(kinds: &[KindDef], kind: NodeKind) -> KindLayout {
    let mut capabilities = Vec::new();
    let mut seen = HashSet::new();
    linearize(kinds, kind, &mut seen, &mut capabilities);

    let mut layout = KindLayout {
        capabilities,
        ..Default::default()
    };
    for &cap in &layout.capabilities {
        let def = &kinds[usize::from(cap)];
        layout.attrs.extend(&def.attrs);
        layout.edges.extend(&def.edges);
    }
    layout.attr_slots = layout
        .attrs
        .iter()
        .enumerate()
        .map(|(slot, &attr)| (attr, slot))
        .collect();
    layout.edge_slots = layout
        .edges
        .iter()
        .enumerate()
        .map(|(slot, &edge)| (edge, slot))
        .collect();
    layout
}

fn linearize(
    kinds: &[KindDef],
    kind: NodeKind,
    seen: &mut HashSet<NodeKind>,
    out: &mut Vec<NodeKind>,
) {
    if !seen.insert(kind) {
        return;
    }
    for &base in &kinds[usize::from(kind)].bases {
        linearize(kinds, base, seen, out);
    }
    out.push(kind);
}
