//! Binary graph format.
//!
//! A graph file is laid out as:
//!
//! 1. the tag `ASGB`;
//! 2. a [`Header`];
//! 3. the string-table section, holding every string marked to save and every
//!    string a live node refers to;
//! 4. the id range (u32): the id the factory would hand out next;
//! 5. one record per live node in id order, closed by an all-zero record.
//!
//! A node record is the node id (u32), its kind (u16) and an optional position,
//! followed by the node's state one capability at a time in linearization
//! order: the capability's booleans packed eight to a byte, its remaining
//! attributes at fixed width, then its edges. A single-valued edge is one u32
//! (0 when unset); a multi-valued edge is a u32 list closed by 0.
//!
//! Loading recreates every node under its stored id and restores the id range,
//! so ids survive a round trip and destroyed ids stay retired, including those
//! above the last live node.

use super::header::Header;
use crate::error::{Advisory, GraphError, Result};
use crate::graph::{AttrValue, EdgeSlot, Factory, Node, NodeId, Position, FIRST_NODE_ID};
use crate::schema::{AttrType, EdgeKind, Schema};
use crate::strtable::{Key, StrTable, StrType};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{info, trace, warn};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

const FILE_TAG: &[u8; 4] = b"ASGB";

impl Factory {
    /// Write the whole graph. Filtered nodes are written too; the filter is
    /// persisted separately.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Io`] if the writer fails.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        let factory = self.suspend_filter();
        let io = |e: std::io::Error| GraphError::io("writing graph", e);

        writer.write_all(FILE_TAG).map_err(io)?;
        Header::for_schema(factory.schema()).write_to(writer)?;

        let referenced = factory.referenced_keys();
        let strings = factory.strings().write_to(writer, |key, ty| {
            ty == StrType::ToSave || referenced.contains(&key)
        })?;
        writer.write_u32::<LittleEndian>(factory.next_id()).map_err(io)?;

        let mut records = 0usize;
        for node in factory.iter() {
            write_node(writer, factory.schema(), node)?;
            records += 1;
        }
        writer.write_u32::<LittleEndian>(0).map_err(io)?;
        writer.write_u16::<LittleEndian>(0).map_err(io)?;

        info!("Saved graph: {records} nodes, {strings} strings");
        Ok(())
    }

    /// String keys used by live nodes: string attributes and position paths.
    fn referenced_keys(&self) -> HashSet<Key> {
        let mut keys = HashSet::new();
        for node in self.nodes.iter().flatten() {
            keys.extend(node.attrs().iter().filter_map(AttrValue::as_key));
            if let Some(position) = node.position() {
                keys.insert(position.path);
            }
        }
        keys.remove(&0);
        keys
    }

    /// Replace the contents of this factory with a graph read from `reader`.
    ///
    /// The factory is cleared first. On error it is cleared again, so a failed
    /// load never leaves a partial graph behind. The reverse-edge index is not
    /// rebuilt; call [`enable_reverse_edges`](Self::enable_reverse_edges)
    /// afterwards if needed.
    ///
    /// # Errors
    ///
    /// - [`GraphError::VersionMismatch`] if the file type or API version differ
    ///   from the schema's
    /// - [`GraphError::UnknownNodeKind`] for an undeclared or abstract kind tag
    /// - [`GraphError::TruncatedStream`] if the input ends early
    /// - [`GraphError::Corrupt`] for a bad tag, an invalid string table, an id
    ///   range below [`FIRST_NODE_ID`], ids out of order or outside the range,
    ///   ids too large to allocate, or a node owned twice
    pub fn load<R: Read>(&mut self, reader: &mut R) -> Result<Vec<Advisory>> {
        self.clear();
        match self.read_graph(reader) {
            Ok(advisories) => Ok(advisories),
            Err(e) => {
                self.clear();
                Err(e)
            }
        }
    }

    fn read_graph<R: Read>(&mut self, reader: &mut R) -> Result<Vec<Advisory>> {
        let io = |e: std::io::Error| GraphError::io("graph tag", e);
        let mut tag = [0u8; 4];
        reader.read_exact(&mut tag).map_err(io)?;
        if &tag != FILE_TAG {
            return Err(GraphError::corrupt("not a graph file"));
        }

        let schema = Arc::clone(self.schema());
        let mut advisories = Vec::new();
        if let Some(advisory) = Header::read_from(reader)?.check(&schema)? {
            advisories.push(advisory);
        }

        self.strings = StrTable::read_from(reader)?;

        let range = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| GraphError::io("id range", e))?;
        if range < FIRST_NODE_ID {
            return Err(GraphError::corrupt(format!("id range {range} below {FIRST_NODE_ID}")));
        }

        let mut last = 0;
        loop {
            let io = |e: std::io::Error| GraphError::io(format!("node record after {last}"), e);
            let id = reader.read_u32::<LittleEndian>().map_err(io)?;
            let kind = reader.read_u16::<LittleEndian>().map_err(io)?;
            if id == 0 && kind == 0 {
                break;
            }
            if id < FIRST_NODE_ID || id <= last {
                return Err(GraphError::corrupt(format!(
                    "node id {id} out of order after {last}"
                )));
            }
            if id >= range {
                return Err(GraphError::corrupt(format!(
                    "node id {id} outside id range {range}"
                )));
            }
            if !schema.is_concrete(kind) {
                return Err(GraphError::UnknownNodeKind { kind });
            }
            self.place(id, kind)
                .map_err(|_| GraphError::corrupt(format!("node id {id} too large to allocate")))?;
            let node = self.node_mut(id)?;
            read_node(reader, &schema, node)?;
            trace!("Read node {id} ({})", schema.kind_name(kind));
            last = id;
        }
        self.next_id = range;

        self.link_loaded(&schema)?;
        self.root = schema.root_kind().and_then(|root_kind| {
            self.nodes
                .iter()
                .flatten()
                .find(|node| node.kind() == root_kind && node.parent().is_none())
                .map(Node::id)
        });

        info!(
            "Loaded graph: {} nodes, {} strings",
            self.len(),
            self.strings().len()
        );
        Ok(advisories)
    }

    /// Restore parent links from owning edges and report dangling targets.
    fn link_loaded(&mut self, schema: &Schema) -> Result<()> {
        let mut owned: Vec<(NodeId, EdgeKind, NodeId)> = Vec::new();
        let mut dangling = 0usize;
        for node in self.nodes.iter().flatten() {
            let Some(layout) = schema.layout(node.kind()) else {
                continue;
            };
            for (&edge, slot) in layout.edges.iter().zip(node.edge_slots()) {
                let owning = schema.edge(edge).is_some_and(|def| def.is_owning());
                for &target in slot.targets() {
                    if !self.exists(target) {
                        warn!(
                            "Dangling target {target} on edge {} of node {}",
                            schema.edge_name(edge),
                            node.id()
                        );
                        dangling += 1;
                    } else if owning {
                        owned.push((node.id(), edge, target));
                    }
                }
            }
        }

        for (source, edge, target) in owned {
            let child = self.node_mut(target)?;
            if let Some((parent, _)) = child.parent {
                return Err(GraphError::corrupt(format!(
                    "node {target} owned by both {parent} and {source}"
                )));
            }
            child.parent = Some((source, edge));
        }
        if dangling > 0 {
            warn!("Loaded graph has {dangling} dangling edge targets");
        }
        Ok(())
    }

    /// Save to a file.
    ///
    /// # Errors
    ///
    /// As [`save`](Self::save), plus [`GraphError::Io`] if the file cannot be
    /// created.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|e| GraphError::io(format!("creating {}", path.display()), e))?;
        let mut writer = BufWriter::new(file);
        self.save(&mut writer)?;
        writer
            .flush()
            .map_err(|e| GraphError::io(format!("flushing {}", path.display()), e))
    }

    /// Load from a file.
    ///
    /// # Errors
    ///
    /// As [`load`](Self::load), plus [`GraphError::Io`] if the file cannot be
    /// opened.
    pub fn load_from_path<P: AsRef<Path>>(&mut self, path: P) -> Result<Vec<Advisory>> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| GraphError::io(format!("opening {}", path.display()), e))?;
        self.load(&mut BufReader::new(file))
    }
}

fn write_node<W: Write>(writer: &mut W, schema: &Schema, node: &Node) -> Result<()> {
    let io = |e: std::io::Error| GraphError::io(format!("writing node {}", node.id()), e);
    writer.write_u32::<LittleEndian>(node.id()).map_err(io)?;
    writer.write_u16::<LittleEndian>(node.kind()).map_err(io)?;

    match node.position() {
        Some(p) => {
            writer.write_u8(1).map_err(io)?;
            for value in [
                p.path,
                p.line,
                p.col,
                p.end_line,
                p.end_col,
                p.wide_line,
                p.wide_col,
                p.wide_end_line,
                p.wide_end_col,
            ] {
                writer.write_u32::<LittleEndian>(value).map_err(io)?;
            }
        }
        None => writer.write_u8(0).map_err(io)?,
    }

    let Some(layout) = schema.layout(node.kind()) else {
        return Ok(());
    };
    for &capability in &layout.capabilities {
        let Some(def) = schema.kind(capability) else {
            continue;
        };
        let slots: Vec<usize> = def
            .attrs
            .iter()
            .filter_map(|&attr| layout.attr_slot(attr))
            .collect();

        let bools: Vec<bool> = slots
            .iter()
            .filter_map(|&slot| node.attrs()[slot].as_bool())
            .collect();
        for chunk in bools.chunks(8) {
            let byte = chunk
                .iter()
                .enumerate()
                .fold(0u8, |byte, (bit, &set)| byte | (u8::from(set) << bit));
            writer.write_u8(byte).map_err(io)?;
        }

        for &slot in &slots {
            match node.attrs()[slot] {
                AttrValue::Bool(_) => {}
                AttrValue::Enum(v) => writer.write_u8(v).map_err(io)?,
                AttrValue::Int(v) => writer.write_i32::<LittleEndian>(v).map_err(io)?,
                AttrValue::Long(v) => writer.write_i64::<LittleEndian>(v).map_err(io)?,
                AttrValue::Float(v) => writer.write_f64::<LittleEndian>(v).map_err(io)?,
                AttrValue::Str(k) => writer.write_u32::<LittleEndian>(k).map_err(io)?,
            }
        }

        for &edge in &def.edges {
            let Some(slot) = layout.edge_slot(edge) else {
                continue;
            };
            match &node.edge_slots()[slot] {
                EdgeSlot::Single(target) => {
                    writer.write_u32::<LittleEndian>(*target).map_err(io)?;
                }
                EdgeSlot::Multi(targets) => {
                    for &target in targets {
                        writer.write_u32::<LittleEndian>(target).map_err(io)?;
                    }
                    writer.write_u32::<LittleEndian>(0).map_err(io)?;
                }
            }
        }
    }
    Ok(())
}

fn read_node<R: Read>(reader: &mut R, schema: &Schema, node: &mut Node) -> Result<()> {
    let id = node.id();
    let io = |e: std::io::Error| GraphError::io(format!("node {id}"), e);

    match reader.read_u8().map_err(io)? {
        0 => {}
        1 => {
            let mut v = [0u32; 9];
            for value in v.iter_mut() {
                *value = reader.read_u32::<LittleEndian>().map_err(io)?;
            }
            node.position = Some(Position {
                path: v[0],
                line: v[1],
                col: v[2],
                end_line: v[3],
                end_col: v[4],
                wide_line: v[5],
                wide_col: v[6],
                wide_end_line: v[7],
                wide_end_col: v[8],
            });
        }
        flag => {
            return Err(GraphError::corrupt(format!(
                "node {id} has position flag {flag}"
            )))
        }
    }

    let Some(layout) = schema.layout(node.kind()) else {
        return Ok(());
    };
    for &capability in &layout.capabilities {
        let Some(def) = schema.kind(capability) else {
            continue;
        };
        let slots: Vec<(usize, AttrType)> = def
            .attrs
            .iter()
            .filter_map(|&attr| Some((layout.attr_slot(attr)?, schema.attr(attr)?.ty)))
            .collect();

        let bool_slots: Vec<usize> = slots
            .iter()
            .filter(|(_, ty)| *ty == AttrType::Bool)
            .map(|&(slot, _)| slot)
            .collect();
        for chunk in bool_slots.chunks(8) {
            let byte = reader.read_u8().map_err(io)?;
            for (bit, &slot) in chunk.iter().enumerate() {
                node.attrs[slot] = AttrValue::Bool(byte & (1 << bit) != 0);
            }
        }

        for &(slot, ty) in &slots {
            let value = match ty {
                AttrType::Bool => continue,
                AttrType::Enum => AttrValue::Enum(reader.read_u8().map_err(io)?),
                AttrType::Int => AttrValue::Int(reader.read_i32::<LittleEndian>().map_err(io)?),
                AttrType::Long => AttrValue::Long(reader.read_i64::<LittleEndian>().map_err(io)?),
                AttrType::Float => {
                    AttrValue::Float(reader.read_f64::<LittleEndian>().map_err(io)?)
                }
                AttrType::Str => AttrValue::Str(reader.read_u32::<LittleEndian>().map_err(io)?),
            };
            node.attrs[slot] = value;
        }

        for &edge in &def.edges {
            let Some(slot) = layout.edge_slot(edge) else {
                continue;
            };
            match &mut node.edges[slot] {
                EdgeSlot::Single(target) => {
                    *target = reader.read_u32::<LittleEndian>().map_err(io)?;
                }
                EdgeSlot::Multi(targets) => loop {
                    let target = reader.read_u32::<LittleEndian>().map_err(io)?;
                    if target == 0 {
                        break;
                    }
                    targets.push(target);
                },
            }
        }
    }
    Ok(())
}
