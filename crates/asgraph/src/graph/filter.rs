//! Node visibility filter and its sidecar file.
//!
//! Filtering a node never touches the graph: edges into a filtered node stay in
//! place and are merely masked by the read-path getters. The filtered set is
//! persisted separately from the graph so that one graph file can be viewed
//! through several filters.

use super::factory::Factory;
use super::node::NodeId;
use crate::error::{Advisory, GraphError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{info, warn};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const FILTER_TAG: &[u8; 6] = b"FILTER";

/// Extension of filter sidecar files.
pub const FILTER_EXTENSION: &str = "fjsi";

/// Set of filtered node ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    filtered: BTreeSet<NodeId>,
}

impl Filter {
    /// Whether `id` is filtered.
    pub fn contains(&self, id: NodeId) -> bool {
        self.filtered.contains(&id)
    }

    /// Number of filtered ids.
    pub fn len(&self) -> usize {
        self.filtered.len()
    }

    /// Whether nothing is filtered.
    pub fn is_empty(&self) -> bool {
        self.filtered.is_empty()
    }

    pub(crate) fn insert(&mut self, id: NodeId) {
        self.filtered.insert(id);
    }

    pub(crate) fn remove(&mut self, id: NodeId) {
        self.filtered.remove(&id);
    }

    pub(crate) fn clear(&mut self) {
        self.filtered.clear();
    }
}

/// Sidecar path for a graph file: same base name, `.fjsi` extension.
pub fn filter_path_for(graph: &Path) -> PathBuf {
    graph.with_extension(FILTER_EXTENSION)
}

impl Factory {
    /// Filter or unfilter this node only.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotFound`] if the node does not exist.
    pub fn set_filtered(&mut self, id: NodeId, filtered: bool) -> Result<()> {
        self.get(id)?;
        if filtered {
            self.filter.insert(id);
        } else {
            self.filter.remove(id);
        }
        Ok(())
    }

    /// Whether the node is filtered and filtering is on, matching what
    /// [`is_visible`](Self::is_visible) masks. Unknown ids are not filtered.
    /// The stored set, independent of the switch, is [`filter`](Self::filter).
    pub fn is_filtered(&self, id: NodeId) -> bool {
        self.is_filter_on() && self.filter.contains(id)
    }

    /// The stored filter set.
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Number of filtered nodes.
    pub fn filtered_count(&self) -> usize {
        self.filter.len()
    }

    /// Unfilter every node.
    pub fn clear_filter(&mut self) {
        self.filter.clear();
    }

    /// Filter a node and everything it owns.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotFound`] if the node does not exist.
    pub fn filter_subtree(&mut self, id: NodeId) -> Result<()> {
        self.get(id)?;
        for node in self.owned_subtree(id) {
            self.filter.insert(node);
        }
        Ok(())
    }

    /// Unfilter a node, everything it owns, and its owning ancestors, so the
    /// node becomes reachable again from its root.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotFound`] if the node does not exist.
    pub fn unfilter_with_ancestors(&mut self, id: NodeId) -> Result<()> {
        self.get(id)?;
        for node in self.owned_subtree(id) {
            self.filter.remove(node);
        }
        let mut ancestor = self.parent(id);
        let mut guard = 0usize;
        while let Some(current) = ancestor {
            self.filter.remove(current);
            guard += 1;
            if current == id || guard > self.len() {
                break;
            }
            ancestor = self.parent(current);
        }
        Ok(())
    }

    /// Write the filter: tag, id range, count, ascending ids.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Io`] if the writer fails.
    pub fn write_filter<W: Write>(&self, writer: &mut W) -> Result<()> {
        let io = |e: std::io::Error| GraphError::io("writing filter", e);
        writer.write_all(FILTER_TAG).map_err(io)?;
        writer.write_u32::<LittleEndian>(self.next_id()).map_err(io)?;
        writer
            .write_u32::<LittleEndian>(self.filter.len() as u32)
            .map_err(io)?;
        for &id in &self.filter.filtered {
            writer.write_u32::<LittleEndian>(id).map_err(io)?;
        }
        Ok(())
    }

    /// Replace the filter with one read from `reader`. Ids of nodes that no
    /// longer exist are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::FilterMismatch`] if the stored id range is smaller
    /// than this factory's, [`GraphError::TruncatedStream`] if the input ends
    /// early and [`GraphError::Corrupt`] for a bad tag. The current filter is
    /// unchanged on error.
    pub fn read_filter<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let io = |e: std::io::Error| GraphError::io("filter", e);
        let mut tag = [0u8; 6];
        reader.read_exact(&mut tag).map_err(io)?;
        if &tag != FILTER_TAG {
            return Err(GraphError::corrupt("missing filter tag"));
        }
        let range = reader.read_u32::<LittleEndian>().map_err(io)?;
        if range < self.next_id() {
            return Err(GraphError::FilterMismatch {
                filter_size: range,
                factory_size: self.next_id(),
            });
        }
        let count = reader.read_u32::<LittleEndian>().map_err(io)?;
        let mut filtered = BTreeSet::new();
        for _ in 0..count {
            let id = reader.read_u32::<LittleEndian>().map_err(io)?;
            if self.exists(id) {
                filtered.insert(id);
            }
        }
        self.filter = Filter { filtered };
        Ok(())
    }

    /// Save the filter to a sidecar file.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Io`] if the file cannot be written.
    pub fn save_filter<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|e| GraphError::io(format!("creating {}", path.display()), e))?;
        let mut writer = BufWriter::new(file);
        self.write_filter(&mut writer)?;
        writer
            .flush()
            .map_err(|e| GraphError::io(format!("flushing {}", path.display()), e))?;
        info!("Saved filter with {} nodes to {}", self.filtered_count(), path.display());
        Ok(())
    }

    /// Load a filter from a sidecar file, unconditionally.
    ///
    /// # Errors
    ///
    /// As [`read_filter`](Self::read_filter), plus [`GraphError::Io`] if the
    /// file cannot be opened.
    pub fn load_filter<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| GraphError::io(format!("opening {}", path.display()), e))?;
        self.read_filter(&mut BufReader::new(file))?;
        info!("Loaded filter with {} nodes from {}", self.filtered_count(), path.display());
        Ok(())
    }

    /// Apply the sidecar filter that belongs to `graph`, if it is usable.
    ///
    /// A missing sidecar, or one older than the graph file, is skipped with a
    /// warning and reported as an [`Advisory`]; the current filter is kept.
    ///
    /// # Errors
    ///
    /// Errors from reading an existing, up-to-date sidecar are propagated.
    pub fn load_filter_for_graph<P: AsRef<Path>>(&mut self, graph: P) -> Result<Option<Advisory>> {
        let graph = graph.as_ref();
        let filter = filter_path_for(graph);
        let filter_modified = match std::fs::metadata(&filter).and_then(|m| m.modified()) {
            Ok(time) => time,
            Err(_) => {
                let advisory = Advisory::MissingFilter { filter };
                warn!("{advisory}");
                return Ok(Some(advisory));
            }
        };
        let graph_modified = std::fs::metadata(graph)
            .and_then(|m| m.modified())
            .map_err(|e| GraphError::io(format!("reading metadata of {}", graph.display()), e))?;
        if filter_modified < graph_modified {
            let advisory = Advisory::StaleFilter {
                filter,
                graph: graph.to_path_buf(),
            };
            warn!("{advisory}");
            return Ok(Some(advisory));
        }
        self.load_filter(&filter)?;
        Ok(None)
    }
}
