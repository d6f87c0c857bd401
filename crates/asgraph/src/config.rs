//! Configuration for factories, traversal and similarity scoring.
//!
//! All settings are plain serde structs with sensible defaults, so they can be
//! embedded in a tool's own configuration file or loaded from JSON directly.

use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a [`Factory`](crate::Factory).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// Number of string-table buckets. Each bucket can hold up to 65534 strings
    /// per 16-bit hash value.
    pub string_buckets: u32,

    /// Similarity parameters used by
    /// [`node_similarity`](crate::algorithms::node_similarity)
    pub similarity: SimilarityConfig,

    /// Traversal parameters used by
    /// [`Preorder::for_factory`](crate::algorithms::Preorder::for_factory)
    pub preorder: PreorderConfig,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            string_buckets: 256,
            similarity: SimilarityConfig::default(),
            preorder: PreorderConfig::default(),
        }
    }
}

impl FactoryConfig {
    /// Parse a configuration from JSON text. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Config`] if the text is not valid configuration JSON
    /// or declares zero string buckets.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| GraphError::config("Failed to parse factory configuration", Some(e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Config`] if the file cannot be read or parsed.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            GraphError::config(format!("Failed to read configuration {}", path.display()), Some(e))
        })?;
        Self::from_json_str(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.string_buckets == 0 {
            return Err(GraphError::config::<std::io::Error>(
                "string_buckets must be at least 1",
                None,
            ));
        }
        Ok(())
    }
}

/// Parameters of [`similarity_score`](crate::algorithms::similarity_score).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Floor added to every same-kind score; the attribute part is scaled into
    /// `[minimum, 1.0]`.
    pub minimum: f64,

    /// If any string attribute scores below this, the whole comparison is 0.0.
    pub min_for_strings: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            minimum: 0.1,
            min_for_strings: 0.0,
        }
    }
}

impl SimilarityConfig {
    /// Only near-identical strings count as similar.
    pub fn strict() -> Self {
        Self {
            minimum: 0.0,
            min_for_strings: 0.8,
        }
    }
}

/// Parameters of the pre-order walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreorderConfig {
    /// Keep a visited set and skip nodes reached more than once
    pub safe_mode: bool,

    /// Descend into filtered nodes
    pub visit_filtered: bool,

    /// Also walk the trees of association-edge targets
    pub visit_cross_edge_tree: bool,

    /// Walk special nodes (types, comments) after the ownership tree
    pub visit_special_nodes: bool,

    /// Restrict special nodes to those referenced from visited nodes
    pub special_used_only: bool,
}

impl Default for PreorderConfig {
    fn default() -> Self {
        Self {
            safe_mode: true,
            visit_filtered: false,
            visit_cross_edge_tree: false,
            visit_special_nodes: true,
            special_used_only: false,
        }
    }
}

impl PreorderConfig {
    /// Ownership tree only, no visited-set bookkeeping.
    pub fn unsafe_fast() -> Self {
        Self {
            safe_mode: false,
            visit_special_nodes: false,
            ..Default::default()
        }
    }

    /// Every reachable node, including filtered ones and cross-edge trees.
    pub fn everything() -> Self {
        Self {
            safe_mode: true,
            visit_filtered: true,
            visit_cross_edge_tree: true,
            visit_special_nodes: true,
            special_used_only: false,
        }
    }
}
