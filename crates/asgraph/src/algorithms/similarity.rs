//! Structural node hashing and attribute-based similarity.

use crate::config::SimilarityConfig;
use crate::error::Result;
use crate::graph::{AttrValue, Factory, NodeId};
use log::trace;
use std::collections::HashSet;

/// Structural hash of a node: its kind name and attribute values.
///
/// Strings contribute their text, not their keys, so equal nodes in different
/// factories hash equally. Positions and edges do not contribute. The result
/// is cached on the node until one of its attributes changes.
///
/// If `id` is already in `visited` the hash is `0` and nothing is computed;
/// otherwise `id` is added to `visited`.
///
/// # Errors
///
/// Returns [`GraphError::NotFound`](crate::GraphError::NotFound) if the node
/// does not exist.
pub fn node_hash(factory: &Factory, id: NodeId, visited: &mut HashSet<NodeId>) -> Result<u32> {
    if !visited.insert(id) {
        return Ok(0);
    }
    let node = factory.get(id)?;
    if let Some(hash) = node.hash.get() {
        trace!("Hash cache hit for node {id}");
        return Ok(hash);
    }

    let mut hasher = blake3::Hasher::new();
    hasher.update(factory.schema().kind_name(node.kind()).as_bytes());
    hasher.update(&[0]);
    for value in node.attrs() {
        match *value {
            AttrValue::Bool(v) => hasher.update(&[0, u8::from(v)]),
            AttrValue::Enum(v) => hasher.update(&[1, v]),
            AttrValue::Int(v) => hasher.update(&[2]).update(&v.to_le_bytes()),
            AttrValue::Long(v) => hasher.update(&[3]).update(&v.to_le_bytes()),
            AttrValue::Float(v) => hasher.update(&[4]).update(&v.to_bits().to_le_bytes()),
            AttrValue::Str(key) => {
                let text = factory.strings().resolve(key);
                hasher
                    .update(&[5])
                    .update(&(text.len() as u32).to_le_bytes())
                    .update(text.as_bytes())
            }
        };
    }
    let digest = hasher.finalize();
    let bytes = digest.as_bytes();
    let hash = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    node.hash.set(Some(hash));
    Ok(hash)
}

/// Similarity of two nodes in `[0, 1]`, possibly from different factories.
///
/// Nodes of different kinds score `0.0`; same-kind nodes without attributes
/// score `1.0`. Otherwise every attribute contributes a term: `1` or `0` for
/// equality of scalars, [`string_similarity`] for strings. If a string term
/// falls below `config.min_for_strings` the score is `0.0`. The summed terms
/// are scaled into `[config.minimum, 1]`.
///
/// # Errors
///
/// Returns [`GraphError::NotFound`](crate::GraphError::NotFound) if either
/// node does not exist.
pub fn similarity_score(
    left: &Factory,
    left_id: NodeId,
    right: &Factory,
    right_id: NodeId,
    config: &SimilarityConfig,
) -> Result<f64> {
    let a = left.get(left_id)?;
    let b = right.get(right_id)?;
    if left.schema().kind_name(a.kind()) != right.schema().kind_name(b.kind())
        || a.attrs().len() != b.attrs().len()
    {
        return Ok(0.0);
    }
    let count = a.attrs().len();
    if count == 0 {
        return Ok(1.0);
    }

    let mut matched = 0.0;
    for (x, y) in a.attrs().iter().zip(b.attrs()) {
        match (*x, *y) {
            (AttrValue::Str(kx), AttrValue::Str(ky)) => {
                let term = string_similarity(left.strings().resolve(kx), right.strings().resolve(ky));
                if term < config.min_for_strings {
                    return Ok(0.0);
                }
                matched += term;
            }
            _ if x == y => matched += 1.0,
            _ => {}
        }
    }
    let score = matched / (count as f64 / (1.0 - config.minimum)) + config.minimum;
    Ok(score.clamp(0.0, 1.0))
}

/// [`similarity_score`] with the similarity settings configured on `left`.
///
/// # Errors
///
/// As [`similarity_score`].
pub fn node_similarity(
    left: &Factory,
    left_id: NodeId,
    right: &Factory,
    right_id: NodeId,
) -> Result<f64> {
    similarity_score(left, left_id, right, right_id, &left.config().similarity)
}

/// `1 - levenshtein(a, b) / max(len(a), len(b), 1)`, lengths in characters.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count()).max(1);
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Edit distance between two strings, counted in characters.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}
