//! Graph algorithms built on the public factory surface: pre-order
//! traversal, structural hashing and similarity, and cross-factory deep copy.

pub mod deep_copy;
pub mod preorder;
pub mod similarity;

pub use deep_copy::{deep_copy, CopyMap};
pub use preorder::{Preorder, Visitor};
pub use similarity::{levenshtein, node_hash, node_similarity, similarity_score, string_similarity};
