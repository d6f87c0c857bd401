//! # asgraph
//!
//! Storage engine for abstract semantic graphs: the typed, attributed node
//! graphs that language front ends produce and analysis tools consume.
//!
//! ## Core Principles
//!
//! - **Language Agnostic**: a [`Schema`] describes the node kinds; the engine handles the rest
//! - **Dense Identity**: nodes are addressed by small integer ids, stable across save and load
//! - **Explicit Over Implicit**: reverse edges, filters and caches exist only when asked for
//! - **Fail Fast**: structural misuse is an error; only advisory conditions are tolerated
//!
//! ## Architecture
//!
//! ```text
//! Tools (filters, dumpers, metrics)
//!     ↓
//! Algorithms (pre-order walk, hashing, similarity, deep copy)
//!     ↓
//! Factory (nodes, typed edges, filter, reverse-edge index)
//!     ↓
//! Schema + String table
//!     ↓
//! Binary format (graph file, filter sidecar)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use asgraph::schema::demo;
//! use asgraph::Factory;
//!
//! let js = demo::javascript().unwrap();
//! let mut factory = Factory::new(js.schema.clone());
//!
//! let ret = factory.create(js.return_statement).unwrap();
//! let ident = factory.create(js.identifier).unwrap();
//! factory.set_str(ident, js.name, "result").unwrap();
//! factory.set_edge(ret, js.return_statement_expression, ident).unwrap();
//!
//! let mut bytes = Vec::new();
//! factory.save(&mut bytes).unwrap();
//!
//! let mut loaded = Factory::new(js.schema.clone());
//! loaded.load(&mut bytes.as_slice()).unwrap();
//! loaded.enable_reverse_edges(None);
//! let sources: Vec<_> = loaded
//!     .reverse_query(ident, js.return_statement_expression)
//!     .unwrap()
//!     .collect();
//! assert_eq!(sources, vec![ret]);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod algorithms;
pub mod config;
pub mod error;
pub mod graph;
pub mod io;
pub mod schema;
pub mod strtable;

// Re-export main types
pub use config::{FactoryConfig, PreorderConfig, SimilarityConfig};
pub use error::{Advisory, GraphError, Result};
pub use graph::{
    filter_path_for, AttrValue, EdgeSlot, Factory, FactoryId, Node, NodeId, NodeRef, Position,
    FIRST_NODE_ID,
};
pub use io::LoadCache;
pub use schema::{
    AttrId, AttrType, Cardinality, EdgeKind, NodeKind, Ownership, Schema, SchemaBuilder,
};
pub use strtable::{Key, KeyMap, StrTable, StrType};
