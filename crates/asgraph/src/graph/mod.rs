//! In-memory graph: nodes, typed edges, filter and reverse-edge index.
//!
//! A [`Factory`] owns every node of one graph. Nodes are addressed by dense
//! [`NodeId`]s and carry scalar attributes and typed edges as laid out by the
//! factory's [`Schema`](crate::schema::Schema). Owning edges form a forest;
//! association edges may point anywhere inside the same factory.

mod edges;
mod factory;
pub mod filter;
mod node;
pub mod reverse;

pub use factory::{Factory, FilterSuspended};
pub use filter::{filter_path_for, Filter, FILTER_EXTENSION};
pub use node::{AttrValue, EdgeSlot, FactoryId, Node, NodeId, NodeRef, Position, FIRST_NODE_ID};
pub use reverse::{EdgeSelector, ReverseEdges, ReverseIter, ReverseQuery};
