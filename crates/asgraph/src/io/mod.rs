//! Persistence: the binary graph format and a reload cache.
//!
//! The save and load entry points are methods on [`Factory`](crate::Factory):
//! [`save`](crate::Factory::save), [`load`](crate::Factory::load) and their
//! path-based variants. Filter sidecars live in [`crate::graph::filter`].

mod binary;
pub mod cache;
pub mod header;

pub use cache::LoadCache;
pub use header::Header;
