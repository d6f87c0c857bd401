//! Caller-owned cache of the most recently loaded graph.

use crate::config::FactoryConfig;
use crate::error::{Advisory, GraphError, Result};
use crate::graph::Factory;
use crate::schema::Schema;
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

#[derive(Debug)]
struct Cached {
    path: PathBuf,
    modified: SystemTime,
    factory: Factory,
    advisories: Vec<Advisory>,
}

/// Keeps the last graph loaded from disk and reuses it while the file is
/// unchanged.
///
/// Tools that load the same graph repeatedly (once per query or per
/// rule) hold one of these instead of reloading. A new path, or a newer
/// modification time on the same path, triggers a fresh load.
#[derive(Debug)]
pub struct LoadCache {
    schema: Arc<Schema>,
    config: FactoryConfig,
    cached: Option<Cached>,
}

impl LoadCache {
    /// An empty cache producing factories for `schema`.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self::with_config(schema, FactoryConfig::default())
    }

    /// An empty cache producing factories with `config`.
    pub fn with_config(schema: Arc<Schema>, config: FactoryConfig) -> Self {
        Self {
            schema,
            config,
            cached: None,
        }
    }

    /// The graph stored at `path`, loading it if it is not cached or the file
    /// changed since it was cached.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Io`] if the file's metadata cannot be read, and
    /// any error of [`Factory::load`]. A failed load empties the cache.
    pub fn get<P: AsRef<Path>>(&mut self, path: P) -> Result<&mut Factory> {
        let path = path.as_ref();
        let modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| GraphError::io(format!("reading metadata of {}", path.display()), e))?;

        let fresh = self
            .cached
            .as_ref()
            .is_some_and(|c| c.path == path && c.modified == modified);
        if fresh {
            debug!("Reusing cached graph {}", path.display());
        } else {
            self.cached = None;
            let mut factory = Factory::with_config(Arc::clone(&self.schema), self.config.clone());
            let advisories = factory.load_from_path(path)?;
            self.cached = Some(Cached {
                path: path.to_path_buf(),
                modified,
                factory,
                advisories,
            });
        }

        match self.cached.as_mut() {
            Some(cached) => Ok(&mut cached.factory),
            None => Err(GraphError::corrupt("graph cache is empty after load")),
        }
    }

    /// Advisories raised when the cached graph was loaded.
    pub fn advisories(&self) -> &[Advisory] {
        self.cached.as_ref().map_or(&[], |c| c.advisories.as_slice())
    }

    /// Whether `path` is the cached graph. Does not check the file on disk.
    pub fn is_cached<P: AsRef<Path>>(&self, path: P) -> bool {
        self.cached
            .as_ref()
            .is_some_and(|c| c.path == path.as_ref())
    }

    /// Drop the cached graph.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}
