//! Error types for asgraph operations.
//!
//! Mutating operations return [`Result<T>`] and fail fast with a [`GraphError`].
//! Read-path getters return `Option` instead of failing when a target is absent
//! or filtered. Conditions that should be reported but never stop processing
//! are modelled separately as [`Advisory`] values.

use crate::graph::{FactoryId, NodeId};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for asgraph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Error type for all graph, schema and serialization operations.
///
/// The first group of variants are structural errors: they indicate a misused or
/// corrupted graph and are always surfaced to the caller. The second group are
/// IO errors raised while saving or loading; a failed load never leaves a
/// partially populated factory behind.
#[derive(Error, Debug)]
pub enum GraphError {
    /// The node was never created or has been destroyed.
    #[error("Node not found: {node_id}")]
    NotFound {
        /// ID of the missing node
        node_id: NodeId,
    },

    /// No arena slot could be allocated for the next node id.
    #[error("Cannot allocate node id {node_id}")]
    IdSpaceExhausted {
        /// Id that could not be handed out
        node_id: NodeId,
    },

    /// The edge kind is not declared for the node's kind, or is used with the
    /// wrong cardinality.
    #[error("Invalid edge kind '{edge}' for node kind '{node_kind}': {reason}")]
    InvalidEdgeKind {
        /// Edge kind name
        edge: String,
        /// Kind of the node the edge was used on
        node_kind: String,
        /// What was wrong
        reason: String,
    },

    /// The target's kind does not provide the capability the edge requires.
    #[error("Edge '{edge}' requires a '{expected}' target, got '{actual}' (node {node_id})")]
    IncompatibleTarget {
        /// Edge kind name
        edge: String,
        /// Required capability
        expected: String,
        /// Actual kind of the target
        actual: String,
        /// Target node
        node_id: NodeId,
    },

    /// The edge target does not exist.
    #[error("Dangling edge target: node {node_id} does not exist")]
    DanglingTarget {
        /// ID of the missing target
        node_id: NodeId,
    },

    /// The edge target belongs to another factory.
    #[error("Node {node_id} belongs to factory {actual}, not factory {expected}")]
    CrossFactoryMismatch {
        /// Target node
        node_id: NodeId,
        /// Factory performing the mutation
        expected: FactoryId,
        /// Factory the target came from
        actual: FactoryId,
    },

    /// An edge cannot be cleared by setting it to the null id.
    #[error("Edge '{edge}' cannot be set to the null node; remove it explicitly")]
    NullNotAllowed {
        /// Edge kind name
        edge: String,
    },

    /// The target already has an owning parent.
    #[error("Node {node_id} is already owned by node {parent}")]
    AlreadyOwned {
        /// Target node
        node_id: NodeId,
        /// Current owning parent
        parent: NodeId,
    },

    /// A set-semantics multi edge already contains the target.
    #[error("Edge '{edge}' already contains node {node_id}")]
    DuplicateTarget {
        /// Edge kind name
        edge: String,
        /// Target node
        node_id: NodeId,
    },

    /// The edge to remove is not the current value.
    #[error("Edge '{edge}' of node {source_id} does not point to {node_id}")]
    EdgeNotPresent {
        /// Edge kind name
        edge: String,
        /// Source node
        source_id: NodeId,
        /// Target that was expected (0 when the slot is empty)
        node_id: NodeId,
    },

    /// A reverse-edge query was issued while the index is inactive.
    #[error("Reverse edges are disabled")]
    ReverseEdgesDisabled,

    /// Unknown attribute name or value of the wrong type.
    #[error("Invalid attribute '{name}' on node kind '{node_kind}': {reason}")]
    InvalidAttribute {
        /// Attribute name
        name: String,
        /// Kind of the node
        node_kind: String,
        /// What was wrong
        reason: String,
    },

    /// The input ended before a complete record was read.
    #[error("Truncated stream while reading {context}")]
    TruncatedStream {
        /// Which part of the file was being read
        context: String,
    },

    /// File type or version does not match the schema.
    #[error("Version mismatch in {field}: expected '{expected}', found '{found}'")]
    VersionMismatch {
        /// Header field that differed
        field: String,
        /// Value declared by the schema
        expected: String,
        /// Value found in the file
        found: String,
    },

    /// A node kind tag is undeclared or abstract.
    #[error("Unknown node kind: {kind}")]
    UnknownNodeKind {
        /// Raw kind tag
        kind: u16,
    },

    /// The stream is well-formed byte-wise but structurally invalid.
    #[error("Corrupt graph data: {message}")]
    Corrupt {
        /// Description of the inconsistency
        message: String,
    },

    /// A filter file covers fewer nodes than the factory holds.
    #[error("Filter covers {filter_size} ids but the factory uses {factory_size}")]
    FilterMismatch {
        /// Id range stored in the filter
        filter_size: u32,
        /// Id range of the factory
        factory_size: u32,
    },

    /// Invalid schema definition.
    #[error("Schema error: {message}")]
    Schema {
        /// Description of the problem
        message: String,
    },

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {message}")]
    Config {
        /// Error details
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Underlying file or stream failure.
    #[error("IO error: {message}")]
    Io {
        /// What was being done
        message: String,
        /// Source error
        #[source]
        source: std::io::Error,
    },
}

impl GraphError {
    /// Create an IO error, mapping an unexpected end of input to
    /// [`GraphError::TruncatedStream`].
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        let message = message.into();
        if source.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::TruncatedStream { context: message }
        } else {
            Self::Io { message, source }
        }
    }

    /// Create a configuration error from a message and optional source.
    pub fn config<E>(message: impl Into<String>, source: Option<E>) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Config {
            message: message.into(),
            source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        }
    }

    /// Create a corrupt-data error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }

    /// Create a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Whether this error was raised by the serializer rather than by a
    /// structural misuse of the graph.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::TruncatedStream { .. }
                | Self::VersionMismatch { .. }
                | Self::UnknownNodeKind { .. }
                | Self::Corrupt { .. }
                | Self::FilterMismatch { .. }
                | Self::Io { .. }
        )
    }
}

/// A non-fatal condition: logged, reported to the caller, never propagated as
/// an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// The filter sidecar is older than the graph it belongs to and was skipped.
    StaleFilter {
        /// Filter file
        filter: PathBuf,
        /// Graph file it was checked against
        graph: PathBuf,
    },
    /// No filter sidecar exists next to the graph.
    MissingFilter {
        /// Expected filter path
        filter: PathBuf,
    },
    /// The file's binary version differs from the schema's, but the layout was
    /// still readable.
    BinaryVersionDiffers {
        /// Version expected by the schema
        expected: String,
        /// Version found in the file
        found: String,
    },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::StaleFilter { filter, graph } => write!(
                f,
                "filter file {} is older than {}; filter ignored",
                filter.display(),
                graph.display()
            ),
            Advisory::MissingFilter { filter } => {
                write!(f, "filter file {} not found; filter ignored", filter.display())
            }
            Advisory::BinaryVersionDiffers { expected, found } => write!(
                f,
                "binary version differs (expected {expected}, found {found}); loaded anyway"
            ),
        }
    }
}
