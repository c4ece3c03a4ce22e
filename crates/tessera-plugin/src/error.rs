//! Error types for the plugin crate.

use tessera_common::Tag;
use thiserror::Error;

use crate::{NodeId, NodeKind};

/// Errors that can occur while decoding, encoding or mutating a plugin.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] tessera_common::Error),

    /// The stream does not start with a header record.
    #[error("not a valid plugin: expected TES4 header record, found {found}")]
    NotAPlugin { found: Tag },

    /// Bytes consumed by a node's children disagree with its declared size.
    #[error("size mismatch at offset {offset:#x}: declared {expected} bytes, consumed {actual}")]
    SizeMismatch {
        offset: usize,
        expected: usize,
        actual: usize,
    },

    /// The stream ends before a node does.
    #[error("truncated plugin: node at offset {offset:#x} runs past the end of the data")]
    Truncated { offset: usize },

    /// A compressed record could not be inflated.
    #[error("record {form_id:#010X}: decompression failed: {message}")]
    Decompression { form_id: u32, message: String },

    /// A record could not be deflated.
    #[error("record {form_id:#010X}: compression failed: {message}")]
    Compression { form_id: u32, message: String },

    /// The child kind is not allowed under the parent kind.
    #[error("a {parent} node cannot contain a {child} node")]
    InvalidChildType { parent: NodeKind, child: NodeKind },

    /// The node already has a parent.
    #[error("node {0} is already attached; detach it first")]
    AlreadyAttached(NodeId),

    /// Attaching the node would make it its own ancestor.
    #[error("node {0} cannot be attached beneath itself")]
    Cycle(NodeId),

    /// The node is not a direct child of the given parent.
    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    /// Groups nest deeper than [`MAX_GROUP_NESTING`](crate::format::MAX_GROUP_NESTING).
    #[error("groups nested deeper than {limit} levels")]
    TooDeep { limit: usize },

    /// The plugin node itself cannot be moved, removed or cloned.
    #[error("operation not allowed on the plugin node")]
    RootNode,

    /// The handle is stale or was never issued by this plugin.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// The node exists but is of a different kind.
    #[error("expected a {expected} node, found a {found} node")]
    WrongNodeKind { expected: NodeKind, found: NodeKind },

    /// A size does not fit the on-disk field that stores it.
    #[error("payload of {size} bytes is too large to encode")]
    PayloadTooLarge { size: usize },
}

/// Result type for plugin operations.
pub type Result<T> = std::result::Result<T, Error>;
