//! Node handles and node payloads.

use std::cell::Cell;
use std::fmt;

use tessera_common::Tag;
use tessera_schema::SubrecordSchemaId;

use crate::format::{ESCAPE_LEN, MAX_SHORT_SUBRECORD, SUBRECORD_HEADER_LEN};
use crate::{GroupHeader, RecordHeader};

/// Handle to a node inside a [`Plugin`](crate::Plugin).
///
/// Handles carry a generation, so a handle to a deleted node never aliases
/// a node that later reuses its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// The closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Plugin,
    Group,
    Record,
    Subrecord,
}

impl NodeKind {
    /// Whether a node of this kind may directly contain `child`.
    pub fn can_contain(self, child: NodeKind) -> bool {
        match self {
            Self::Plugin | Self::Group => matches!(child, Self::Group | Self::Record),
            Self::Record => child == Self::Subrecord,
            Self::Subrecord => false,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Plugin => "plugin",
            Self::Group => "group",
            Self::Record => "record",
            Self::Subrecord => "subrecord",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Schema attachment state of a subrecord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaSlot {
    /// Not looked up yet.
    #[default]
    Unresolved,
    /// Looked up; the schema has no layout for it.
    Missing,
    /// Looked up; coordinates of the matching layout.
    Matched(SubrecordSchemaId),
}

/// A leaf node: a tag and its raw payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Subrecord {
    tag: Tag,
    data: Vec<u8>,
    schema: Cell<SchemaSlot>,
}

impl Subrecord {
    pub fn new(tag: Tag, data: Vec<u8>) -> Self {
        Self {
            tag,
            data,
            schema: Cell::new(SchemaSlot::Unresolved),
        }
    }

    #[inline]
    pub fn tag(&self) -> Tag {
        self.tag
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the payload needs the long-form escape encoding.
    #[inline]
    pub fn is_long_form(&self) -> bool {
        self.data.len() > MAX_SHORT_SUBRECORD
    }

    /// On-disk size including the header and any escape prefix.
    pub fn total_size(&self) -> usize {
        let prefix = if self.is_long_form() { ESCAPE_LEN } else { 0 };
        prefix + SUBRECORD_HEADER_LEN + self.data.len()
    }

    /// The payload up to the first NUL, decoded leniently.
    pub fn as_cstr(&self) -> String {
        let end = nul_position(&self.data);
        String::from_utf8_lossy(&self.data[..end]).into_owned()
    }

    #[inline]
    pub fn schema_slot(&self) -> SchemaSlot {
        self.schema.get()
    }

    pub(crate) fn set_schema_slot(&self, slot: SchemaSlot) {
        self.schema.set(slot);
    }

    pub(crate) fn replace_data(&mut self, data: Vec<u8>) -> Vec<u8> {
        std::mem::replace(&mut self.data, data)
    }
}

fn nul_position(data: &[u8]) -> usize {
    data.iter().position(|&b| b == 0).unwrap_or(data.len())
}

/// Kind-specific node payload.
#[derive(Debug, Clone)]
pub(crate) enum NodeData {
    Plugin,
    Group(GroupHeader),
    Record(RecordHeader),
    Subrecord(Subrecord),
}

impl NodeData {
    pub(crate) fn kind(&self) -> NodeKind {
        match self {
            Self::Plugin => NodeKind::Plugin,
            Self::Group(_) => NodeKind::Group,
            Self::Record(_) => NodeKind::Record,
            Self::Subrecord(_) => NodeKind::Subrecord,
        }
    }
}

/// An arena entry.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    /// Traversal only; the parent's `children` list owns this node.
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) data: NodeData,
}

impl Node {
    pub(crate) fn new(data: NodeData) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            data,
        }
    }
}
