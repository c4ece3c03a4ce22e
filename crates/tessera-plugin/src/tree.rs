//! The plugin arena and read-only accessors.

use std::cell::OnceCell;

use tessera_common::Tag;

use crate::format::{GROUP_TAG, HEADER_TAG};
use crate::node::{Node, NodeData};
use crate::observer::Observers;
use crate::{
    Error, FxHashMap, GroupHeader, HeaderLayout, NodeId, NodeKind, RecordHeader, Result, Subrecord,
};

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// A decoded plugin file: an arena of nodes rooted at the plugin node.
///
/// Nodes are addressed by [`NodeId`]. Each node lists its children in
/// on-disk order; the parent link is a plain handle used for traversal.
/// Nodes created with `new_*` or [`clone_node`](Plugin::clone_node) start
/// detached and join the tree through [`add_child`](Plugin::add_child).
///
/// Sizes are never stored. [`size`](Plugin::size) and
/// [`total_size`](Plugin::total_size) are computed from the current children
/// each time they are asked for.
///
/// `Plugin` is `Send` but not `Sync`: share it between threads behind a
/// lock.
#[derive(Debug)]
pub struct Plugin {
    name: String,
    layout: HeaderLayout,
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    pub(crate) form_ids: OnceCell<FxHashMap<u32, NodeId>>,
    pub(crate) observers: Observers,
}

impl Plugin {
    /// Create an empty plugin with no header record.
    pub fn new(name: impl Into<String>, layout: HeaderLayout) -> Self {
        let mut plugin = Self {
            name: name.into(),
            layout,
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            form_ids: OnceCell::new(),
            observers: Observers::default(),
        };
        plugin.root = plugin.alloc(Node::new(NodeData::Plugin));
        plugin
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn layout(&self) -> HeaderLayout {
        self.layout
    }

    /// Change the header layout used by [`encode`](Plugin::encode).
    pub fn set_layout(&mut self, layout: HeaderLayout) {
        self.layout = layout;
    }

    /// The plugin node.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, attached or not, including the root.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Whether the plugin has no top-level children.
    pub fn is_empty(&self) -> bool {
        self.children(self.root).map_or(true, <[NodeId]>::is_empty)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    pub fn kind(&self, id: NodeId) -> Result<NodeKind> {
        Ok(self.node(id)?.data.kind())
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(&self.node(id)?.children)
    }

    /// Parents of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let first = self.parent(id).ok().flatten();
        std::iter::successors(first, move |&p| self.parent(p).ok().flatten())
    }

    /// Number of ancestors. The root and detached nodes have depth 0.
    pub fn depth(&self, id: NodeId) -> Result<usize> {
        self.node(id)?;
        Ok(self.ancestors(id).count())
    }

    /// The on-disk type tag. The plugin node has none.
    pub fn tag(&self, id: NodeId) -> Option<Tag> {
        match &self.node(id).ok()?.data {
            NodeData::Plugin => None,
            NodeData::Group(_) => Some(GROUP_TAG),
            NodeData::Record(header) => Some(header.tag),
            NodeData::Subrecord(sub) => Some(sub.tag()),
        }
    }

    pub fn record(&self, id: NodeId) -> Result<&RecordHeader> {
        match &self.node(id)?.data {
            NodeData::Record(header) => Ok(header),
            other => Err(wrong_kind(NodeKind::Record, other)),
        }
    }

    /// Mutable access to a record header. Drops the FormID index, since the
    /// FormID may change.
    pub fn record_mut(&mut self, id: NodeId) -> Result<&mut RecordHeader> {
        self.invalidate_form_ids();
        match &mut self.node_mut(id)?.data {
            NodeData::Record(header) => Ok(header),
            other => Err(wrong_kind(NodeKind::Record, other)),
        }
    }

    pub fn group(&self, id: NodeId) -> Result<&GroupHeader> {
        match &self.node(id)?.data {
            NodeData::Group(header) => Ok(header),
            other => Err(wrong_kind(NodeKind::Group, other)),
        }
    }

    pub fn group_mut(&mut self, id: NodeId) -> Result<&mut GroupHeader> {
        match &mut self.node_mut(id)?.data {
            NodeData::Group(header) => Ok(header),
            other => Err(wrong_kind(NodeKind::Group, other)),
        }
    }

    pub fn subrecord(&self, id: NodeId) -> Result<&Subrecord> {
        match &self.node(id)?.data {
            NodeData::Subrecord(sub) => Ok(sub),
            other => Err(wrong_kind(NodeKind::Subrecord, other)),
        }
    }

    /// The header record, if the plugin has one as its first child.
    pub fn header_record(&self) -> Option<NodeId> {
        let first = *self.children(self.root).ok()?.first()?;
        (self.record(first).ok()?.tag == HEADER_TAG).then_some(first)
    }

    /// Subrecord children of `record` with the given tag, in order.
    pub fn subrecords_with_tag(&self, record: NodeId, tag: Tag) -> Result<Vec<NodeId>> {
        self.record(record)?;
        Ok(self
            .children(record)?
            .iter()
            .copied()
            .filter(|&c| self.tag(c) == Some(tag))
            .collect())
    }

    /// First subrecord child of `record` with the given tag.
    pub fn find_subrecord(&self, record: NodeId, tag: Tag) -> Option<NodeId> {
        self.children(record)
            .ok()?
            .iter()
            .copied()
            .find(|&c| self.tag(c) == Some(tag))
    }

    /// Payload size, uncompressed, excluding the node's own header.
    pub fn size(&self, id: NodeId) -> Result<usize> {
        let node = self.node(id)?;
        match &node.data {
            NodeData::Subrecord(sub) => Ok(sub.len()),
            _ => node
                .children
                .iter()
                .try_fold(0usize, |acc, &c| Ok(acc + self.total_size(c)?)),
        }
    }

    /// On-disk size including the node's header.
    ///
    /// For groups this is the value stored in the group's size field.
    pub fn total_size(&self, id: NodeId) -> Result<usize> {
        let node = self.node(id)?;
        match &node.data {
            NodeData::Plugin => self.size(id),
            NodeData::Group(_) => Ok(self.layout.group_header_len() + self.size(id)?),
            NodeData::Record(_) => Ok(self.layout.record_header_len() + self.size(id)?),
            NodeData::Subrecord(sub) => Ok(sub.total_size()),
        }
    }

    /// Every node of the subtree rooted at `id`, in pre-order.
    pub fn descendants(&self, id: NodeId) -> Result<Vec<NodeId>> {
        self.node(id)?;
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Ok(node) = self.node(current) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        Ok(out)
    }

    /// Call `f` for every node of the subtree rooted at `id`, in pre-order.
    pub fn for_each<F: FnMut(NodeId)>(&self, id: NodeId, f: F) -> Result<()> {
        self.descendants(id)?.into_iter().for_each(f);
        Ok(())
    }

    /// Nodes of the subtree rooted at `id` for which `predicate` holds.
    pub fn enumerate<F>(&self, id: NodeId, mut predicate: F) -> Result<Vec<NodeId>>
    where
        F: FnMut(NodeId) -> bool,
    {
        Ok(self
            .descendants(id)?
            .into_iter()
            .filter(|&n| predicate(n))
            .collect())
    }

    /// Every record in the subtree rooted at `id`, in pre-order.
    pub fn records(&self, id: NodeId) -> Result<Vec<NodeId>> {
        self.enumerate(id, |n| matches!(self.kind(n), Ok(NodeKind::Record)))
    }

    /// Position of `child` among the children of `parent`.
    pub fn index_of(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children(parent).ok()?.iter().position(|&c| c == child)
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(Error::NodeNotFound(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(Error::NodeNotFound(id))
    }

    pub(crate) fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    /// Free a node's slot. Children are not touched.
    pub(crate) fn release(&mut self, id: NodeId) -> Option<Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(node)
    }

    /// Append without checks or notifications. Used while decoding.
    pub(crate) fn push_child_unchecked(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.node_mut(child)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(child);
        Ok(())
    }
}

fn wrong_kind(expected: NodeKind, found: &NodeData) -> Error {
    Error::WrongNodeKind {
        expected,
        found: found.kind(),
    }
}
