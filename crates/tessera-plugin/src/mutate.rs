//! Structural mutation.
//!
//! Every operation validates before it touches the tree, so a failed call
//! leaves the plugin exactly as it was. Successful structural changes drop
//! the FormID index and notify subscribers.

use tessera_common::Tag;

use crate::format::MAX_GROUP_NESTING;
use crate::node::{Node, NodeData};
use crate::{
    ChangeEvent, Error, GroupHeader, NodeId, NodeKind, Plugin, RecordHeader, Result, SchemaSlot,
    Subrecord,
};

impl Plugin {
    /// Create a detached group.
    pub fn new_group(&mut self, header: GroupHeader) -> NodeId {
        self.alloc(Node::new(NodeData::Group(header)))
    }

    /// Create a detached record with no subrecords.
    pub fn new_record(&mut self, header: RecordHeader) -> NodeId {
        self.alloc(Node::new(NodeData::Record(header)))
    }

    /// Create a detached subrecord.
    pub fn new_subrecord(&mut self, tag: Tag, data: Vec<u8>) -> NodeId {
        self.alloc(Node::new(NodeData::Subrecord(Subrecord::new(tag, data))))
    }

    /// Append `child` to `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let len = self.children(parent)?.len();
        self.insert_child(parent, len, child)
    }

    /// Insert `child` at `index` among the children of `parent`. An index
    /// past the end appends.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        self.check_attach(parent, child)?;
        if self.parent(child)?.is_some() {
            return Err(Error::AlreadyAttached(child));
        }

        let children = &mut self.node_mut(parent)?.children;
        let index = index.min(children.len());
        children.insert(index, child);
        let node = self.node_mut(child)?;
        node.parent = Some(parent);
        if let NodeData::Subrecord(sub) = &node.data {
            sub.set_schema_slot(SchemaSlot::Unresolved);
        }

        self.structure_changed(ChangeEvent::ChildAdded {
            parent,
            child,
            index,
        });
        Ok(())
    }

    /// Remove `child` from `parent` and free its whole subtree.
    pub fn delete_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.node(parent)?;
        self.node(child)?;
        let index = self
            .index_of(parent, child)
            .ok_or(Error::NotAChild { parent, child })?;

        self.node_mut(parent)?.children.remove(index);
        self.free_subtree(child);

        self.structure_changed(ChangeEvent::ChildRemoved {
            parent,
            child,
            index,
        });
        Ok(())
    }

    /// Free a node and its subtree, detaching it first if needed.
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        if id == self.root() {
            return Err(Error::RootNode);
        }
        match self.parent(id)? {
            Some(parent) => self.delete_child(parent, id),
            None => {
                self.free_subtree(id);
                Ok(())
            }
        }
    }

    /// Unlink a node from its parent, keeping its subtree alive. Returns the
    /// former parent.
    pub fn detach(&mut self, id: NodeId) -> Result<Option<NodeId>> {
        let Some(parent) = self.parent(id)? else {
            return Ok(None);
        };
        let index = self
            .index_of(parent, id)
            .ok_or(Error::NotAChild { parent, child: id })?;

        self.node_mut(parent)?.children.remove(index);
        self.node_mut(id)?.parent = None;

        self.structure_changed(ChangeEvent::ChildRemoved {
            parent,
            child: id,
            index,
        });
        Ok(Some(parent))
    }

    /// Move `child` under `new_parent` at `index`, detaching it from its
    /// current parent.
    pub fn move_child(&mut self, child: NodeId, new_parent: NodeId, index: usize) -> Result<()> {
        if child == self.root() {
            return Err(Error::RootNode);
        }
        self.check_attach(new_parent, child)?;
        self.detach(child)?;
        self.insert_child(new_parent, index, child)
    }

    /// Copy a node into a new detached node. With `recursive`, the whole
    /// subtree is copied; otherwise the copy has no children.
    pub fn clone_node(&mut self, id: NodeId, recursive: bool) -> Result<NodeId> {
        if id == self.root() {
            return Err(Error::RootNode);
        }
        let data = self.node(id)?.data.clone();
        let copy = self.alloc(Node::new(data));
        if !recursive {
            return Ok(copy);
        }

        let mut pending = vec![(id, copy)];
        while let Some((source, target)) = pending.pop() {
            let children = self.node(source)?.children.clone();
            for child in children {
                let data = self.node(child)?.data.clone();
                let child_copy = self.alloc(Node::new(data));
                self.push_child_unchecked(target, child_copy)?;
                pending.push((child, child_copy));
            }
        }
        Ok(copy)
    }

    /// Replace a subrecord's payload in one step, returning the old bytes.
    pub fn set_subrecord_data(&mut self, id: NodeId, data: Vec<u8>) -> Result<Vec<u8>> {
        let old = match &mut self.node_mut(id)?.data {
            NodeData::Subrecord(sub) => sub.replace_data(data),
            other => {
                return Err(Error::WrongNodeKind {
                    expected: NodeKind::Subrecord,
                    found: other.kind(),
                })
            }
        };
        self.observers.notify(ChangeEvent::DataChanged { node: id });
        Ok(old)
    }

    /// Drop the FormID index. It is rebuilt on the next lookup.
    pub fn invalidate_form_ids(&mut self) {
        self.form_ids.take();
    }

    fn check_attach(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_kind = self.kind(parent)?;
        let child_kind = self.kind(child)?;
        if !parent_kind.can_contain(child_kind) {
            return Err(Error::InvalidChildType {
                parent: parent_kind,
                child: child_kind,
            });
        }
        if parent == child || self.ancestors(parent).any(|a| a == child) {
            return Err(Error::Cycle(child));
        }

        let above = std::iter::once(parent)
            .chain(self.ancestors(parent))
            .filter(|&a| matches!(self.kind(a), Ok(NodeKind::Group)))
            .count();
        if above + self.group_height(child)? > MAX_GROUP_NESTING {
            return Err(Error::TooDeep { limit: MAX_GROUP_NESTING });
        }
        Ok(())
    }

    /// Longest chain of nested groups starting at `id`, counting `id` itself.
    fn group_height(&self, id: NodeId) -> Result<usize> {
        let mut height = 0;
        let mut stack = vec![(id, 0)];
        while let Some((current, above)) = stack.pop() {
            let node = self.node(current)?;
            let nesting = above + usize::from(matches!(node.data, NodeData::Group(_)));
            height = height.max(nesting);
            stack.extend(node.children.iter().map(|&c| (c, nesting)));
        }
        Ok(height)
    }

    fn structure_changed(&mut self, event: ChangeEvent) {
        self.invalidate_form_ids();
        self.observers.notify(event);
    }

    fn free_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.release(current) {
                stack.extend(node.children);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeaderLayout;

    fn tag(s: &str) -> Tag {
        s.parse().unwrap()
    }

    fn plugin_with_group() -> (Plugin, NodeId) {
        let mut plugin = Plugin::new("Test.esp", HeaderLayout::Standard);
        let group = plugin.new_group(GroupHeader::top(tag("WEAP")));
        plugin.add_child(plugin.root(), group).unwrap();
        (plugin, group)
    }

    #[test]
    fn test_invalid_child_type_leaves_tree_untouched() {
        let (mut plugin, group) = plugin_with_group();
        let sub = plugin.new_subrecord(tag("EDID"), b"x\0".to_vec());
        let err = plugin.add_child(group, sub).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidChildType {
                parent: NodeKind::Group,
                child: NodeKind::Subrecord
            }
        ));
        assert!(plugin.children(group).unwrap().is_empty());
        assert_eq!(plugin.parent(sub).unwrap(), None);

        let record = plugin.new_record(RecordHeader::new(tag("WEAP"), 1));
        let inner = plugin.new_record(RecordHeader::new(tag("WEAP"), 2));
        assert!(plugin.add_child(record, inner).is_err());
    }

    #[test]
    fn test_already_attached_and_cycles() {
        let (mut plugin, group) = plugin_with_group();
        let record = plugin.new_record(RecordHeader::new(tag("WEAP"), 1));
        plugin.add_child(group, record).unwrap();
        assert!(matches!(
            plugin.add_child(group, record),
            Err(Error::AlreadyAttached(_))
        ));

        let inner = plugin.new_group(GroupHeader::top(tag("WEAP")));
        plugin.add_child(group, inner).unwrap();
        assert!(matches!(
            plugin.move_child(group, inner, 0),
            Err(Error::Cycle(_))
        ));
        assert_eq!(plugin.parent(group).unwrap(), Some(plugin.root()));
    }

    #[test]
    fn test_insert_positions() {
        let (mut plugin, group) = plugin_with_group();
        let a = plugin.new_record(RecordHeader::new(tag("WEAP"), 1));
        let b = plugin.new_record(RecordHeader::new(tag("WEAP"), 2));
        let c = plugin.new_record(RecordHeader::new(tag("WEAP"), 3));
        plugin.add_child(group, a).unwrap();
        plugin.insert_child(group, 0, b).unwrap();
        plugin.insert_child(group, 99, c).unwrap();
        assert_eq!(plugin.children(group).unwrap(), &[b, a, c]);
    }

    #[test]
    fn test_delete_frees_subtree() {
        let (mut plugin, group) = plugin_with_group();
        let record = plugin.new_record(RecordHeader::new(tag("WEAP"), 1));
        plugin.add_child(group, record).unwrap();
        let sub = plugin.new_subrecord(tag("EDID"), b"x\0".to_vec());
        plugin.add_child(record, sub).unwrap();
        let live = plugin.len();

        plugin.delete_child(plugin.root(), group).unwrap();
        assert_eq!(plugin.len(), live - 3);
        assert!(!plugin.contains(record));
        assert!(matches!(plugin.kind(sub), Err(Error::NodeNotFound(_))));

        // A reused slot gets a fresh generation.
        let fresh = plugin.new_record(RecordHeader::new(tag("WEAP"), 9));
        assert!(plugin.contains(fresh));
        assert!(!plugin.contains(record));
    }

    #[test]
    fn test_delete_requires_parent_relationship() {
        let (mut plugin, group) = plugin_with_group();
        let record = plugin.new_record(RecordHeader::new(tag("WEAP"), 1));
        assert!(matches!(
            plugin.delete_child(group, record),
            Err(Error::NotAChild { .. })
        ));
        assert!(matches!(plugin.remove(plugin.root()), Err(Error::RootNode)));
    }

    #[test]
    fn test_clone_node() {
        let (mut plugin, group) = plugin_with_group();
        let record = plugin.new_record(RecordHeader::new(tag("WEAP"), 1));
        plugin.add_child(group, record).unwrap();
        let sub = plugin.new_subrecord(tag("EDID"), b"x\0".to_vec());
        plugin.add_child(record, sub).unwrap();

        let deep = plugin.clone_node(group, true).unwrap();
        assert_eq!(plugin.parent(deep).unwrap(), None);
        assert_eq!(plugin.descendants(deep).unwrap().len(), 3);
        assert_eq!(plugin.total_size(deep).unwrap(), plugin.total_size(group).unwrap());

        let shallow = plugin.clone_node(record, false).unwrap();
        assert!(plugin.children(shallow).unwrap().is_empty());
        assert_eq!(plugin.record(shallow).unwrap().form_id, 1);
    }

    #[test]
    fn test_group_nesting_limit_on_attach() {
        let mut plugin = Plugin::new("Test.esp", HeaderLayout::Standard);
        let mut parent = plugin.root();
        for _ in 0..MAX_GROUP_NESTING {
            let group = plugin.new_group(GroupHeader::top(tag("WEAP")));
            plugin.add_child(parent, group).unwrap();
            parent = group;
        }
        let record = plugin.new_record(RecordHeader::new(tag("WEAP"), 1));
        plugin.add_child(parent, record).unwrap();

        let extra = plugin.new_group(GroupHeader::top(tag("WEAP")));
        assert!(matches!(
            plugin.add_child(parent, extra),
            Err(Error::TooDeep { limit: MAX_GROUP_NESTING })
        ));
        assert_eq!(plugin.parent(extra).unwrap(), None);

        // A detached copy of the whole chain no longer fits under the root's first group.
        let top = plugin.children(plugin.root()).unwrap()[0];
        let copy = plugin.clone_node(top, true).unwrap();
        assert_eq!(plugin.descendants(copy).unwrap().len(), MAX_GROUP_NESTING + 1);
        assert!(matches!(plugin.add_child(top, copy), Err(Error::TooDeep { .. })));
        plugin.add_child(plugin.root(), copy).unwrap();
        assert_eq!(plugin.total_size(copy).unwrap(), plugin.total_size(top).unwrap());
    }

    #[test]
    fn test_detach_and_move() {
        let (mut plugin, group) = plugin_with_group();
        let other = plugin.new_group(GroupHeader::top(tag("ARMO")));
        plugin.add_child(plugin.root(), other).unwrap();
        let record = plugin.new_record(RecordHeader::new(tag("WEAP"), 1));
        plugin.add_child(group, record).unwrap();

        plugin.move_child(record, other, 0).unwrap();
        assert_eq!(plugin.parent(record).unwrap(), Some(other));
        assert!(plugin.children(group).unwrap().is_empty());

        assert_eq!(plugin.detach(record).unwrap(), Some(other));
        assert_eq!(plugin.detach(record).unwrap(), None);
        assert!(plugin.contains(record));
    }

    #[test]
    fn test_set_subrecord_data() {
        let mut plugin = Plugin::new("Test.esp", HeaderLayout::Standard);
        let sub = plugin.new_subrecord(tag("DATA"), vec![1, 2]);
        let old = plugin.set_subrecord_data(sub, vec![3, 4, 5]).unwrap();
        assert_eq!(old, vec![1, 2]);
        assert_eq!(plugin.subrecord(sub).unwrap().data(), &[3, 4, 5]);

        let record = plugin.new_record(RecordHeader::new(tag("WEAP"), 1));
        assert!(plugin.set_subrecord_data(record, Vec::new()).is_err());
    }
}
