//! Record and subrecord layouts.

use tessera_common::Tag;

use crate::{FieldNode, FieldSchema};

/// Layout of one subrecord type within a record.
#[derive(Debug, Clone, PartialEq)]
pub struct SubrecordSchema {
    pub name: Tag,
    pub desc: String,
    /// The record is valid without this subrecord.
    pub optional: bool,
    /// The subrecord may occur more than once.
    pub repeat: bool,
    pub nodes: Vec<FieldNode>,
}

impl SubrecordSchema {
    pub fn new(name: Tag) -> Self {
        Self {
            name,
            desc: String::new(),
            optional: false,
            repeat: false,
            nodes: Vec::new(),
        }
    }

    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn repeated(mut self) -> Self {
        self.repeat = true;
        self
    }

    /// Append a field or group.
    pub fn node(mut self, node: impl Into<FieldNode>) -> Self {
        self.nodes.push(node.into());
        self
    }

    /// Iterate every field descriptor, flattening groups.
    pub fn fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.nodes.iter().flat_map(FieldNode::fields)
    }

    /// Find a field by name (case-insensitive).
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields().find(|f| f.name.eq_ignore_ascii_case(name))
    }
}

/// Layout of one record type.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub name: Tag,
    pub desc: String,
    pub subrecords: Vec<SubrecordSchema>,
}

impl RecordSchema {
    pub fn new(name: Tag) -> Self {
        Self {
            name,
            desc: String::new(),
            subrecords: Vec::new(),
        }
    }

    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    pub fn subrecord(mut self, subrecord: SubrecordSchema) -> Self {
        self.subrecords.push(subrecord);
        self
    }

    /// Look up the layout of a subrecord type. The first definition wins.
    pub fn lookup_subrecord_schema(&self, name: Tag) -> Option<&SubrecordSchema> {
        self.subrecords.iter().find(|s| s.name == name)
    }

    /// Position of a subrecord type in the defined order.
    pub fn subrecord_order(&self, name: Tag) -> Option<usize> {
        self.subrecords.iter().position(|s| s.name == name)
    }
}
