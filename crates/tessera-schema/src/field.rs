//! Field descriptors.

use tessera_common::Tag;

use crate::{FieldType, Repeat};

/// Layout and display metadata for one subrecord field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub desc: String,
    pub field_type: FieldType,
    pub repeat: Repeat,
    /// May be absent when it is the trailing field and the buffer is exhausted.
    pub optional: bool,
    /// Parsed for display, excluded from editing.
    pub info_only: bool,
    /// Render numeric values in hexadecimal.
    pub hex: bool,
    /// Bit names, indexed by bit position. Empty names are unnamed bits.
    pub flags: Vec<String>,
    /// Named enumeration values.
    pub options: Vec<(i64, String)>,
    /// Expected target record type for FormID fields.
    pub reftype: Option<Tag>,
    /// Fixed length for blob fields; `None` consumes the rest of the buffer.
    pub blob_len: Option<usize>,
}

impl FieldSchema {
    /// Create a field with default metadata.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            desc: String::new(),
            field_type,
            repeat: Repeat::Once,
            optional: false,
            info_only: false,
            hex: false,
            flags: Vec::new(),
            options: Vec::new(),
            reftype: None,
            blob_len: None,
        }
    }

    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    pub fn repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn info_only(mut self) -> Self {
        self.info_only = true;
        self
    }

    pub fn hex(mut self) -> Self {
        self.hex = true;
        self
    }

    /// Name the bits of a flags field, lowest bit first.
    pub fn flags<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags = names.into_iter().map(Into::into).collect();
        self
    }

    /// Name the values of an enumerated field.
    pub fn options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = (i64, S)>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(|(v, n)| (v, n.into())).collect();
        self
    }

    pub fn reftype(mut self, tag: Tag) -> Self {
        self.reftype = Some(tag);
        self
    }

    pub fn blob_len(mut self, len: usize) -> Self {
        self.blob_len = Some(len);
        self
    }

    /// Name of the option matching `value`, if any.
    pub fn option_name(&self, value: i64) -> Option<&str> {
        self.options
            .iter()
            .find(|(v, _)| *v == value)
            .map(|(_, name)| name.as_str())
    }

    /// Names of the set bits that have a name, lowest bit first.
    pub fn flag_names(&self, value: u64) -> Vec<&str> {
        self.flags
            .iter()
            .enumerate()
            .filter(|(bit, name)| *bit < 64 && !name.is_empty() && value & (1u64 << bit) != 0)
            .map(|(_, name)| name.as_str())
            .collect()
    }
}

/// A group of fields processed together, optionally repeated.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldGroup {
    pub repeat: Repeat,
    pub optional: bool,
    pub fields: Vec<FieldSchema>,
}

/// An entry in a subrecord layout.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldNode {
    /// A single field, possibly repeated on its own.
    Field(FieldSchema),
    /// A block of fields repeated as a unit.
    Group(FieldGroup),
}

impl FieldNode {
    /// The fields in this node, in order.
    pub fn fields(&self) -> std::slice::Iter<'_, FieldSchema> {
        match self {
            Self::Field(field) => std::slice::from_ref(field).iter(),
            Self::Group(group) => group.fields.iter(),
        }
    }

    /// How often the node repeats.
    pub fn repeat(&self) -> Repeat {
        match self {
            Self::Field(field) => field.repeat,
            Self::Group(group) => group.repeat,
        }
    }

    /// Whether the node may be absent at the end of the buffer.
    pub fn is_optional(&self) -> bool {
        match self {
            Self::Field(field) => field.optional,
            Self::Group(group) => group.optional,
        }
    }
}

impl From<FieldSchema> for FieldNode {
    fn from(field: FieldSchema) -> Self {
        Self::Field(field)
    }
}
