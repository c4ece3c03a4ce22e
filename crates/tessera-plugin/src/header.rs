//! Record and group headers.

use tessera_common::{convert, Tag};

use crate::format::{FLAG_COMPRESSED, FLAG_DELETED, FLAG_LOCALIZED, HEADER_FIELD_TAG};

/// Which header size the file uses.
///
/// The earliest format revision omits the trailing flags word from both
/// record and group headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderLayout {
    /// 20-byte record and group headers.
    Legacy,
    /// 24-byte record and group headers.
    #[default]
    Standard,
}

impl HeaderLayout {
    /// Size of a record header, including tag and size fields.
    #[inline]
    pub const fn record_header_len(self) -> usize {
        match self {
            Self::Legacy => 20,
            Self::Standard => 24,
        }
    }

    /// Size of a group header, including tag and size fields.
    #[inline]
    pub const fn group_header_len(self) -> usize {
        self.record_header_len()
    }

    /// Detect the layout from the position of the header record's first
    /// subrecord. Falls back to [`Standard`](Self::Standard).
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.get(20..24) == Some(HEADER_FIELD_TAG.as_bytes().as_slice()) {
            Self::Legacy
        } else {
            Self::Standard
        }
    }
}

/// Decoded group kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupType {
    /// Top-level group; the label is a record type.
    Top,
    /// Children of a worldspace; the label is its FormID.
    WorldChildren,
    /// Interior cell block; the label is the block number.
    InteriorBlock,
    /// Interior cell sub-block; the label is the sub-block number.
    InteriorSubBlock,
    /// Exterior cell block; the label holds grid coordinates.
    ExteriorBlock,
    /// Exterior cell sub-block; the label holds grid coordinates.
    ExteriorSubBlock,
    /// Children of a cell; the label is its FormID.
    CellChildren,
    /// Children of a dialogue topic; the label is its FormID.
    TopicChildren,
    /// Persistent references of a cell.
    CellPersistent,
    /// Temporary references of a cell.
    CellTemporary,
    /// Visible-distant references of a cell.
    CellVisibleDistant,
    Unknown(u32),
}

impl GroupType {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => Self::Top,
            1 => Self::WorldChildren,
            2 => Self::InteriorBlock,
            3 => Self::InteriorSubBlock,
            4 => Self::ExteriorBlock,
            5 => Self::ExteriorSubBlock,
            6 => Self::CellChildren,
            7 => Self::TopicChildren,
            8 => Self::CellPersistent,
            9 => Self::CellTemporary,
            10 => Self::CellVisibleDistant,
            other => Self::Unknown(other),
        }
    }

    pub fn to_u32(self) -> u32 {
        match self {
            Self::Top => 0,
            Self::WorldChildren => 1,
            Self::InteriorBlock => 2,
            Self::InteriorSubBlock => 3,
            Self::ExteriorBlock => 4,
            Self::ExteriorSubBlock => 5,
            Self::CellChildren => 6,
            Self::TopicChildren => 7,
            Self::CellPersistent => 8,
            Self::CellTemporary => 9,
            Self::CellVisibleDistant => 10,
            Self::Unknown(other) => other,
        }
    }

    /// Kinds whose label is the FormID of the owning record.
    pub fn has_parent_form_id(self) -> bool {
        matches!(
            self,
            Self::WorldChildren
                | Self::CellChildren
                | Self::TopicChildren
                | Self::CellPersistent
                | Self::CellTemporary
                | Self::CellVisibleDistant
        )
    }
}

/// Group header fields after the tag and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupHeader {
    pub label: [u8; 4],
    pub group_type: u32,
    pub stamp: u32,
    /// Absent in the legacy layout, where it is always zero.
    pub flags: u32,
}

impl GroupHeader {
    /// A top-level group aggregating records of type `contents`.
    pub fn top(contents: Tag) -> Self {
        Self {
            label: *contents.as_bytes(),
            group_type: 0,
            stamp: 0,
            flags: 0,
        }
    }

    #[inline]
    pub fn kind(&self) -> GroupType {
        GroupType::from_u32(self.group_type)
    }

    /// The record type this group aggregates, for top-level groups only.
    pub fn contents_type(&self) -> Option<Tag> {
        (self.kind() == GroupType::Top).then(|| Tag::new(self.label))
    }

    /// FormID of the record whose children this group holds.
    pub fn parent_form_id(&self) -> Option<u32> {
        self.kind()
            .has_parent_form_id()
            .then(|| u32::from_le_bytes(self.label))
    }

    /// Block or sub-block number of an interior cell group.
    pub fn block(&self) -> Option<i32> {
        matches!(self.kind(), GroupType::InteriorBlock | GroupType::InteriorSubBlock)
            .then(|| i32::from_le_bytes(self.label))
    }

    /// `(x, y)` grid coordinates of an exterior cell group. The label
    /// stores Y first.
    pub fn grid(&self) -> Option<(i16, i16)> {
        if !matches!(self.kind(), GroupType::ExteriorBlock | GroupType::ExteriorSubBlock) {
            return None;
        }
        let y = convert::to_i16(&self.label[0..2]).ok()?;
        let x = convert::to_i16(&self.label[2..4]).ok()?;
        Some((x, y))
    }
}

/// Record header fields after the tag and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub tag: Tag,
    pub flags1: u32,
    pub form_id: u32,
    pub flags2: u32,
    /// Absent in the legacy layout, where it is always zero.
    pub flags3: u32,
}

impl RecordHeader {
    pub fn new(tag: Tag, form_id: u32) -> Self {
        Self {
            tag,
            flags1: 0,
            form_id,
            flags2: 0,
            flags3: 0,
        }
    }

    /// The payload is zlib-compressed on disk.
    ///
    /// Decoded records always have this bit cleared.
    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.flags1 & FLAG_COMPRESSED != 0
    }

    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.flags1 & FLAG_DELETED != 0
    }

    /// On the header record: display text lives in external string tables.
    #[inline]
    pub fn is_localized(&self) -> bool {
        self.flags1 & FLAG_LOCALIZED != 0
    }

    pub fn set_deleted(&mut self, deleted: bool) {
        if deleted {
            self.flags1 |= FLAG_DELETED;
        } else {
            self.flags1 &= !FLAG_DELETED;
        }
    }
}
