//! On-disk constants.

use tessera_common::Tag;

/// Type of the header record that must open every plugin.
pub const HEADER_TAG: Tag = Tag::new(*b"TES4");

/// Type of group nodes.
pub const GROUP_TAG: Tag = Tag::new(*b"GRUP");

/// Escape subrecord announcing a long-form length for the next subrecord.
pub const ESCAPE_TAG: Tag = Tag::new(*b"XXXX");

/// First subrecord of the header record.
pub const HEADER_FIELD_TAG: Tag = Tag::new(*b"HEDR");

/// Editor ID subrecord.
pub const EDITOR_ID_TAG: Tag = Tag::new(*b"EDID");

/// Master file subrecord of the header record.
pub const MASTER_TAG: Tag = Tag::new(*b"MAST");

/// Record flags1 bit: payload is zlib-compressed.
pub const FLAG_COMPRESSED: u32 = 0x0004_0000;

/// Record flags1 bit: record is deleted.
pub const FLAG_DELETED: u32 = 0x0000_0020;

/// Header record flags1 bit: strings live in external tables.
pub const FLAG_LOCALIZED: u32 = 0x0000_0080;

/// Largest payload a subrecord can address with its 16-bit length field.
pub const MAX_SHORT_SUBRECORD: usize = u16::MAX as usize;

/// Subrecord header: tag plus 16-bit length.
pub const SUBRECORD_HEADER_LEN: usize = 6;

/// Long-form prefix: escape tag, 16-bit field, 32-bit real length.
pub const ESCAPE_LEN: usize = 10;

/// Deepest group nesting accepted when decoding or attaching nodes.
pub const MAX_GROUP_NESTING: usize = 64;
