//! Four-character type tags.

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// A four-byte type code such as `TES4`, `GRUP` or `EDID`.
///
/// Tags are compared byte-for-byte. They are usually printable ASCII but the
/// format does not require it, so [`Display`](fmt::Display) escapes anything
/// outside the printable range.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Tag([u8; 4]);

impl Tag {
    /// Create a tag from raw bytes.
    #[inline]
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Create a tag from a slice, which must be exactly four bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        <[u8; 4]>::try_from(bytes).ok().map(Self)
    }

    /// The raw bytes of this tag.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// The tag as a little-endian u32, the way it appears on disk.
    #[inline]
    pub const fn to_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Whether every byte is printable ASCII.
    pub fn is_printable(&self) -> bool {
        self.0.iter().all(|b| (0x20..=0x7E).contains(b))
    }
}

impl From<[u8; 4]> for Tag {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

impl FromStr for Tag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes()).ok_or_else(|| Error::InvalidTag(s.to_string()))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if (0x20..=0x7E).contains(&b) {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02X}", b)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let tag: Tag = "WEAP".parse().unwrap();
        assert_eq!(tag.as_bytes(), b"WEAP");
        assert_eq!(tag.to_string(), "WEAP");
        assert!("WEAPON".parse::<Tag>().is_err());
    }

    #[test]
    fn test_non_printable_display() {
        let tag = Tag::new([0x00, b'A', 0xFF, b'B']);
        assert!(!tag.is_printable());
        assert_eq!(tag.to_string(), "\\x00A\\xFFB");
    }
}
