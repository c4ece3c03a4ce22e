//! String table kinds.

use std::fmt;

/// The three string table flavours that accompany a localized plugin.
///
/// They share one file layout and differ only in how an entry is framed
/// inside the data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringsKind {
    /// Null-terminated text (names, short labels).
    Strings,
    /// u32 length prefix, then text (descriptions).
    DlStrings,
    /// u32 length prefix, then text (dialogue).
    IlStrings,
}

impl StringsKind {
    /// All kinds, in lookup order.
    pub const ALL: [StringsKind; 3] = [Self::Strings, Self::DlStrings, Self::IlStrings];

    /// File extension used on disk.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Strings => "STRINGS",
            Self::DlStrings => "DLSTRINGS",
            Self::IlStrings => "ILSTRINGS",
        }
    }

    /// Whether entries carry a length prefix.
    pub fn is_length_prefixed(&self) -> bool {
        !matches!(self, Self::Strings)
    }

    /// Detect the kind from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.extension().eq_ignore_ascii_case(ext))
    }
}

impl fmt::Display for StringsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extensions() {
        assert_eq!(StringsKind::DlStrings.extension(), "DLSTRINGS");
        assert_eq!(StringsKind::from_extension("ilstrings"), Some(StringsKind::IlStrings));
        assert_eq!(StringsKind::from_extension("txt"), None);
        assert!(!StringsKind::Strings.is_length_prefixed());
    }
}
