//! Field value types and repeat modes.

use std::fmt;

/// The semantic type of a subrecord field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Signed 8-bit integer.
    SByte,
    /// Unsigned 8-bit integer.
    Byte,
    /// Signed 16-bit integer.
    Short,
    /// Unsigned 16-bit integer.
    UShort,
    /// Signed 32-bit integer.
    Int,
    /// Unsigned 32-bit integer.
    UInt,
    /// 32-bit IEEE float.
    Float,
    /// Fixed four-byte string.
    Str4,
    /// Null-terminated string.
    String,
    /// String prefixed by a u16 byte length.
    BString,
    /// String prefixed by a u32 byte length.
    IString,
    /// Localized string: inline text, or a u32 ID into a string table.
    LString,
    /// Opaque bytes.
    Blob,
    /// Reference to another record by FormID.
    FormId,
}

impl FieldType {
    /// Parse the name used in definition files (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let ty = match name.to_ascii_lowercase().as_str() {
            "sbyte" => Self::SByte,
            "byte" => Self::Byte,
            "short" => Self::Short,
            "ushort" => Self::UShort,
            "int" => Self::Int,
            "uint" => Self::UInt,
            "float" => Self::Float,
            "str4" => Self::Str4,
            "string" => Self::String,
            "bstring" => Self::BString,
            "istring" => Self::IString,
            "lstring" => Self::LString,
            "blob" => Self::Blob,
            "formid" => Self::FormId,
            _ => return None,
        };
        Some(ty)
    }

    /// The name used in definition files.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SByte => "sbyte",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::UShort => "ushort",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Float => "float",
            Self::Str4 => "str4",
            Self::String => "string",
            Self::BString => "bstring",
            Self::IString => "istring",
            Self::LString => "lstring",
            Self::Blob => "blob",
            Self::FormId => "formid",
        }
    }

    /// Integer types (FormIDs excluded).
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::SByte | Self::Byte | Self::Short | Self::UShort | Self::Int | Self::UInt
        )
    }

    /// Types that support arithmetic.
    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, Self::Float | Self::FormId)
    }

    /// Whether the integer type is signed.
    pub fn is_signed(&self) -> bool {
        matches!(self, Self::SByte | Self::Short | Self::Int)
    }

    /// On-disk width for fixed-size types.
    ///
    /// Localized strings are variable because they may hold inline text.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            Self::SByte | Self::Byte => Some(1),
            Self::Short | Self::UShort => Some(2),
            Self::Int | Self::UInt | Self::Float | Self::Str4 | Self::FormId => Some(4),
            Self::String | Self::BString | Self::IString | Self::LString | Self::Blob => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How many times a field or field group occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Repeat {
    /// Exactly once.
    #[default]
    Once,
    /// A fixed number of times.
    Fixed(usize),
    /// Until the subrecord buffer is exhausted.
    UntilExhausted,
}

impl Repeat {
    /// Decode the numeric form used in definition files.
    ///
    /// `0` and `1` mean once, `-1` means until exhausted.
    pub fn from_count(count: i32) -> Option<Self> {
        match count {
            0 | 1 => Some(Self::Once),
            -1 => Some(Self::UntilExhausted),
            n if n > 1 => Some(Self::Fixed(n as usize)),
            _ => None,
        }
    }

    pub fn is_repeated(&self) -> bool {
        !matches!(self, Self::Once)
    }
}
