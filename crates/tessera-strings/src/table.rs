//! String table parsing and writing.

use std::fs;
use std::io;
use std::path::Path;

use indexmap::IndexMap;
use tessera_common::{BinaryReader, BinaryWriter};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{Error, Result, StringsKind};

/// Fixed file header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
struct TableHeader {
    count: u32,
    data_size: u32,
}

/// One directory entry. The offset is relative to the data block.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
struct DirectoryEntry {
    id: u32,
    offset: u32,
}

const HEADER_SIZE: usize = std::mem::size_of::<TableHeader>();
const ENTRY_SIZE: usize = std::mem::size_of::<DirectoryEntry>();

/// An ID to text dictionary backed by one string table file.
///
/// Entries keep insertion order, which is also the order they are written
/// back in. Text is decoded leniently: bytes that are not valid UTF-8 are
/// replaced rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringTable {
    entries: IndexMap<u32, String>,
}

impl StringTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a table from raw bytes.
    ///
    /// When an ID appears more than once, the first entry wins.
    pub fn parse(bytes: &[u8], kind: StringsKind) -> Result<Self> {
        let mut reader = BinaryReader::new(bytes);
        let header: TableHeader = reader.read_struct()?;
        let count = header.count as usize;
        let data_size = header.data_size as usize;

        let mut directory = Vec::with_capacity(count.min(reader.remaining() / ENTRY_SIZE));
        for _ in 0..count {
            directory.push(reader.read_struct::<DirectoryEntry>()?);
        }
        let data = reader.read_bytes(data_size)?;

        let mut entries = IndexMap::with_capacity(directory.len());
        for entry in directory {
            let (id, offset) = (entry.id, entry.offset as usize);
            let text = read_entry(data, id, offset, kind)?;
            entries.entry(id).or_insert(text);
        }

        tracing::trace!("Parsed {} {} entries", entries.len(), kind);
        Ok(Self { entries })
    }

    /// Load a table from disk. A missing file yields an empty table.
    pub fn load<P: AsRef<Path>>(path: P, kind: StringsKind) -> Result<Self> {
        let path = path.as_ref();
        match fs::read(path) {
            Ok(bytes) => Self::parse(&bytes, kind),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No string table at {}", path.display());
                Ok(Self::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Serialize with fresh offsets in insertion order.
    pub fn to_bytes(&self, kind: StringsKind) -> Result<Vec<u8>> {
        let mut data = BinaryWriter::new();
        let mut directory = Vec::with_capacity(self.entries.len());

        for (&id, text) in &self.entries {
            directory.push((id, to_u32(data.position())?));
            let bytes = text.as_bytes();
            if kind.is_length_prefixed() {
                data.write_u32(to_u32(bytes.len() + 1)?)?;
            }
            data.write_bytes(bytes);
            data.write_u8(0)?;
        }

        let data = data.into_inner();
        let mut out = BinaryWriter::with_capacity(
            HEADER_SIZE + directory.len() * ENTRY_SIZE + data.len(),
        );
        out.write_u32(to_u32(directory.len())?)?;
        out.write_u32(to_u32(data.len())?)?;
        for (id, offset) in directory {
            out.write_u32(id)?;
            out.write_u32(offset)?;
        }
        out.write_bytes(&data);

        Ok(out.into_inner())
    }

    /// Write the table to disk, replacing any existing file.
    pub fn save<P: AsRef<Path>>(&self, path: P, kind: StringsKind) -> Result<()> {
        fs::write(path, self.to_bytes(kind)?)?;
        Ok(())
    }

    pub fn get(&self, id: u32) -> Option<&str> {
        self.entries.get(&id).map(String::as_str)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    /// Add or replace an entry, returning the previous text.
    pub fn insert(&mut self, id: u32, text: impl Into<String>) -> Option<String> {
        self.entries.insert(id, text.into())
    }

    /// Remove an entry, keeping the order of the rest.
    pub fn remove(&mut self, id: u32) -> Option<String> {
        self.entries.shift_remove(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.entries.iter().map(|(&id, text)| (id, text.as_str()))
    }
}

impl<S: Into<String>> FromIterator<(u32, S)> for StringTable {
    fn from_iter<I: IntoIterator<Item = (u32, S)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (id, text) in iter {
            table.entries.entry(id).or_insert_with(|| text.into());
        }
        table
    }
}

fn read_entry(data: &[u8], id: u32, offset: usize, kind: StringsKind) -> Result<String> {
    let out_of_bounds = || Error::OffsetOutOfBounds {
        id,
        offset,
        data_size: data.len(),
    };
    if offset >= data.len() {
        return Err(out_of_bounds());
    }

    let mut reader = BinaryReader::new_at(data, offset);
    let bytes = if kind.is_length_prefixed() {
        let len = reader.read_u32().map_err(|_| out_of_bounds())? as usize;
        let bytes = reader.read_bytes(len).map_err(|_| out_of_bounds())?;
        bytes.strip_suffix(&[0]).unwrap_or(bytes)
    } else {
        reader.read_cstring_bytes()?
    };

    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::TooLarge(value))
}
