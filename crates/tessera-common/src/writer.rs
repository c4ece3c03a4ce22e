//! Little-endian binary writer.

use byteorder::{LittleEndian, WriteBytesExt};

use crate::{Result, Tag};

/// A growable buffer for writing little-endian plugin data.
///
/// Container formats declare sizes before their contents, so the writer
/// supports reserving a slot and patching it once the contents are known.
///
/// # Example
///
/// ```
/// use tessera_common::{BinaryWriter, Tag};
///
/// let mut writer = BinaryWriter::new();
/// writer.write_tag(Tag::new(*b"EDID")).unwrap();
/// let slot = writer.position();
/// writer.write_u16(0).unwrap();
/// writer.write_bytes(b"Test\0");
/// writer.patch_u16(slot, 5);
///
/// assert_eq!(writer.into_inner(), b"EDID\x05\x00Test\0");
/// ```
#[derive(Debug, Default, Clone)]
pub struct BinaryWriter {
    buffer: Vec<u8>,
}

impl BinaryWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create an empty writer with preallocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Current write position (equal to the number of bytes written).
    #[inline]
    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    /// Write a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.buffer.write_u8(value)?;
        Ok(())
    }

    /// Write a little-endian u16.
    #[inline]
    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.buffer.write_u16::<LittleEndian>(value)?;
        Ok(())
    }

    /// Write a little-endian u32.
    #[inline]
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.buffer.write_u32::<LittleEndian>(value)?;
        Ok(())
    }

    /// Write a little-endian f32.
    #[inline]
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.buffer.write_f32::<LittleEndian>(value)?;
        Ok(())
    }

    /// Write a four-byte tag.
    #[inline]
    pub fn write_tag(&mut self, tag: Tag) -> Result<()> {
        self.write_bytes(tag.as_bytes());
        Ok(())
    }

    /// Append raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Overwrite a previously written u16 at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset + 2` is past the end of the written data.
    pub fn patch_u16(&mut self, offset: usize, value: u16) {
        self.buffer[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    /// Overwrite a previously written u32 at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset + 4` is past the end of the written data.
    pub fn patch_u32(&mut self, offset: usize, value: u32) {
        self.buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Borrow the bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer and return the buffer.
    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}
