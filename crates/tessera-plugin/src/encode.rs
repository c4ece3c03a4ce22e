//! Encoder.
//!
//! Sizes are computed from the current children while writing, so an edited
//! tree always encodes with consistent headers. Records that were compressed
//! on disk are written uncompressed unless [`EncodeOptions::compress`] names
//! their type.

use std::fs;
use std::path::Path;

use tessera_common::{BinaryWriter, Tag};

use crate::compress;
use crate::format::{ESCAPE_TAG, FLAG_COMPRESSED, GROUP_TAG};
use crate::node::NodeData;
use crate::{
    Error, FxHashSet, GroupHeader, HeaderLayout, NodeId, Plugin, RecordHeader, Result, Subrecord,
};

/// Options controlling an encode.
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    /// Record types to write zlib-compressed.
    pub compress: FxHashSet<Tag>,
}

impl EncodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compress(mut self, tag: Tag) -> Self {
        self.compress.insert(tag);
        self
    }
}

impl Plugin {
    /// Encode the whole plugin with default options.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.encode_with(&EncodeOptions::default())
    }

    /// Encode the whole plugin.
    pub fn encode_with(&self, options: &EncodeOptions) -> Result<Vec<u8>> {
        let mut writer = BinaryWriter::with_capacity(self.total_size(self.root())?);
        self.write_node(&mut writer, self.root(), options)?;
        tracing::debug!("Encoded {} bytes", writer.position());
        Ok(writer.into_inner())
    }

    /// Encode a single node and its subtree.
    pub fn encode_node(&self, id: NodeId) -> Result<Vec<u8>> {
        let mut writer = BinaryWriter::with_capacity(self.total_size(id)?);
        self.write_node(&mut writer, id, &EncodeOptions::default())?;
        Ok(writer.into_inner())
    }

    /// Encode and write to `path`, replacing any existing file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.save_with(path, &EncodeOptions::default())
    }

    pub fn save_with<P: AsRef<Path>>(&self, path: P, options: &EncodeOptions) -> Result<()> {
        let bytes = self.encode_with(options)?;
        fs::write(path.as_ref(), &bytes)?;
        tracing::debug!("Saved {} ({} bytes)", path.as_ref().display(), bytes.len());
        Ok(())
    }

    fn write_node(&self, w: &mut BinaryWriter, id: NodeId, options: &EncodeOptions) -> Result<()> {
        match &self.node(id)?.data {
            NodeData::Plugin => self.write_children(w, id, options),
            NodeData::Group(header) => {
                self.write_group_header(w, header, self.total_size(id)?)?;
                self.write_children(w, id, options)
            }
            NodeData::Record(header) => self.write_record(w, id, header, options),
            NodeData::Subrecord(sub) => write_subrecord(w, sub),
        }
    }

    fn write_children(&self, w: &mut BinaryWriter, id: NodeId, options: &EncodeOptions) -> Result<()> {
        for &child in self.children(id)? {
            self.write_node(w, child, options)?;
        }
        Ok(())
    }

    fn write_group_header(&self, w: &mut BinaryWriter, header: &GroupHeader, size: usize) -> Result<()> {
        w.write_tag(GROUP_TAG)?;
        w.write_u32(to_u32(size)?)?;
        w.write_bytes(&header.label);
        w.write_u32(header.group_type)?;
        w.write_u32(header.stamp)?;
        if self.layout() == HeaderLayout::Standard {
            w.write_u32(header.flags)?;
        }
        Ok(())
    }

    fn write_record(
        &self,
        w: &mut BinaryWriter,
        id: NodeId,
        header: &RecordHeader,
        options: &EncodeOptions,
    ) -> Result<()> {
        let flags1 = header.flags1 & !FLAG_COMPRESSED;

        if !options.compress.contains(&header.tag) {
            self.write_record_header(w, header, flags1, self.size(id)?)?;
            return self.write_children(w, id, options);
        }

        let mut body = BinaryWriter::with_capacity(self.size(id)?);
        self.write_children(&mut body, id, options)?;
        let raw = body.into_inner();
        let packed = compress::deflate(&raw).map_err(|e| Error::Compression {
            form_id: header.form_id,
            message: e.to_string(),
        })?;

        self.write_record_header(w, header, flags1 | FLAG_COMPRESSED, packed.len() + 4)?;
        w.write_u32(to_u32(raw.len())?)?;
        w.write_bytes(&packed);
        Ok(())
    }

    fn write_record_header(
        &self,
        w: &mut BinaryWriter,
        header: &RecordHeader,
        flags1: u32,
        size: usize,
    ) -> Result<()> {
        w.write_tag(header.tag)?;
        w.write_u32(to_u32(size)?)?;
        w.write_u32(flags1)?;
        w.write_u32(header.form_id)?;
        w.write_u32(header.flags2)?;
        if self.layout() == HeaderLayout::Standard {
            w.write_u32(header.flags3)?;
        }
        Ok(())
    }
}

fn write_subrecord(w: &mut BinaryWriter, sub: &Subrecord) -> Result<()> {
    if sub.is_long_form() {
        w.write_tag(ESCAPE_TAG)?;
        w.write_u16(4)?;
        w.write_u32(to_u32(sub.len())?)?;
        w.write_tag(sub.tag())?;
        w.write_u16(0)?;
    } else {
        w.write_tag(sub.tag())?;
        w.write_u16(sub.len() as u16)?;
    }
    w.write_bytes(sub.data());
    Ok(())
}

fn to_u32(size: usize) -> Result<u32> {
    u32::try_from(size).map_err(|_| Error::PayloadTooLarge { size })
}
