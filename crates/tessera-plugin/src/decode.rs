//! Streaming decoder.
//!
//! The decoder walks the byte stream once, front to back. Groups and records
//! are bounded by their declared sizes, and any disagreement between a
//! declared size and the bytes its children consume is fatal: the caller
//! gets an error and no tree.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use tessera_common::{convert, BinaryReader, Tag};

use crate::compress;
use crate::format::{
    ESCAPE_TAG, FLAG_COMPRESSED, GROUP_TAG, HEADER_TAG, MAX_GROUP_NESTING, SUBRECORD_HEADER_LEN,
};
use crate::{Error, FxHashSet, GroupHeader, HeaderLayout, NodeId, Plugin, RecordHeader, Result};

/// Options controlling a decode.
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// Record types to leave out. Matching top-level records, and top-level
    /// groups whose contents type matches, are stepped over unread.
    pub skip: FxHashSet<Tag>,
    /// Force a header layout instead of detecting it.
    pub layout: Option<HeaderLayout>,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip(mut self, tag: Tag) -> Self {
        self.skip.insert(tag);
        self
    }

    pub fn skip_all<I: IntoIterator<Item = Tag>>(mut self, tags: I) -> Self {
        self.skip.extend(tags);
        self
    }

    pub fn layout(mut self, layout: HeaderLayout) -> Self {
        self.layout = Some(layout);
        self
    }
}

/// Counters collected during a decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub groups: usize,
    pub records: usize,
    pub subrecords: usize,
    /// Records that were stored compressed.
    pub compressed: usize,
    /// Records and groups stepped over because of [`DecodeOptions::skip`].
    pub skipped: usize,
}

/// State for decoding one plugin.
///
/// Owns the scratch buffer that compressed records inflate into, so the
/// buffer is reused across records and freed with the session, on success
/// and on failure alike.
pub struct DecodeSession<'a> {
    options: &'a DecodeOptions,
    scratch: Vec<u8>,
    stats: DecodeStats,
}

impl<'a> DecodeSession<'a> {
    pub fn new(options: &'a DecodeOptions) -> Self {
        Self {
            options,
            scratch: Vec::new(),
            stats: DecodeStats::default(),
        }
    }

    /// Counters from the most recent [`decode`](Self::decode).
    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    /// Decode a complete plugin.
    pub fn decode(&mut self, bytes: &[u8], name: &str) -> Result<Plugin> {
        self.stats = DecodeStats::default();

        let mut reader = BinaryReader::new(bytes);
        let found = reader
            .peek_tag()
            .map_err(|_| Error::Truncated { offset: 0 })?;
        if found != HEADER_TAG {
            return Err(Error::NotAPlugin { found });
        }

        let layout = self
            .options
            .layout
            .unwrap_or_else(|| HeaderLayout::detect(bytes));
        let mut plugin = Plugin::new(name, layout);
        let root = plugin.root();

        while !reader.is_empty() {
            self.decode_node(&mut reader, &mut plugin, root, 0)?;
        }

        tracing::debug!(
            "Decoded {} ({:?} layout): {} groups, {} records ({} compressed), {} subrecords, {} skipped",
            if name.is_empty() { "<memory>" } else { name },
            layout,
            self.stats.groups,
            self.stats.records,
            self.stats.compressed,
            self.stats.subrecords,
            self.stats.skipped,
        );
        Ok(plugin)
    }

    fn decode_node(
        &mut self,
        reader: &mut BinaryReader<'_>,
        plugin: &mut Plugin,
        parent: NodeId,
        nesting: usize,
    ) -> Result<()> {
        let offset = reader.position();
        let tag = reader
            .peek_tag()
            .map_err(|_| Error::Truncated { offset })?;
        if tag == GROUP_TAG {
            self.decode_group(reader, plugin, parent, nesting + 1)
        } else {
            self.decode_record(reader, plugin, parent)
        }
    }

    fn decode_group(
        &mut self,
        reader: &mut BinaryReader<'_>,
        plugin: &mut Plugin,
        parent: NodeId,
        nesting: usize,
    ) -> Result<()> {
        let start = reader.position();
        if nesting > MAX_GROUP_NESTING {
            tracing::debug!("Group at {:#x} nests {} levels deep", start, nesting);
            return Err(Error::TooDeep { limit: MAX_GROUP_NESTING });
        }
        let layout = plugin.layout();
        let header_len = layout.group_header_len();
        let head = reader
            .read_bytes(header_len)
            .map_err(|_| Error::Truncated { offset: start })?;

        let mut h = BinaryReader::new_at(head, 4);
        let size = h.read_u32()? as usize;
        let header = GroupHeader {
            label: *h.read_tag()?.as_bytes(),
            group_type: h.read_u32()?,
            stamp: h.read_u32()?,
            flags: match layout {
                HeaderLayout::Standard => h.read_u32()?,
                HeaderLayout::Legacy => 0,
            },
        };

        if size < header_len {
            return Err(Error::SizeMismatch {
                offset: start,
                expected: size,
                actual: header_len,
            });
        }
        let end = start + size;
        if end > reader.len() {
            return Err(Error::Truncated { offset: start });
        }

        if let Some(contents) = header.contents_type() {
            if self.options.skip.contains(&contents) {
                tracing::trace!("Skipping {} group at {:#x}", contents, start);
                reader.seek(end);
                self.stats.skipped += 1;
                return Ok(());
            }
        }

        let group = plugin.new_group(header);
        plugin.push_child_unchecked(parent, group)?;
        while reader.position() < end {
            self.decode_node(reader, plugin, group, nesting)?;
        }
        if reader.position() != end {
            return Err(Error::SizeMismatch {
                offset: start,
                expected: size,
                actual: reader.position() - start,
            });
        }

        self.stats.groups += 1;
        Ok(())
    }

    fn decode_record(
        &mut self,
        reader: &mut BinaryReader<'_>,
        plugin: &mut Plugin,
        parent: NodeId,
    ) -> Result<()> {
        let start = reader.position();
        let layout = plugin.layout();
        let head = reader
            .read_bytes(layout.record_header_len())
            .map_err(|_| Error::Truncated { offset: start })?;

        let mut h = BinaryReader::new(head);
        let tag = h.read_tag()?;
        let size = h.read_u32()? as usize;
        let mut header = RecordHeader {
            tag,
            flags1: h.read_u32()?,
            form_id: h.read_u32()?,
            flags2: h.read_u32()?,
            flags3: match layout {
                HeaderLayout::Standard => h.read_u32()?,
                HeaderLayout::Legacy => 0,
            },
        };

        if size > reader.remaining() {
            return Err(Error::Truncated { offset: start });
        }
        if parent == plugin.root() && tag != HEADER_TAG && self.options.skip.contains(&tag) {
            tracing::trace!("Skipping {} record {:08X} at {:#x}", tag, header.form_id, start);
            reader.advance(size)?;
            self.stats.skipped += 1;
            return Ok(());
        }
        let payload = reader.read_bytes(size)?;

        let compressed = header.is_compressed();
        header.flags1 &= !FLAG_COMPRESSED;
        let record = plugin.new_record(header);
        plugin.push_child_unchecked(parent, record)?;

        let count = if compressed {
            self.inflate(payload, header.form_id)?;
            self.stats.compressed += 1;
            read_subrecords(&self.scratch, start, plugin, record)?
        } else {
            read_subrecords(payload, start, plugin, record)?
        };

        self.stats.records += 1;
        self.stats.subrecords += count;
        Ok(())
    }

    fn inflate(&mut self, payload: &[u8], form_id: u32) -> Result<()> {
        let decompression = |message: String| Error::Decompression { form_id, message };

        let expected = convert::to_u32(payload)
            .map_err(|_| decompression("missing decompressed size".to_string()))?
            as usize;
        compress::inflate(&payload[4..], expected, &mut self.scratch)
            .map_err(|e| decompression(e.to_string()))?;

        if self.scratch.len() > expected {
            return Err(decompression(format!(
                "inflates past the declared {expected} bytes"
            )));
        }
        if self.scratch.len() != expected {
            return Err(decompression(format!(
                "declared {expected} bytes, inflated {}",
                self.scratch.len()
            )));
        }
        Ok(())
    }
}

/// Read the subrecord stream of one record. Returns the number read.
fn read_subrecords(
    data: &[u8],
    record_offset: usize,
    plugin: &mut Plugin,
    record: NodeId,
) -> Result<usize> {
    let mut reader = BinaryReader::new(data);
    let mut long_len: Option<usize> = None;
    let mut count = 0;

    while !reader.is_empty() {
        let at = reader.position();
        let overrun = |needed: usize| Error::SizeMismatch {
            offset: record_offset,
            expected: data.len(),
            actual: at + needed,
        };

        if reader.remaining() < SUBRECORD_HEADER_LEN {
            return Err(overrun(SUBRECORD_HEADER_LEN));
        }
        let tag = reader.read_tag()?;
        let short_len = reader.read_u16()? as usize;

        if tag == ESCAPE_TAG {
            let real = reader
                .read_u32()
                .map_err(|_| overrun(SUBRECORD_HEADER_LEN + 4))?;
            long_len = Some(real as usize);
            continue;
        }

        let len = long_len.take().unwrap_or(short_len);
        let bytes = reader
            .read_bytes(len)
            .map_err(|_| overrun(SUBRECORD_HEADER_LEN + len))?;
        let sub = plugin.new_subrecord(tag, bytes.to_vec());
        plugin.push_child_unchecked(record, sub)?;
        count += 1;
    }

    if long_len.is_some() {
        return Err(Error::SizeMismatch {
            offset: record_offset,
            expected: data.len(),
            actual: data.len() + SUBRECORD_HEADER_LEN,
        });
    }
    Ok(count)
}

impl Plugin {
    /// Decode a plugin from memory.
    pub fn decode(bytes: &[u8], options: &DecodeOptions) -> Result<Self> {
        DecodeSession::new(options).decode(bytes, "")
    }

    /// Memory-map and decode a plugin file.
    pub fn open<P: AsRef<Path>>(path: P, options: &DecodeOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(Error::Truncated { offset: 0 });
        }
        let mmap = unsafe { Mmap::map(&file)? };

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");

        DecodeSession::new(options).decode(&mmap, name)
    }
}

#[cfg(test)]
mod tests {
    use tessera_common::BinaryWriter;

    use super::*;
    use crate::NodeKind;

    fn tag(s: &str) -> Tag {
        s.parse().unwrap()
    }

    fn header_record(w: &mut BinaryWriter) {
        w.write_tag(HEADER_TAG).unwrap();
        w.write_u32(18).unwrap();
        for _ in 0..4 {
            w.write_u32(0).unwrap();
        }
        w.write_tag(tag("HEDR")).unwrap();
        w.write_u16(12).unwrap();
        w.write_bytes(&[0; 12]);
    }

    #[test]
    fn test_not_a_plugin() {
        let err = Plugin::decode(b"GRUP\0\0\0\0", &DecodeOptions::new()).unwrap_err();
        assert!(matches!(err, Error::NotAPlugin { found } if found == GROUP_TAG));
        assert!(matches!(
            Plugin::decode(b"TE", &DecodeOptions::new()),
            Err(Error::Truncated { offset: 0 })
        ));
    }

    #[test]
    fn test_truncated_record() {
        let mut w = BinaryWriter::new();
        header_record(&mut w);
        let mut bytes = w.into_inner();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            Plugin::decode(&bytes, &DecodeOptions::new()),
            Err(Error::Truncated { offset: 0 })
        ));
    }

    #[test]
    fn test_subrecord_overrun() {
        let mut w = BinaryWriter::new();
        w.write_tag(HEADER_TAG).unwrap();
        w.write_u32(8).unwrap();
        for _ in 0..4 {
            w.write_u32(0).unwrap();
        }
        w.write_tag(tag("HEDR")).unwrap();
        w.write_u16(12).unwrap(); // claims more than the record holds
        w.write_bytes(&[0; 2]);

        assert!(matches!(
            Plugin::decode(w.as_slice(), &DecodeOptions::new()),
            Err(Error::SizeMismatch { offset: 0, expected: 8, actual: 18 })
        ));
    }

    #[test]
    fn test_group_size_mismatch() {
        let mut w = BinaryWriter::new();
        header_record(&mut w);
        // The group claims 40 bytes but its record ends at 48.
        w.write_tag(GROUP_TAG).unwrap();
        w.write_u32(40).unwrap();
        w.write_tag(tag("WEAP")).unwrap();
        for _ in 0..3 {
            w.write_u32(0).unwrap();
        }
        w.write_tag(tag("WEAP")).unwrap();
        for _ in 0..5 {
            w.write_u32(0).unwrap();
        }

        assert!(matches!(
            Plugin::decode(w.as_slice(), &DecodeOptions::new()),
            Err(Error::SizeMismatch { offset: 42, expected: 40, actual: 48 })
        ));
    }

    #[test]
    fn test_legacy_layout() {
        let mut w = BinaryWriter::new();
        w.write_tag(HEADER_TAG).unwrap();
        w.write_u32(18).unwrap();
        for _ in 0..3 {
            w.write_u32(0).unwrap();
        }
        w.write_tag(tag("HEDR")).unwrap();
        w.write_u16(12).unwrap();
        w.write_bytes(&[0; 12]);

        let plugin = Plugin::decode(w.as_slice(), &DecodeOptions::new()).unwrap();
        assert_eq!(plugin.layout(), HeaderLayout::Legacy);
        let header = plugin.header_record().unwrap();
        assert_eq!(plugin.children(header).unwrap().len(), 1);
        assert_eq!(plugin.encode().unwrap(), w.into_inner());
    }

    #[test]
    fn test_skip_top_level() {
        let mut w = BinaryWriter::new();
        header_record(&mut w);
        for record_type in ["WEAP", "ARMO"] {
            w.write_tag(GROUP_TAG).unwrap();
            w.write_u32(24 + 24 + 6).unwrap();
            w.write_tag(tag(record_type)).unwrap();
            for _ in 0..3 {
                w.write_u32(0).unwrap();
            }
            w.write_tag(tag(record_type)).unwrap();
            w.write_u32(6).unwrap();
            for _ in 0..4 {
                w.write_u32(0).unwrap();
            }
            w.write_tag(tag("DATA")).unwrap();
            w.write_u16(0).unwrap();
        }

        let options = DecodeOptions::new().skip(tag("WEAP"));
        let mut session = DecodeSession::new(&options);
        let plugin = session.decode(w.as_slice(), "test").unwrap();
        assert_eq!(session.stats().skipped, 1);

        let top = plugin.children(plugin.root()).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(plugin.kind(top[1]).unwrap(), NodeKind::Group);
        assert_eq!(
            plugin.group(top[1]).unwrap().contents_type(),
            Some(tag("ARMO"))
        );
    }

    fn nested_groups(levels: usize) -> Vec<u8> {
        let mut inner = Vec::new();
        for _ in 0..levels {
            let mut w = BinaryWriter::new();
            w.write_tag(GROUP_TAG).unwrap();
            w.write_u32(24 + inner.len() as u32).unwrap();
            w.write_bytes(&[0; 4]);
            w.write_u32(1).unwrap();
            w.write_u32(0).unwrap();
            w.write_u32(0).unwrap();
            w.write_bytes(&inner);
            inner = w.into_inner();
        }
        inner
    }

    #[test]
    fn test_group_nesting_limit() {
        let mut w = BinaryWriter::new();
        header_record(&mut w);
        w.write_bytes(&nested_groups(MAX_GROUP_NESTING));
        let plugin = Plugin::decode(w.as_slice(), &DecodeOptions::new()).unwrap();
        assert_eq!(plugin.descendants(plugin.root()).unwrap().len(), 3 + MAX_GROUP_NESTING);

        let mut w = BinaryWriter::new();
        header_record(&mut w);
        w.write_bytes(&nested_groups(1000));
        assert!(matches!(
            Plugin::decode(w.as_slice(), &DecodeOptions::new()),
            Err(Error::TooDeep { limit: MAX_GROUP_NESTING })
        ));
    }

    #[test]
    fn test_skip_top_level_record() {
        let mut w = BinaryWriter::new();
        header_record(&mut w);
        for (record_type, form_id) in [("WEAP", 1), ("ARMO", 2), ("WEAP", 3)] {
            w.write_tag(tag(record_type)).unwrap();
            w.write_u32(6).unwrap();
            w.write_u32(0).unwrap();
            w.write_u32(form_id).unwrap();
            w.write_u32(0).unwrap();
            w.write_u32(0).unwrap();
            w.write_tag(tag("DATA")).unwrap();
            w.write_u16(0).unwrap();
        }

        let options = DecodeOptions::new().skip(tag("WEAP"));
        let mut session = DecodeSession::new(&options);
        let plugin = session.decode(w.as_slice(), "test").unwrap();
        assert_eq!(session.stats().skipped, 2);
        assert_eq!(session.stats().records, 2);

        let top = plugin.children(plugin.root()).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(plugin.record(top[1]).unwrap().tag, tag("ARMO"));
        assert!(plugin.lookup_form_id(1).is_none());
        assert_eq!(plugin.lookup_form_id(2), Some(top[1]));
    }
}
