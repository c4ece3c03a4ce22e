//! Decode/encode behaviour on synthetic plugin streams.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use pretty_assertions::assert_eq;
use tessera_common::{BinaryWriter, Tag};
use tessera_plugin::{
    DecodeOptions, Error, GroupHeader, HeaderLayout, NodeKind, Plugin, RecordHeader,
};

fn tag(s: &str) -> Tag {
    s.parse().unwrap()
}

fn subrecord(tag_name: &str, data: &[u8]) -> Vec<u8> {
    let mut w = BinaryWriter::new();
    w.write_tag(tag(tag_name)).unwrap();
    w.write_u16(data.len() as u16).unwrap();
    w.write_bytes(data);
    w.into_inner()
}

fn record(tag_name: &str, flags1: u32, form_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut w = BinaryWriter::new();
    w.write_tag(tag(tag_name)).unwrap();
    w.write_u32(payload.len() as u32).unwrap();
    w.write_u32(flags1).unwrap();
    w.write_u32(form_id).unwrap();
    w.write_u32(0x0012_3456).unwrap();
    w.write_u32(0x0000_002C).unwrap();
    w.write_bytes(payload);
    w.into_inner()
}

fn group(label: &[u8; 4], group_type: u32, children: &[u8]) -> Vec<u8> {
    let mut w = BinaryWriter::new();
    w.write_tag(tag("GRUP")).unwrap();
    w.write_u32(24 + children.len() as u32).unwrap();
    w.write_bytes(label);
    w.write_u32(group_type).unwrap();
    w.write_u32(0x0000_1A2B).unwrap();
    w.write_u32(0).unwrap();
    w.write_bytes(children);
    w.into_inner()
}

fn header() -> Vec<u8> {
    let mut payload = subrecord("HEDR", &[0x9A, 0x99, 0xD9, 0x3F, 2, 0, 0, 0, 0, 8, 0, 0]);
    payload.extend(subrecord("CNAM", b"Author\0"));
    payload.extend(subrecord("MAST", b"Skyrim.esm\0"));
    payload.extend(subrecord("DATA", &[0; 8]));
    record("TES4", 0x81, 0, &payload)
}

fn weapon(form_id: u32, edid: &str) -> Vec<u8> {
    let mut name = edid.as_bytes().to_vec();
    name.push(0);
    let mut payload = subrecord("EDID", &name);
    payload.extend(subrecord("DATA", &[10, 0, 0, 0, 0, 0, 0x80, 0x3F]));
    record("WEAP", 0, form_id, &payload)
}

fn sample_plugin() -> Vec<u8> {
    let mut weapons = weapon(0x0001_0001, "IronSword");
    weapons.extend(weapon(0x0001_0002, "SteelSword"));

    let cell = record("CELL", 0, 0x0002_0001, &subrecord("EDID", b"Cave\0"));
    let refs = group(&0x0002_0001u32.to_le_bytes(), 9, &record("REFR", 0, 0x0002_0002, &[]));
    let block = group(&0i32.to_le_bytes(), 2, &[cell, refs].concat());

    let mut bytes = header();
    bytes.extend(group(b"WEAP", 0, &weapons));
    bytes.extend(group(b"CELL", 0, &block));
    bytes
}

#[test]
fn test_uncompressed_round_trip() {
    let bytes = sample_plugin();
    let plugin = Plugin::decode(&bytes, &DecodeOptions::new()).unwrap();
    assert_eq!(plugin.layout(), HeaderLayout::Standard);
    assert_eq!(plugin.masters(), vec!["Skyrim.esm"]);
    assert!(plugin.record(plugin.header_record().unwrap()).unwrap().is_localized());
    assert_eq!(plugin.encode().unwrap(), bytes);
}

#[test]
fn test_compressed_round_trip_is_idempotent() {
    let mut raw = subrecord("EDID", b"PackedSword\0");
    raw.extend(subrecord("DATA", &[7; 64]));
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&raw).unwrap();
    let packed = encoder.finish().unwrap();

    let mut payload = (raw.len() as u32).to_le_bytes().to_vec();
    payload.extend(packed);
    let mut bytes = header();
    bytes.extend(group(b"WEAP", 0, &record("WEAP", 0x0004_0000, 0x0001_0003, &payload)));

    let first = Plugin::decode(&bytes, &DecodeOptions::new()).unwrap();
    let weapon = first.lookup_form_id(0x0001_0003).unwrap();
    assert!(!first.record(weapon).unwrap().is_compressed());
    assert_eq!(first.get_ids(first.root(), false).unwrap(), vec!["PackedSword"]);

    let once = first.encode().unwrap();
    assert_ne!(once, bytes);
    let second = Plugin::decode(&once, &DecodeOptions::new()).unwrap();
    assert_eq!(second.encode().unwrap(), once);
}

#[test]
fn test_decompressed_size_mismatch_is_fatal() {
    let raw = subrecord("EDID", b"X\0");
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw).unwrap();
    let mut payload = 99u32.to_le_bytes().to_vec();
    payload.extend(encoder.finish().unwrap());

    let mut bytes = header();
    bytes.extend(record("WEAP", 0x0004_0000, 5, &payload));
    assert!(matches!(
        Plugin::decode(&bytes, &DecodeOptions::new()),
        Err(Error::Decompression { form_id: 5, .. })
    ));
}

#[test]
fn test_group_size_tracks_children() {
    let bytes = sample_plugin();
    let mut plugin = Plugin::decode(&bytes, &DecodeOptions::new()).unwrap();
    let weapons = plugin.children(plugin.root()).unwrap()[1];
    let sum = |plugin: &Plugin| -> usize {
        plugin
            .children(weapons)
            .unwrap()
            .iter()
            .map(|&c| plugin.total_size(c).unwrap())
            .sum()
    };
    assert_eq!(plugin.total_size(weapons).unwrap(), 24 + sum(&plugin));

    let copy = plugin.clone_node(plugin.children(weapons).unwrap()[0], true).unwrap();
    plugin.record_mut(copy).unwrap().form_id = 0x0001_0009;
    plugin.insert_child(weapons, 1, copy).unwrap();
    assert_eq!(plugin.total_size(weapons).unwrap(), 24 + sum(&plugin));

    let first = plugin.children(weapons).unwrap()[0];
    plugin.delete_child(weapons, first).unwrap();
    assert_eq!(plugin.total_size(weapons).unwrap(), 24 + sum(&plugin));

    // The encoded group header agrees with the computed size.
    let encoded = plugin.encode_node(weapons).unwrap();
    let declared = u32::from_le_bytes(encoded[4..8].try_into().unwrap()) as usize;
    assert_eq!(declared, encoded.len());

    let reparsed = Plugin::decode(&plugin.encode().unwrap(), &DecodeOptions::new()).unwrap();
    assert_eq!(
        reparsed.get_ids(reparsed.root(), false).unwrap(),
        vec!["IronSword", "SteelSword", "Cave"]
    );
}

#[test]
fn test_form_id_cache_insert_and_delete() {
    let bytes = sample_plugin();
    let mut plugin = Plugin::decode(&bytes, &DecodeOptions::new()).unwrap();
    let weapons = plugin.children(plugin.root()).unwrap()[1];
    assert_eq!(plugin.lookup_form_id(0xDEAD_BEEF), None);

    let record = plugin.new_record(RecordHeader::new(tag("WEAP"), 0xDEAD_BEEF));
    plugin.add_child(weapons, record).unwrap();
    plugin.invalidate_form_ids();
    assert_eq!(plugin.lookup_form_id(0xDEAD_BEEF), Some(record));

    plugin.delete_child(weapons, record).unwrap();
    assert_eq!(plugin.lookup_form_id(0xDEAD_BEEF), None);
    assert!(plugin.lookup_form_id(0x0002_0002).is_some());
}

#[test]
fn test_end_to_end_scenario() {
    let mut bytes = header();
    bytes.extend(group(b"ABCD", 0, &record("ABCD", 0, 0x0000_0800, &subrecord("EDID", b"Test\0"))));

    let plugin = Plugin::decode(&bytes, &DecodeOptions::new()).unwrap();
    let top = plugin.children(plugin.root()).unwrap();
    assert_eq!(top.len(), 2);

    let group = top[1];
    let header = plugin.group(group).unwrap();
    assert_eq!(header.contents_type(), Some(tag("ABCD")));

    let record = plugin.children(group).unwrap()[0];
    assert_eq!(plugin.record(record).unwrap().tag, tag("ABCD"));
    let edid = plugin.children(record).unwrap()[0];
    assert_eq!(plugin.kind(edid).unwrap(), NodeKind::Subrecord);
    assert_eq!(plugin.depth(edid).unwrap(), 3);
    assert_eq!(plugin.subrecord(edid).unwrap().data(), b"Test\0");

    assert_eq!(plugin.get_ids(plugin.root(), false).unwrap(), vec!["Test"]);
    assert_eq!(plugin.get_ids(plugin.root(), true).unwrap(), vec!["test"]);
    assert_eq!(plugin.encode().unwrap(), bytes);
}

#[test]
fn test_build_from_scratch_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("New.esp");

    let mut plugin = Plugin::new("New.esp", HeaderLayout::Standard);
    let header = plugin.new_record(RecordHeader::new(tag("TES4"), 0));
    plugin.add_child(plugin.root(), header).unwrap();
    let hedr = plugin.new_subrecord(tag("HEDR"), vec![0; 12]);
    plugin.add_child(header, hedr).unwrap();

    let group = plugin.new_group(GroupHeader::top(tag("WEAP")));
    plugin.add_child(plugin.root(), group).unwrap();
    let record = plugin.new_record(RecordHeader::new(tag("WEAP"), 0x0100_0800));
    plugin.add_child(group, record).unwrap();
    let big = plugin.new_subrecord(tag("DATA"), vec![0xAB; 70_000]);
    plugin.add_child(record, big).unwrap();

    plugin.save(&path).unwrap();
    let reopened = Plugin::open(&path, &DecodeOptions::new()).unwrap();
    let found = reopened.lookup_form_id(0x0100_0800).unwrap();
    let data = reopened.children(found).unwrap()[0];
    assert_eq!(reopened.subrecord(data).unwrap().len(), 70_000);
    assert_eq!(reopened.encode().unwrap(), std::fs::read(&path).unwrap());
}
