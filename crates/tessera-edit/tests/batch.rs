//! Formatting and batch edits against decoded plugins.

use pretty_assertions::assert_eq;
use tessera_common::{BinaryWriter, Tag};
use tessera_edit::format::format;
use tessera_edit::{
    apply_batch, format_record, AssignOp, BatchCriteria, Error, PluginLookup, SubrecordEditor,
    FORMAT_WARNING,
};
use tessera_plugin::{DecodeOptions, Plugin};
use tessera_schema::Schema;

const DEFINITION: &str = r#"
    <Records>
      <Record name="WEAP" desc="Weapon">
        <Subrecord name="EDID" desc="Editor ID">
          <Element name="ID" type="string"/>
        </Subrecord>
        <Subrecord name="FULL" desc="Name">
          <Element name="Name" type="string"/>
        </Subrecord>
        <Subrecord name="DATA">
          <Element name="Value" type="uint"/>
          <Element name="Flags" type="uint" hexview="true" flags="Hidden;Heavy;Silent"/>
          <Element name="Ammo" type="formid"/>
        </Subrecord>
        <Subrecord name="DESC">
          <Element name="Text" type="string"/>
        </Subrecord>
        <Subrecord name="ZNAM" optional="true">
          <Element name="Sound" type="formid"/>
          <Element name="Volume" type="float"/>
        </Subrecord>
      </Record>
      <Record name="AMMO">
        <Subrecord name="EDID"><Element name="ID" type="string"/></Subrecord>
      </Record>
    </Records>
"#;

fn tag(s: &str) -> Tag {
    s.parse().unwrap()
}

fn subrecord(w: &mut Vec<u8>, name: &str, data: &[u8]) {
    w.extend_from_slice(name.as_bytes());
    w.extend_from_slice(&(data.len() as u16).to_le_bytes());
    w.extend_from_slice(data);
}

fn record(name: &str, form_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut w = BinaryWriter::new();
    w.write_tag(tag(name)).unwrap();
    w.write_u32(payload.len() as u32).unwrap();
    w.write_u32(0).unwrap();
    w.write_u32(form_id).unwrap();
    w.write_u32(0).unwrap();
    w.write_u32(0).unwrap();
    w.write_bytes(payload);
    w.into_inner()
}

fn group(contents: &str, children: &[u8]) -> Vec<u8> {
    let mut w = BinaryWriter::new();
    w.write_tag(tag("GRUP")).unwrap();
    w.write_u32(24 + children.len() as u32).unwrap();
    w.write_tag(tag(contents)).unwrap();
    w.write_u32(0).unwrap();
    w.write_u32(0).unwrap();
    w.write_u32(0).unwrap();
    w.write_bytes(children);
    w.into_inner()
}

fn weapon(form_id: u32, edid: &str, value: u32, flags: u32, ammo: u32) -> Vec<u8> {
    let mut payload = Vec::new();
    subrecord(&mut payload, "EDID", format!("{edid}\0").as_bytes());
    subrecord(&mut payload, "FULL", b"Sword\0");
    let mut data = value.to_le_bytes().to_vec();
    data.extend(flags.to_le_bytes());
    data.extend(ammo.to_le_bytes());
    subrecord(&mut payload, "DATA", &data);
    subrecord(&mut payload, "DESC", b"Sharp.\0");
    record("WEAP", form_id, &payload)
}

fn sample() -> Plugin {
    let mut header = Vec::new();
    subrecord(&mut header, "HEDR", &[0; 12]);
    let mut bytes = record("TES4", 0, &header);

    let mut ammo = Vec::new();
    subrecord(&mut ammo, "EDID", b"IronArrow\0");
    bytes.extend(group("AMMO", &record("AMMO", 0x0000_0900, &ammo)));

    let mut weapons = weapon(0x0000_0801, "IronSword", 10, 0x1, 0x0000_0900);
    weapons.extend(weapon(0x0000_0802, "SteelSword", 40, 0x2, 0));
    // Too short for its DATA layout.
    let mut broken = Vec::new();
    subrecord(&mut broken, "EDID", b"Broken\0");
    subrecord(&mut broken, "DATA", &[1, 2, 3]);
    weapons.extend(record("WEAP", 0x0000_0803, &broken));
    bytes.extend(group("WEAP", &weapons));

    Plugin::decode(&bytes, &DecodeOptions::new()).unwrap()
}

fn weapons(plugin: &Plugin) -> Vec<tessera_plugin::NodeId> {
    plugin
        .records(plugin.root())
        .unwrap()
        .into_iter()
        .filter(|&r| plugin.record(r).unwrap().tag == tag("WEAP"))
        .collect()
}

#[test]
fn test_format_with_lookups() {
    let schema = Schema::from_xml_str(DEFINITION).unwrap();
    let plugin = sample();
    let iron = plugin.lookup_form_id(0x0000_0801).unwrap();
    let lookup = PluginLookup::new(&plugin);

    let rendered: Vec<String> = format_record(&plugin, iron, &schema, &lookup)
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(rendered[0], "[EDID] Editor ID\nID: IronSword\n");
    assert_eq!(
        rendered[2],
        "[DATA]\nValue: 10\nFlags: 0x00000001 (Hidden)\nAmmo: 00000900 : IronArrow [AMMO:00000900]\n"
    );

    let broken = plugin.lookup_form_id(0x0000_0803).unwrap();
    let rendered = format_record(&plugin, broken, &schema, &lookup).unwrap();
    assert!(rendered[0].is_ok());
    assert_eq!(rendered[1].warning.as_deref(), Some(FORMAT_WARNING));
    assert_eq!(rendered[1].hex.as_deref(), Some("01 02 03"));
}

#[test]
fn test_single_field_edits() {
    let schema = Schema::from_xml_str(DEFINITION).unwrap();
    let mut plugin = sample();
    let iron = plugin.lookup_form_id(0x0000_0801).unwrap();
    let data = plugin.find_subrecord(iron, tag("DATA")).unwrap();

    let mut editor = SubrecordEditor::open(&plugin, data, &schema).unwrap();
    editor.assign("Value", AssignOp::Add, "5").unwrap();
    editor.assign("Flags", AssignOp::BitOr, "0x4").unwrap();
    assert!(matches!(
        editor.assign("Missing", AssignOp::Set, "1"),
        Err(Error::FieldNotFound(_))
    ));
    assert!(editor.finish(&mut plugin).unwrap());

    let bytes = plugin.subrecord(data).unwrap().data();
    assert_eq!(&bytes[0..4], &15u32.to_le_bytes());
    assert_eq!(&bytes[4..8], &5u32.to_le_bytes());

    let full = plugin.find_subrecord(iron, tag("FULL")).unwrap();
    let before = plugin.total_size(iron).unwrap();
    let mut editor = SubrecordEditor::open(&plugin, full, &schema).unwrap();
    editor.assign("Name", AssignOp::Set, "Iron Longsword").unwrap();
    editor.finish(&mut plugin).unwrap();
    assert_eq!(plugin.subrecord(full).unwrap().data(), b"Iron Longsword\0");
    assert_eq!(plugin.total_size(iron).unwrap(), before + 9);

    let reparsed = Plugin::decode(&plugin.encode().unwrap(), &DecodeOptions::new()).unwrap();
    let iron = reparsed.lookup_form_id(0x0000_0801).unwrap();
    let full = reparsed.find_subrecord(iron, tag("FULL")).unwrap();
    assert_eq!(reparsed.subrecord(full).unwrap().data(), b"Iron Longsword\0");
}

#[test]
fn test_batch_edit() {
    let schema = Schema::from_xml_str(DEFINITION).unwrap();
    let mut plugin = sample();
    let criteria: BatchCriteria = serde_json::from_str(
        r#"{
            "record_type": "WEAP",
            "subrecords": [
                { "name": "DESC", "action": "delete" },
                { "name": "ZNAM", "action": "create",
                  "assignments": [{ "field": "Volume", "op": "set", "value": "0.5" }] },
                { "name": "DATA", "assignments": [
                    { "field": "Value", "op": "multiply", "value": "2" },
                    { "field": "Ammo", "op": "clear" }
                ] },
                { "name": "FULL", "assignments": [{ "field": "Name", "op": "add", "value": "1" }] }
            ]
        }"#,
    )
    .unwrap();

    let mut targets = weapons(&plugin);
    targets.push(plugin.lookup_form_id(0x0000_0900).unwrap());
    let report = apply_batch(&mut plugin, &schema, &targets, &criteria);

    assert_eq!(report.records, 3);
    assert_eq!(report.deleted, 2);
    assert_eq!(report.created, 3);
    // The broken record still gets its ZNAM, but fails before it counts.
    assert_eq!(report.modified, 2);

    // The broken record fails on DATA; the unsupported FULL edit fails per field.
    let broken: Vec<_> = report.failures.iter().filter(|f| f.field.is_none()).collect();
    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0].form_id, 0x0000_0803);
    let field_failures = report.failures.iter().filter(|f| f.field.as_deref() == Some("Name")).count();
    assert_eq!(field_failures, 2);

    let iron = plugin.lookup_form_id(0x0000_0801).unwrap();
    let order: Vec<Tag> = plugin
        .children(iron)
        .unwrap()
        .iter()
        .map(|&c| plugin.subrecord(c).unwrap().tag())
        .collect();
    assert_eq!(order, vec![tag("EDID"), tag("FULL"), tag("DATA"), tag("ZNAM")]);

    let data = plugin.find_subrecord(iron, tag("DATA")).unwrap();
    let mut expected = 20u32.to_le_bytes().to_vec();
    expected.extend(1u32.to_le_bytes());
    expected.extend(0u32.to_le_bytes());
    assert_eq!(plugin.subrecord(data).unwrap().data(), expected.as_slice());

    let znam = plugin.find_subrecord(iron, tag("ZNAM")).unwrap();
    let mut expected = 0u32.to_le_bytes().to_vec();
    expected.extend(0.5f32.to_le_bytes());
    assert_eq!(plugin.subrecord(znam).unwrap().data(), expected.as_slice());

    let steel = plugin.lookup_form_id(0x0000_0802).unwrap();
    let data = plugin.find_subrecord(steel, tag("DATA")).unwrap();
    assert_eq!(&plugin.subrecord(data).unwrap().data()[0..4], &80u32.to_le_bytes());

    let ammo = plugin.lookup_form_id(0x0000_0900).unwrap();
    assert_eq!(plugin.children(ammo).unwrap().len(), 1);

    let reparsed = Plugin::decode(&plugin.encode().unwrap(), &DecodeOptions::new()).unwrap();
    assert_eq!(reparsed.encode().unwrap(), plugin.encode().unwrap());
}

#[test]
fn test_short_subrecord_is_flagged() {
    let schema = Schema::from_xml_str(DEFINITION).unwrap();
    let layout = schema
        .lookup_record_schema(tag("WEAP"))
        .and_then(|r| r.lookup_subrecord_schema(tag("DATA")))
        .unwrap();
    let formatted = format(&[0; 11], layout, &tessera_edit::NoLookup);
    assert!(!formatted.is_ok());
    assert!(formatted.fields.is_empty());
}
