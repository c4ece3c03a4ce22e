//! XML definition loader.
//!
//! The definition file is a `<Records>` document. Each `<Record>` lists its
//! `<Subrecord>`s in on-disk order, and each subrecord lists `<Element>`
//! fields, optionally wrapped in a repeated `<Group>`.
//!
//! Element attributes: `name`, `desc`, `type`, `repeat` (`-1` = until the
//! buffer ends), `optional`, `notininfo` (display only), `hexview`, `flags`
//! (`;`-separated bit names), `options` (`;`-separated `name;value` pairs),
//! `reftype`, `size` (blob length).

use serde::Deserialize;
use tessera_common::{convert, Tag};

use crate::{
    Error, FieldGroup, FieldNode, FieldSchema, FieldType, RecordSchema, Repeat, Result,
    SubrecordSchema,
};

#[derive(Debug, Deserialize)]
struct RecordsXml {
    #[serde(rename = "Record", default)]
    records: Vec<RecordXml>,
}

#[derive(Debug, Deserialize)]
struct RecordXml {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@desc", default)]
    desc: String,
    #[serde(rename = "Subrecord", default)]
    subrecords: Vec<SubrecordXml>,
}

#[derive(Debug, Deserialize)]
struct SubrecordXml {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@desc", default)]
    desc: String,
    #[serde(rename = "@optional", default)]
    optional: bool,
    #[serde(rename = "@repeat", default)]
    repeat: bool,
    #[serde(rename = "$value", default)]
    nodes: Vec<NodeXml>,
}

#[derive(Debug, Deserialize)]
enum NodeXml {
    Element(ElementXml),
    Group(GroupXml),
}

#[derive(Debug, Deserialize)]
struct GroupXml {
    #[serde(rename = "@repeat", default)]
    repeat: i32,
    #[serde(rename = "@optional", default)]
    optional: bool,
    #[serde(rename = "Element", default)]
    elements: Vec<ElementXml>,
}

#[derive(Debug, Deserialize)]
struct ElementXml {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@desc", default)]
    desc: String,
    #[serde(rename = "@type")]
    field_type: String,
    #[serde(rename = "@repeat", default)]
    repeat: i32,
    #[serde(rename = "@optional", default)]
    optional: bool,
    #[serde(rename = "@notininfo", default)]
    info_only: bool,
    #[serde(rename = "@hexview", default)]
    hex: bool,
    #[serde(rename = "@flags")]
    flags: Option<String>,
    #[serde(rename = "@options")]
    options: Option<String>,
    #[serde(rename = "@reftype")]
    reftype: Option<String>,
    #[serde(rename = "@size")]
    size: Option<usize>,
}

pub(crate) fn parse_records(text: &str) -> Result<Vec<RecordSchema>> {
    let doc: RecordsXml = quick_xml::de::from_str(text)?;
    doc.records.into_iter().map(convert_record).collect()
}

fn convert_record(record: RecordXml) -> Result<RecordSchema> {
    let mut schema = RecordSchema::new(record.name.parse::<Tag>()?).desc(record.desc);
    for subrecord in record.subrecords {
        schema.subrecords.push(convert_subrecord(subrecord)?);
    }
    Ok(schema)
}

fn convert_subrecord(subrecord: SubrecordXml) -> Result<SubrecordSchema> {
    let mut schema = SubrecordSchema::new(subrecord.name.parse::<Tag>()?).desc(subrecord.desc);
    schema.optional = subrecord.optional;
    schema.repeat = subrecord.repeat;

    for node in subrecord.nodes {
        let node = match node {
            NodeXml::Element(element) => FieldNode::Field(convert_element(element)?),
            NodeXml::Group(group) => FieldNode::Group(convert_group(group)?),
        };
        schema.nodes.push(node);
    }
    Ok(schema)
}

fn convert_group(group: GroupXml) -> Result<FieldGroup> {
    let repeat = Repeat::from_count(group.repeat).ok_or_else(|| Error::InvalidRepeat {
        field: "<group>".to_string(),
        value: group.repeat,
    })?;

    let mut fields = Vec::with_capacity(group.elements.len());
    for element in group.elements {
        let field = convert_element(element)?;
        if repeat.is_repeated() && field.repeat.is_repeated() {
            return Err(Error::NestedRepeat { field: field.name });
        }
        fields.push(field);
    }

    Ok(FieldGroup {
        repeat,
        optional: group.optional,
        fields,
    })
}

fn convert_element(element: ElementXml) -> Result<FieldSchema> {
    let field_type =
        FieldType::from_name(&element.field_type).ok_or_else(|| Error::InvalidFieldType {
            field: element.name.clone(),
            value: element.field_type.clone(),
        })?;
    let repeat = Repeat::from_count(element.repeat).ok_or_else(|| Error::InvalidRepeat {
        field: element.name.clone(),
        value: element.repeat,
    })?;

    let mut field = FieldSchema::new(element.name, field_type)
        .desc(element.desc)
        .repeat(repeat);
    field.optional = element.optional;
    field.info_only = element.info_only;
    field.hex = element.hex;
    field.blob_len = element.size;

    if let Some(flags) = element.flags {
        field.flags = flags.split(';').map(|s| s.trim().to_string()).collect();
    }
    if let Some(options) = element.options {
        field.options = parse_options(&field.name, &options)?;
    }
    if let Some(reftype) = element.reftype {
        field.reftype = Some(reftype.parse()?);
    }

    Ok(field)
}

/// Parse `name;value;name;value` pairs.
fn parse_options(field: &str, text: &str) -> Result<Vec<(i64, String)>> {
    let parts: Vec<&str> = text.split(';').map(str::trim).collect();
    if parts.len() % 2 != 0 {
        return Err(Error::InvalidOptions {
            field: field.to_string(),
            reason: format!("expected name;value pairs, got {} items", parts.len()),
        });
    }

    parts
        .chunks_exact(2)
        .map(|pair| {
            let value = convert::parse_int(pair[1]).map_err(|_| Error::InvalidOptions {
                field: field.to_string(),
                reason: format!("{:?} is not a number", pair[1]),
            })?;
            Ok((value, pair[0].to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFINITION: &str = r#"
        <Records>
          <Record name="WEAP" desc="Weapon">
            <Subrecord name="EDID" desc="Editor ID">
              <Element name="ID" type="string"/>
            </Subrecord>
            <Subrecord name="DATA" optional="true">
              <Element name="Value" type="uint"/>
              <Element name="Flags" type="uint" hexview="true" flags="Hidden;Heavy;Silent"/>
              <Element name="Kind" type="byte" options="Sword;0;Axe;0x1"/>
              <Element name="Checksum" type="uint" notininfo="true"/>
              <Group repeat="-1">
                <Element name="Ammo" type="formid" reftype="AMMO"/>
                <Element name="Count" type="ushort"/>
              </Group>
            </Subrecord>
            <Subrecord name="KWDA" repeat="true">
              <Element name="Keyword" type="formid" repeat="-1"/>
            </Subrecord>
          </Record>
        </Records>
    "#;

    #[test]
    fn test_parse_definition() {
        let records = parse_records(DEFINITION).unwrap();
        assert_eq!(records.len(), 1);

        let weap = &records[0];
        assert_eq!(weap.desc, "Weapon");
        assert_eq!(weap.subrecords.len(), 3);

        let data = &weap.subrecords[1];
        assert!(data.optional);
        assert_eq!(data.nodes.len(), 5);

        let flags = data.field("flags").unwrap();
        assert!(flags.hex);
        assert_eq!(flags.flags, vec!["Hidden", "Heavy", "Silent"]);

        let kind = data.field("Kind").unwrap();
        assert_eq!(kind.options, vec![(0, "Sword".to_string()), (1, "Axe".to_string())]);

        assert!(data.field("Checksum").unwrap().info_only);

        match &data.nodes[4] {
            FieldNode::Group(group) => {
                assert_eq!(group.repeat, Repeat::UntilExhausted);
                assert_eq!(group.fields.len(), 2);
                assert_eq!(group.fields[0].reftype, Some("AMMO".parse().unwrap()));
            }
            other => panic!("expected group, got {other:?}"),
        }

        let kwda = &weap.subrecords[2];
        assert!(kwda.repeat);
        assert_eq!(kwda.field("Keyword").unwrap().repeat, Repeat::UntilExhausted);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = parse_records(
            r#"<Records><Record name="WEAP"><Subrecord name="DATA">
                 <Element name="X" type="double"/>
               </Subrecord></Record></Records>"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidFieldType { .. }));
    }

    #[test]
    fn test_bad_tag_is_rejected() {
        let err = parse_records(r#"<Records><Record name="WEAPON"/></Records>"#).unwrap_err();
        assert!(matches!(err, Error::Common(_)));
    }

    #[test]
    fn test_odd_options_are_rejected() {
        assert!(parse_options("Kind", "Sword;0;Axe").is_err());
        assert!(parse_options("Kind", "Sword;zero").is_err());
    }
}
