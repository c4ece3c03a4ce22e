//! The loaded schema.

use std::hash::BuildHasherDefault;
use std::path::Path;

use hashbrown::HashMap as FastHashMap;
use rustc_hash::FxHasher;
use tessera_common::Tag;

use crate::{RecordSchema, Result, SubrecordSchema};

type FxHashMap<K, V> = FastHashMap<K, V, BuildHasherDefault<FxHasher>>;

/// Stable coordinates of a subrecord layout inside a [`Schema`].
///
/// Subrecord nodes keep one of these instead of a reference so that the
/// plugin tree never borrows from the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubrecordSchemaId {
    pub record: u32,
    pub subrecord: u32,
}

/// Immutable collection of record layouts, indexed by record type.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    records: Vec<RecordSchema>,
    index: FxHashMap<Tag, usize>,
}

impl Schema {
    /// Build a schema from record layouts. Later duplicates of a record type
    /// are kept in [`records`](Self::records) but never returned by lookups.
    pub fn from_records(records: Vec<RecordSchema>) -> Self {
        let mut index = FxHashMap::default();
        for (i, record) in records.iter().enumerate() {
            index.entry(record.name).or_insert(i);
        }
        Self { records, index }
    }

    /// Parse a schema from XML definition text.
    pub fn from_xml_str(text: &str) -> Result<Self> {
        let records = crate::xml::parse_records(text)?;
        tracing::debug!("Loaded schema with {} record types", records.len());
        Ok(Self::from_records(records))
    }

    /// Load a schema from an XML definition file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_xml_str(&text)
    }

    /// Look up the layout of a record type.
    #[inline]
    pub fn lookup_record_schema(&self, name: Tag) -> Option<&RecordSchema> {
        self.index.get(&name).map(|&i| &self.records[i])
    }

    /// Resolve a record/subrecord pair to stable coordinates.
    pub fn resolve(&self, record: Tag, subrecord: Tag) -> Option<SubrecordSchemaId> {
        let record_index = *self.index.get(&record)?;
        let subrecord_index = self.records[record_index].subrecord_order(subrecord)?;
        Some(SubrecordSchemaId {
            record: record_index as u32,
            subrecord: subrecord_index as u32,
        })
    }

    /// Fetch a subrecord layout by coordinates from [`resolve`](Self::resolve).
    pub fn subrecord(&self, id: SubrecordSchemaId) -> Option<&SubrecordSchema> {
        self.records
            .get(id.record as usize)?
            .subrecords
            .get(id.subrecord as usize)
    }

    /// All record layouts in definition order.
    pub fn records(&self) -> &[RecordSchema] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldSchema, FieldType};

    fn tag(s: &str) -> Tag {
        s.parse().unwrap()
    }

    fn sample() -> Schema {
        Schema::from_records(vec![
            RecordSchema::new(tag("WEAP"))
                .subrecord(
                    SubrecordSchema::new(tag("EDID"))
                        .node(FieldSchema::new("ID", FieldType::String)),
                )
                .subrecord(
                    SubrecordSchema::new(tag("DATA"))
                        .node(FieldSchema::new("Value", FieldType::UInt)),
                ),
            RecordSchema::new(tag("WEAP")).desc("shadowed duplicate"),
        ])
    }

    #[test]
    fn test_lookup() {
        let schema = sample();
        let weap = schema.lookup_record_schema(tag("WEAP")).unwrap();
        assert_eq!(weap.desc, "");
        assert!(weap.lookup_subrecord_schema(tag("DATA")).is_some());
        assert!(weap.lookup_subrecord_schema(tag("FULL")).is_none());
        assert!(schema.lookup_record_schema(tag("ARMO")).is_none());
    }

    #[test]
    fn test_resolve_round_trip() {
        let schema = sample();
        let id = schema.resolve(tag("WEAP"), tag("DATA")).unwrap();
        assert_eq!(id, SubrecordSchemaId { record: 0, subrecord: 1 });
        assert_eq!(schema.subrecord(id).unwrap().name, tag("DATA"));
        assert!(schema.resolve(tag("WEAP"), tag("MODL")).is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.xml");
        std::fs::write(
            &path,
            r#"<Records><Record name="ARMO"><Subrecord name="EDID"/></Record></Records>"#,
        )
        .unwrap();

        let schema = Schema::load(&path).unwrap();
        assert_eq!(schema.len(), 1);
        assert!(schema.resolve(tag("ARMO"), tag("EDID")).is_some());
    }
}
