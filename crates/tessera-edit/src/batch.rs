//! Batch edits across many records.
//!
//! Criteria are usually read from JSON:
//!
//! ```json
//! {
//!   "record_type": "WEAP",
//!   "subrecords": [
//!     { "name": "DATA", "assignments": [{ "field": "Value", "op": "multiply", "value": "2" }] },
//!     { "name": "DESC", "action": "delete" },
//!     { "name": "ZNAM", "action": "create" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Deserializer};
use tessera_common::Tag;
use tessera_plugin::{NodeId, Plugin};
use tessera_schema::{RecordSchema, Schema};

use crate::fields::default_bytes;
use crate::{AssignOp, Error, Result, SubrecordEditor};

/// What happens to a subrecord before field assignments run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubrecordAction {
    #[default]
    Keep,
    /// Add the subrecord, zero-filled, when the record lacks it.
    Create,
    /// Remove every instance of the subrecord.
    Delete,
}

/// One field assignment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldAssignment {
    pub field: String,
    pub op: AssignOp,
    #[serde(default)]
    pub value: String,
}

/// Conditions and assignments for one subrecord type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubrecordCriteria {
    #[serde(deserialize_with = "tag_from_str")]
    pub name: Tag,
    #[serde(default)]
    pub action: SubrecordAction,
    #[serde(default)]
    pub assignments: Vec<FieldAssignment>,
}

/// A complete batch edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BatchCriteria {
    /// Only records of this type are touched.
    #[serde(default, deserialize_with = "optional_tag_from_str")]
    pub record_type: Option<Tag>,
    #[serde(default)]
    pub subrecords: Vec<SubrecordCriteria>,
}

fn tag_from_str<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Tag, D::Error> {
    let text = String::deserialize(deserializer)?;
    text.parse().map_err(serde::de::Error::custom)
}

fn optional_tag_from_str<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Tag>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        Some(text) => text.parse().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// A failed record or field.
#[derive(Debug)]
pub struct BatchFailure {
    pub record: NodeId,
    pub form_id: u32,
    /// Set when only one field assignment failed.
    pub field: Option<String>,
    pub error: Error,
}

/// Outcome of [`apply_batch`].
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Records matching the criteria's record type.
    pub records: usize,
    /// Records whose subrecords changed.
    pub modified: usize,
    pub created: usize,
    pub deleted: usize,
    /// Field occurrences assigned.
    pub assigned: usize,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Apply `criteria` to each of `records`.
///
/// Each record first gets its subrecord creations and deletions, then the
/// field assignments on every remaining matching subrecord. A failing
/// record is recorded in the report and the batch moves on.
pub fn apply_batch(
    plugin: &mut Plugin,
    schema: &Schema,
    records: &[NodeId],
    criteria: &BatchCriteria,
) -> BatchReport {
    let mut report = BatchReport::default();

    for &record in records {
        let header = match plugin.record(record) {
            Ok(header) => *header,
            Err(e) => {
                tracing::warn!("Skipping {} in batch: {}", record, e);
                report.failures.push(BatchFailure {
                    record,
                    form_id: 0,
                    field: None,
                    error: e.into(),
                });
                continue;
            }
        };
        if criteria.record_type.is_some_and(|t| t != header.tag) {
            continue;
        }
        report.records += 1;

        match apply_to_record(plugin, schema, record, header.tag, header.form_id, criteria, &mut report) {
            Ok(true) => report.modified += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("Batch edit of {} {:08X} failed: {}", header.tag, header.form_id, e);
                report.failures.push(BatchFailure {
                    record,
                    form_id: header.form_id,
                    field: None,
                    error: e,
                });
            }
        }
    }

    tracing::debug!(
        "Batch edit: {} records, {} modified, {} failures",
        report.records,
        report.modified,
        report.failures.len()
    );
    report
}

fn apply_to_record(
    plugin: &mut Plugin,
    schema: &Schema,
    record: NodeId,
    record_tag: Tag,
    form_id: u32,
    criteria: &BatchCriteria,
    report: &mut BatchReport,
) -> Result<bool> {
    let record_schema = schema.lookup_record_schema(record_tag);
    let mut changed = false;

    for sub in &criteria.subrecords {
        match sub.action {
            SubrecordAction::Keep => {}
            SubrecordAction::Create => {
                if plugin.find_subrecord(record, sub.name).is_some() {
                    continue;
                }
                let layout = record_schema
                    .and_then(|r| r.lookup_subrecord_schema(sub.name))
                    .ok_or(Error::NoSchema {
                        record: record_tag,
                        subrecord: sub.name,
                    })?;
                let index = insertion_index(plugin, record, record_schema, sub.name)?;
                let node = plugin.new_subrecord(sub.name, default_bytes(layout)?);
                plugin.insert_child(record, index, node)?;
                report.created += 1;
                changed = true;
            }
            SubrecordAction::Delete => {
                for node in plugin.subrecords_with_tag(record, sub.name)? {
                    plugin.delete_child(record, node)?;
                    report.deleted += 1;
                    changed = true;
                }
            }
        }
    }

    for sub in &criteria.subrecords {
        if sub.action == SubrecordAction::Delete || sub.assignments.is_empty() {
            continue;
        }
        for node in plugin.subrecords_with_tag(record, sub.name)? {
            let mut editor = SubrecordEditor::open(plugin, node, schema)?;
            for assignment in &sub.assignments {
                match editor.assign_all(&assignment.field, assignment.op, &assignment.value) {
                    Ok(count) => report.assigned += count,
                    Err(e) => {
                        tracing::warn!(
                            "{} {:08X}: cannot {} {}.{}: {}",
                            record_tag,
                            form_id,
                            assignment.op,
                            sub.name,
                            assignment.field,
                            e
                        );
                        report.failures.push(BatchFailure {
                            record,
                            form_id,
                            field: Some(assignment.field.clone()),
                            error: e,
                        });
                    }
                }
            }
            changed |= editor.finish(plugin)?;
        }
    }

    Ok(changed)
}

/// Where a new subrecord goes: before the first existing subrecord that
/// comes later in the layout's order, else at the end.
fn insertion_index(
    plugin: &Plugin,
    record: NodeId,
    record_schema: Option<&RecordSchema>,
    tag: Tag,
) -> Result<usize> {
    let children = plugin.children(record)?;
    let Some(order) = record_schema.and_then(|r| r.subrecord_order(tag)) else {
        return Ok(children.len());
    };
    let later = children.iter().position(|&child| {
        plugin
            .tag(child)
            .and_then(|t| record_schema.and_then(|r| r.subrecord_order(t)))
            .is_some_and(|o| o > order)
    });
    Ok(later.unwrap_or(children.len()))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tessera_plugin::{HeaderLayout, RecordHeader};
    use tessera_schema::{FieldSchema, FieldType, SubrecordSchema};

    use super::*;

    fn tag(s: &str) -> Tag {
        s.parse().unwrap()
    }

    #[test]
    fn test_criteria_from_json() {
        let criteria: BatchCriteria = serde_json::from_str(
            r#"{
                "record_type": "WEAP",
                "subrecords": [
                    { "name": "DATA", "assignments": [{ "field": "Value", "op": "bit_or", "value": "0x4" }] },
                    { "name": "DESC", "action": "delete" }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(criteria.record_type, Some(tag("WEAP")));
        assert_eq!(criteria.subrecords[0].action, SubrecordAction::Keep);
        assert_eq!(criteria.subrecords[0].assignments[0].op, AssignOp::BitOr);
        assert_eq!(criteria.subrecords[1].action, SubrecordAction::Delete);

        assert!(serde_json::from_str::<BatchCriteria>(r#"{ "record_type": "TOOLONG" }"#).is_err());
    }

    #[test]
    fn test_insertion_index_follows_layout() {
        let schema = RecordSchema::new(tag("WEAP"))
            .subrecord(SubrecordSchema::new(tag("EDID")))
            .subrecord(SubrecordSchema::new(tag("FULL")))
            .subrecord(SubrecordSchema::new(tag("DATA")).node(FieldSchema::new("V", FieldType::UInt)));

        let mut plugin = Plugin::new("Test.esp", HeaderLayout::Standard);
        let record = plugin.new_record(RecordHeader::new(tag("WEAP"), 1));
        plugin.add_child(plugin.root(), record).unwrap();
        for name in ["EDID", "DATA"] {
            let sub = plugin.new_subrecord(tag(name), vec![]);
            plugin.add_child(record, sub).unwrap();
        }

        assert_eq!(insertion_index(&plugin, record, Some(&schema), tag("FULL")).unwrap(), 1);
        assert_eq!(insertion_index(&plugin, record, Some(&schema), tag("XXXX")).unwrap(), 2);
        assert_eq!(insertion_index(&plugin, record, None, tag("FULL")).unwrap(), 2);
    }
}
