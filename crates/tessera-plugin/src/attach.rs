//! On-demand schema attachment.
//!
//! A subrecord remembers the result of its schema lookup as coordinates into
//! the [`Schema`], never a reference, so the tree does not borrow from it.
//! The first lookup walks the record and subrecord tables; later ones reuse
//! the stored coordinates. Call [`Plugin::detach_all_schemas`] before
//! switching to a different schema.

use tessera_schema::{Schema, SubrecordSchema};

use crate::node::NodeData;
use crate::{NodeId, Plugin, SchemaSlot};

impl Plugin {
    /// Resolve the layout of a subrecord, caching the outcome on the node.
    ///
    /// Returns `None` for nodes that are not subrecords, for subrecords
    /// without a parent record, and for unknown record or subrecord types.
    pub fn attach_schema<'s>(&self, id: NodeId, schema: &'s Schema) -> Option<&'s SubrecordSchema> {
        let sub = self.subrecord(id).ok()?;
        let record = self.parent(id).ok()??;
        let record_tag = self.record(record).ok()?.tag;

        match sub.schema_slot() {
            SchemaSlot::Matched(coords) => {
                let cached = schema
                    .records()
                    .get(coords.record as usize)
                    .filter(|r| r.name == record_tag)
                    .and_then(|_| schema.subrecord(coords))
                    .filter(|s| s.name == sub.tag());
                if cached.is_some() {
                    return cached;
                }
            }
            SchemaSlot::Missing => return None,
            SchemaSlot::Unresolved => {}
        }

        match schema.resolve(record_tag, sub.tag()) {
            Some(coords) => {
                sub.set_schema_slot(SchemaSlot::Matched(coords));
                schema.subrecord(coords)
            }
            None => {
                tracing::trace!("No schema for {}/{}", record_tag, sub.tag());
                sub.set_schema_slot(SchemaSlot::Missing);
                None
            }
        }
    }

    /// Forget the cached lookup of one subrecord.
    pub fn detach_schema(&self, id: NodeId) {
        if let Ok(sub) = self.subrecord(id) {
            sub.set_schema_slot(SchemaSlot::Unresolved);
        }
    }

    /// Forget every cached lookup.
    pub fn detach_all_schemas(&self) {
        self.for_each_subrecord(|_, sub| sub.set_schema_slot(SchemaSlot::Unresolved));
    }

    /// Resolve every subrecord in the tree. Returns how many matched.
    pub fn attach_all(&self, schema: &Schema) -> usize {
        let mut ids = Vec::new();
        self.for_each_subrecord(|id, _| ids.push(id));
        ids.into_iter()
            .filter(|&id| self.attach_schema(id, schema).is_some())
            .count()
    }

    fn for_each_subrecord<F: FnMut(NodeId, &crate::Subrecord)>(&self, mut f: F) {
        for id in self.descendants(self.root()).unwrap_or_default() {
            if let Ok(NodeData::Subrecord(sub)) = self.node(id).map(|n| &n.data) {
                f(id, sub);
            }
        }
    }
}
