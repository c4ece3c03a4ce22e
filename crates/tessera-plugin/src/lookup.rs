//! FormID index and editor ID helpers.

use crate::format::{EDITOR_ID_TAG, MASTER_TAG};
use crate::node::NodeData;
use crate::{FxHashMap, NodeId, Plugin, Result};

impl Plugin {
    /// Find the record with `form_id`.
    ///
    /// The index is built on first use by walking the tree, and dropped by
    /// every structural mutation. If several records share a FormID, the
    /// first in tree order wins.
    pub fn lookup_form_id(&self, form_id: u32) -> Option<NodeId> {
        self.form_ids
            .get_or_init(|| self.build_form_id_index())
            .get(&form_id)
            .copied()
    }

    fn build_form_id_index(&self) -> FxHashMap<u32, NodeId> {
        let mut index = FxHashMap::default();
        for id in self.descendants(self.root()).unwrap_or_default() {
            if let Ok(NodeData::Record(header)) = self.node(id).map(|n| &n.data) {
                index.entry(header.form_id).or_insert(id);
            }
        }
        tracing::trace!("Built FormID index with {} entries", index.len());
        index
    }

    /// The editor ID of a record, without its terminator.
    pub fn editor_id(&self, record: NodeId) -> Option<String> {
        let edid = self.find_subrecord(record, EDITOR_ID_TAG)?;
        let text = self.subrecord(edid).ok()?.as_cstr();
        (!text.is_empty()).then_some(text)
    }

    /// Editor IDs of every record in the subtree rooted at `id`.
    pub fn get_ids(&self, id: NodeId, lowercase: bool) -> Result<Vec<String>> {
        Ok(self
            .records(id)?
            .into_iter()
            .filter_map(|record| self.editor_id(record))
            .map(|text| if lowercase { text.to_lowercase() } else { text })
            .collect())
    }

    /// A label for a record: editor ID (if any), type and FormID.
    pub fn description(&self, record: NodeId) -> Option<String> {
        let header = self.record(record).ok()?;
        let key = format!("[{}:{:08X}]", header.tag, header.form_id);
        Some(match self.editor_id(record) {
            Some(edid) => format!("{edid} {key}"),
            None => key,
        })
    }

    /// Master file names listed by the header record.
    pub fn masters(&self) -> Vec<String> {
        let Some(header) = self.header_record() else {
            return Vec::new();
        };
        self.subrecords_with_tag(header, MASTER_TAG)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|id| self.subrecord(id).ok().map(|s| s.as_cstr()))
            .collect()
    }
}
