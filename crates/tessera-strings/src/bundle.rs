//! The three tables belonging to one plugin.

use std::fs;
use std::path::{Path, PathBuf};

use crate::{Result, StringTable, StringsKind};

/// Path of a plugin's string table: `<dir>/Strings/<stem>_<locale>.<EXT>`.
pub fn strings_path(plugin: &Path, locale: &str, kind: StringsKind) -> PathBuf {
    let dir = plugin.parent().unwrap_or_else(|| Path::new(""));
    let stem = plugin
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    dir.join("Strings")
        .join(format!("{stem}_{locale}.{}", kind.extension()))
}

/// Localized strings for one plugin and locale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalizedStrings {
    strings: StringTable,
    dlstrings: StringTable,
    ilstrings: StringTable,
}

impl LocalizedStrings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load all three tables next to `plugin`. Missing files are empty.
    pub fn load_for_plugin<P: AsRef<Path>>(plugin: P, locale: &str) -> Result<Self> {
        let plugin = plugin.as_ref();
        let mut bundle = Self::new();
        for kind in StringsKind::ALL {
            *bundle.table_mut(kind) = StringTable::load(strings_path(plugin, locale, kind), kind)?;
        }
        tracing::debug!(
            "Loaded {} localized strings for {} ({locale})",
            bundle.len(),
            plugin.display()
        );
        Ok(bundle)
    }

    /// Rewrite all three tables next to `plugin`, creating `Strings/` if needed.
    pub fn save_for_plugin<P: AsRef<Path>>(&self, plugin: P, locale: &str) -> Result<()> {
        let plugin = plugin.as_ref();
        for kind in StringsKind::ALL {
            let path = strings_path(plugin, locale, kind);
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            self.table(kind).save(&path, kind)?;
        }
        Ok(())
    }

    /// Find a string by ID, searching plain, DL and IL tables in that order.
    pub fn lookup(&self, id: u32) -> Option<&str> {
        StringsKind::ALL
            .into_iter()
            .find_map(|kind| self.table(kind).get(id))
    }

    pub fn contains(&self, id: u32) -> bool {
        self.lookup(id).is_some()
    }

    pub fn table(&self, kind: StringsKind) -> &StringTable {
        match kind {
            StringsKind::Strings => &self.strings,
            StringsKind::DlStrings => &self.dlstrings,
            StringsKind::IlStrings => &self.ilstrings,
        }
    }

    pub fn table_mut(&mut self, kind: StringsKind) -> &mut StringTable {
        match kind {
            StringsKind::Strings => &mut self.strings,
            StringsKind::DlStrings => &mut self.dlstrings,
            StringsKind::IlStrings => &mut self.ilstrings,
        }
    }

    /// Total number of entries across all tables.
    pub fn len(&self) -> usize {
        StringsKind::ALL.iter().map(|&k| self.table(k).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
