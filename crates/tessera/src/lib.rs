//! Tessera - Bethesda-style plugin file library.
//!
//! This crate provides a unified interface to the Tessera library ecosystem
//! for reading, inspecting, editing and writing plugin files.
//!
//! # Crates
//!
//! - [`tessera_common`] - Binary reading and writing, type tags, primitive conversions
//! - [`tessera_schema`] - Record and subrecord field layouts loaded from XML
//! - [`tessera_strings`] - Localized string tables (`.STRINGS`, `.DLSTRINGS`, `.ILSTRINGS`)
//! - [`tessera_plugin`] - The plugin tree with its decoder and encoder
//! - [`tessera_edit`] - Field formatting, write-back and batch edits
//!
//! # Example
//!
//! ```no_run
//! use tessera::prelude::*;
//!
//! let schema = Schema::load("records.xml")?;
//! let plugin = Plugin::open("Mod.esp", &DecodeOptions::new())?;
//! let lookup = PluginLookup::new(&plugin);
//!
//! for record in plugin.records(plugin.root())? {
//!     for subrecord in format_record(&plugin, record, &schema, &lookup)? {
//!         print!("{subrecord}");
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use tessera_common as common;
pub use tessera_edit as edit;
pub use tessera_plugin as plugin;
pub use tessera_schema as schema;
pub use tessera_strings as strings;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use tessera_common::{BinaryReader, BinaryWriter, Tag};
    pub use tessera_edit::{
        apply_batch, format_record, AssignOp, BatchCriteria, BatchReport, FormattedSubrecord,
        Lookup, PluginLookup, SubrecordEditor,
    };
    pub use tessera_plugin::{
        DecodeOptions, DecodeSession, EncodeOptions, GroupHeader, HeaderLayout, NodeId, NodeKind,
        Plugin, RecordHeader,
    };
    pub use tessera_schema::{Schema, SubrecordSchema};
    pub use tessera_strings::{LocalizedStrings, StringsKind};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
