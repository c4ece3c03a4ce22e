//! Schema-driven field editing for Tessera.
//!
//! This crate sits on top of the plugin tree and the schema:
//!
//! - [`fields`] - Decode a subrecord's bytes into typed [`FieldValue`]s and back
//! - [`format`](mod@format) - Render subrecords for display, with FormID and string lookups
//! - [`SubrecordEditor`] - Assign new values to fields and write them back
//! - [`apply_batch`] - Apply create/delete/assign criteria across many records
//!
//! # Example
//!
//! ```no_run
//! use tessera_edit::{AssignOp, SubrecordEditor};
//! use tessera_plugin::{DecodeOptions, Plugin};
//! use tessera_schema::Schema;
//!
//! let schema = Schema::load("records.xml")?;
//! let mut plugin = Plugin::open("Mod.esp", &DecodeOptions::new())?;
//!
//! let record = plugin.lookup_form_id(0x0001_2EB7).unwrap();
//! let data = plugin.find_subrecord(record, "DATA".parse()?).unwrap();
//!
//! let mut editor = SubrecordEditor::open(&plugin, data, &schema)?;
//! editor.assign("Value", AssignOp::Multiply, "2")?;
//! editor.finish(&mut plugin)?;
//! plugin.save("Mod.esp")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod assign;
mod batch;
mod error;

pub mod fields;
pub mod format;

pub use assign::{assign_value, AssignOp, SubrecordEditor};
pub use batch::{
    apply_batch, BatchCriteria, BatchFailure, BatchReport, FieldAssignment, SubrecordAction,
    SubrecordCriteria,
};
pub use error::{Error, Result};
pub use fields::{decode_fields, encode_field, encode_fields, DecodedField, FieldValue, LStringValue};
pub use format::{
    format_raw, format_record, FormattedField, FormattedSubrecord, Lookup, NoLookup, PluginLookup,
    FORMAT_WARNING,
};
