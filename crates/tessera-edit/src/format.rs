//! Human-readable subrecord rendering.
//!
//! Formatting never fails: a subrecord whose bytes do not fit its layout is
//! rendered as [`FORMAT_WARNING`] plus a hex dump, so one malformed
//! subrecord cannot stop the rest of a record from being shown.

use std::fmt;

use tessera_common::{convert, Tag};
use tessera_plugin::{NodeId, Plugin};
use tessera_schema::{FieldSchema, FieldType, Schema, SubrecordSchema};
use tessera_strings::LocalizedStrings;

use crate::fields::{decode_fields, DecodedField, FieldValue, LStringValue};
use crate::Result;

/// Shown in place of fields when a subrecord does not match its layout.
pub const FORMAT_WARNING: &str = "Warning: subrecord does not match the expected layout";

/// Reverse lookups used while formatting.
pub trait Lookup {
    /// A label for the record with `form_id`.
    fn resolve_form_id(&self, form_id: u32) -> Option<String>;

    /// Text of a localized string.
    fn lookup_string(&self, id: u32) -> Option<&str>;
}

/// Resolves nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookup;

impl Lookup for NoLookup {
    fn resolve_form_id(&self, _form_id: u32) -> Option<String> {
        None
    }

    fn lookup_string(&self, _id: u32) -> Option<&str> {
        None
    }
}

/// Lookups against one plugin and, optionally, its string tables.
#[derive(Debug, Clone, Copy)]
pub struct PluginLookup<'a> {
    plugin: &'a Plugin,
    strings: Option<&'a LocalizedStrings>,
    links: bool,
}

impl<'a> PluginLookup<'a> {
    pub fn new(plugin: &'a Plugin) -> Self {
        Self {
            plugin,
            strings: None,
            links: true,
        }
    }

    pub fn with_strings(mut self, strings: &'a LocalizedStrings) -> Self {
        self.strings = Some(strings);
        self
    }

    /// Enable or disable FormID labels.
    pub fn with_links(mut self, links: bool) -> Self {
        self.links = links;
        self
    }
}

impl Lookup for PluginLookup<'_> {
    fn resolve_form_id(&self, form_id: u32) -> Option<String> {
        if !self.links {
            return None;
        }
        let record = self.plugin.lookup_form_id(form_id)?;
        self.plugin.description(record)
    }

    fn lookup_string(&self, id: u32) -> Option<&str> {
        self.strings?.lookup(id)
    }
}

/// One rendered field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedField {
    pub name: String,
    pub text: String,
}

/// A rendered subrecord.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedSubrecord {
    pub tag: Tag,
    pub desc: String,
    pub fields: Vec<FormattedField>,
    /// Set when the bytes could not be decoded with the layout.
    pub warning: Option<String>,
    /// Hex dump of bytes not covered by `fields`.
    pub hex: Option<String>,
}

impl FormattedSubrecord {
    pub fn is_ok(&self) -> bool {
        self.warning.is_none()
    }
}

impl fmt::Display for FormattedSubrecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.desc.is_empty() {
            writeln!(f, "[{}]", self.tag)?;
        } else {
            writeln!(f, "[{}] {}", self.tag, self.desc)?;
        }
        if let Some(warning) = &self.warning {
            writeln!(f, "{warning}")?;
        }
        for field in &self.fields {
            writeln!(f, "{}: {}", field.name, field.text)?;
        }
        if let Some(hex) = &self.hex {
            writeln!(f, "{hex}")?;
        }
        Ok(())
    }
}

/// Render a subrecord's bytes with its layout.
pub fn format(bytes: &[u8], schema: &SubrecordSchema, lookup: &dyn Lookup) -> FormattedSubrecord {
    let mut out = FormattedSubrecord {
        tag: schema.name,
        desc: schema.desc.clone(),
        fields: Vec::new(),
        warning: None,
        hex: None,
    };

    let fields = match decode_fields(bytes, schema) {
        Ok(fields) => fields,
        Err(e) => {
            tracing::warn!("Cannot format {} subrecord: {}", schema.name, e);
            out.warning = Some(FORMAT_WARNING.to_string());
            out.hex = Some(convert::to_hex(bytes));
            return out;
        }
    };

    out.fields = fields
        .iter()
        .filter(|field| !field.schema.info_only)
        .map(|field| FormattedField {
            name: label(field),
            text: render(field, lookup),
        })
        .collect();

    let consumed = fields.last().map_or(0, |f| f.offset + f.len());
    if consumed < bytes.len() {
        out.hex = Some(convert::to_hex(&bytes[consumed..]));
    }
    out
}

/// Render bytes without a layout as a single hex dump.
pub fn format_raw(tag: Tag, bytes: &[u8]) -> FormattedSubrecord {
    FormattedSubrecord {
        tag,
        desc: String::new(),
        fields: Vec::new(),
        warning: None,
        hex: Some(convert::to_hex(bytes)),
    }
}

/// Render every subrecord of a record, attaching layouts on demand.
pub fn format_record(
    plugin: &Plugin,
    record: NodeId,
    schema: &Schema,
    lookup: &dyn Lookup,
) -> Result<Vec<FormattedSubrecord>> {
    plugin.record(record)?;
    let mut out = Vec::with_capacity(plugin.children(record)?.len());
    for &child in plugin.children(record)? {
        let sub = plugin.subrecord(child)?;
        out.push(match plugin.attach_schema(child, schema) {
            Some(layout) => format(sub.data(), layout, lookup),
            None => format_raw(sub.tag(), sub.data()),
        });
    }
    Ok(out)
}

fn label(field: &DecodedField<'_>) -> String {
    let name = if field.schema.desc.is_empty() {
        &field.schema.name
    } else {
        &field.schema.desc
    };
    if field.schema.repeat.is_repeated() || field.index > 0 {
        format!("{name}[{}]", field.index)
    } else {
        name.clone()
    }
}

fn render(field: &DecodedField<'_>, lookup: &dyn Lookup) -> String {
    let schema = field.schema;
    match &field.value {
        FieldValue::Int { value, ty } => render_int(*value, *ty, schema),
        FieldValue::Float(value) => value.to_string(),
        FieldValue::Text(text) => text.clone(),
        FieldValue::FormId(id) => match lookup.resolve_form_id(*id) {
            Some(target) => format!("{id:08X} : {target}"),
            None => format!("{id:08X}"),
        },
        FieldValue::LString(value) => render_lstring(field.raw(), value, lookup),
        FieldValue::Blob(bytes) => convert::to_hex(bytes),
    }
}

fn render_int(value: i64, ty: FieldType, schema: &FieldSchema) -> String {
    let width = ty.fixed_width().unwrap_or(4);
    let unsigned = (value as u64) & (u64::MAX >> (64 - width * 8));

    let mut text = if schema.hex {
        format!("0x{unsigned:0digits$X}", digits = width * 2)
    } else {
        value.to_string()
    };

    if let Some(name) = schema.option_name(value) {
        text.push_str(&format!(" ({name})"));
    } else {
        let names = schema.flag_names(unsigned);
        if !names.is_empty() {
            text.push_str(&format!(" ({})", names.join(" | ")));
        }
    }
    text
}

/// A four-byte span is shown as a string ID when it does not look like
/// text, or when the string tables know it. The guess is a heuristic; a
/// short inline string can be mistaken for an ID and the reverse.
fn render_lstring(raw: &[u8], value: &LStringValue, lookup: &dyn Lookup) -> String {
    if raw.len() == 4 {
        let id = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let known = lookup.lookup_string(id);
        if !convert::is_likely_string(raw) || known.is_some() {
            return match known {
                Some(text) => format!("[{id:08X}] {text}"),
                None => format!("[{id:08X}]"),
            };
        }
    }
    match value {
        LStringValue::Inline(text) => text.clone(),
        LStringValue::Id(id) => format!("[{id:08X}]"),
    }
}
