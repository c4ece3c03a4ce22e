//! Field value write-back.

use std::fmt;

use serde::Deserialize;
use tessera_common::convert;
use tessera_plugin::{NodeId, Plugin};
use tessera_schema::{FieldType, Schema, SubrecordSchema};

use crate::fields::{decode_fields, DecodedField, FieldValue, LStringValue};
use crate::{Error, Result};

/// How a new value combines with the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignOp {
    Set,
    Add,
    Subtract,
    Multiply,
    Divide,
    BitAnd,
    BitOr,
    /// Reset to zero or empty. The operand is ignored.
    Clear,
}

impl AssignOp {
    pub fn name(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
            Self::BitAnd => "bit_and",
            Self::BitOr => "bit_or",
            Self::Clear => "clear",
        }
    }
}

impl fmt::Display for AssignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Apply `op` with operand `raw` to a decoded field.
///
/// Integer and FormID fields accept every operation and wrap within their
/// width. Floats accept everything except the bitwise operations. Text,
/// localized strings and blobs accept only `Set` and `Clear`. On error the
/// field is left unchanged.
pub fn assign_value(op: AssignOp, field: &mut DecodedField<'_>, raw: &str) -> Result<()> {
    let schema = field.schema;
    if schema.info_only {
        return Err(Error::ReadOnlyField(schema.name.clone()));
    }
    let unsupported = || Error::UnsupportedOperation {
        op,
        field_type: schema.field_type,
    };
    let invalid = || Error::InvalidValue {
        field: schema.name.clone(),
        value: raw.to_string(),
    };

    if op == AssignOp::Clear {
        let cleared = match &field.value {
            FieldValue::LString(LStringValue::Id(_)) => FieldValue::LString(LStringValue::Id(0)),
            _ => FieldValue::zero(schema),
        };
        field.set_value(cleared);
        return Ok(());
    }

    let value = match &field.value {
        FieldValue::Int { value, ty } => {
            let operand = convert::parse_int(raw).map_err(|_| invalid())?;
            let result = integer_op(op, *value, operand, &schema.name)?;
            FieldValue::Int {
                value: wrap(result, *ty),
                ty: *ty,
            }
        }
        FieldValue::FormId(id) => {
            let operand = convert::parse_int(raw).map_err(|_| invalid())?;
            let result = integer_op(op, i64::from(*id), operand, &schema.name)?;
            FieldValue::FormId(result as u32)
        }
        FieldValue::Float(current) => {
            let operand: f32 = raw.trim().parse().map_err(|_| invalid())?;
            let result = match op {
                AssignOp::Set => operand,
                AssignOp::Add => current + operand,
                AssignOp::Subtract => current - operand,
                AssignOp::Multiply => current * operand,
                AssignOp::Divide if operand == 0.0 => {
                    return Err(Error::DivideByZero(schema.name.clone()))
                }
                AssignOp::Divide => current / operand,
                _ => return Err(unsupported()),
            };
            FieldValue::Float(result)
        }
        _ if op != AssignOp::Set => return Err(unsupported()),
        FieldValue::Text(_) => {
            if schema.field_type == FieldType::Str4 && raw.len() > 4 {
                return Err(invalid());
            }
            FieldValue::Text(raw.to_string())
        }
        FieldValue::LString(LStringValue::Id(_)) => match convert::parse_int(raw) {
            Ok(id) => FieldValue::LString(LStringValue::Id(id as u32)),
            Err(_) => FieldValue::LString(LStringValue::Inline(raw.to_string())),
        },
        FieldValue::LString(LStringValue::Inline(_)) => {
            FieldValue::LString(LStringValue::Inline(raw.to_string()))
        }
        FieldValue::Blob(_) => {
            let bytes = parse_hex(raw).ok_or_else(invalid)?;
            if schema.blob_len.is_some_and(|len| len != bytes.len()) {
                return Err(invalid());
            }
            FieldValue::Blob(bytes)
        }
    };

    field.set_value(value);
    Ok(())
}

fn integer_op(op: AssignOp, current: i64, operand: i64, name: &str) -> Result<i64> {
    Ok(match op {
        AssignOp::Set => operand,
        AssignOp::Add => current.wrapping_add(operand),
        AssignOp::Subtract => current.wrapping_sub(operand),
        AssignOp::Multiply => current.wrapping_mul(operand),
        AssignOp::Divide if operand == 0 => return Err(Error::DivideByZero(name.to_string())),
        AssignOp::Divide => current.wrapping_div(operand),
        AssignOp::BitAnd => current & operand,
        AssignOp::BitOr => current | operand,
        AssignOp::Clear => 0,
    })
}

/// Truncate to the width of `ty`, keeping its signedness.
fn wrap(value: i64, ty: FieldType) -> i64 {
    match ty {
        FieldType::SByte => i64::from(value as i8),
        FieldType::Byte => i64::from(value as u8),
        FieldType::Short => i64::from(value as i16),
        FieldType::UShort => i64::from(value as u16),
        FieldType::Int => i64::from(value as i32),
        FieldType::UInt => i64::from(value as u32),
        _ => value,
    }
}

/// Parse hex digits, ignoring whitespace.
fn parse_hex(text: &str) -> Option<Vec<u8>> {
    let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(pair, 16).ok()
        })
        .collect()
}

/// Decodes one subrecord, applies assignments and writes the result back.
///
/// Changes only reach the plugin in [`finish`](Self::finish), which replaces
/// the subrecord's bytes in a single step.
#[derive(Debug)]
pub struct SubrecordEditor<'s> {
    node: NodeId,
    schema: &'s SubrecordSchema,
    original: Vec<u8>,
    fields: Vec<DecodedField<'s>>,
}

impl<'s> SubrecordEditor<'s> {
    /// Open a subrecord, resolving its layout through `schema`.
    pub fn open(plugin: &Plugin, node: NodeId, schema: &'s Schema) -> Result<Self> {
        let layout = match plugin.attach_schema(node, schema) {
            Some(layout) => layout,
            None => {
                let subrecord = plugin.subrecord(node)?.tag();
                let record = plugin
                    .parent(node)?
                    .and_then(|parent| plugin.tag(parent))
                    .unwrap_or_default();
                return Err(Error::NoSchema { record, subrecord });
            }
        };
        Self::with_schema(plugin, node, layout)
    }

    /// Open a subrecord with an explicit layout.
    pub fn with_schema(plugin: &Plugin, node: NodeId, schema: &'s SubrecordSchema) -> Result<Self> {
        let original = plugin.subrecord(node)?.data().to_vec();
        let fields = decode_fields(&original, schema)?;
        Ok(Self {
            node,
            schema,
            original,
            fields,
        })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn schema(&self) -> &'s SubrecordSchema {
        self.schema
    }

    pub fn fields(&self) -> &[DecodedField<'s>] {
        &self.fields
    }

    /// The first occurrence of a field (case-insensitive).
    pub fn field(&self, name: &str) -> Option<&DecodedField<'s>> {
        self.fields.iter().find(|f| f.name().eq_ignore_ascii_case(name))
    }

    /// Assign to the first occurrence of a field.
    pub fn assign(&mut self, name: &str, op: AssignOp, raw: &str) -> Result<()> {
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::FieldNotFound(name.to_string()))?;
        assign_value(op, field, raw)
    }

    /// Assign to the field at `index` in [`fields`](Self::fields).
    pub fn assign_at(&mut self, index: usize, op: AssignOp, raw: &str) -> Result<()> {
        let field = self
            .fields
            .get_mut(index)
            .ok_or_else(|| Error::FieldNotFound(format!("#{index}")))?;
        assign_value(op, field, raw)
    }

    /// Assign to every occurrence of a field. Returns how many were changed.
    pub fn assign_all(&mut self, name: &str, op: AssignOp, raw: &str) -> Result<usize> {
        let mut count = 0;
        for field in self
            .fields
            .iter_mut()
            .filter(|f| f.name().eq_ignore_ascii_case(name))
        {
            assign_value(op, field, raw)?;
            count += 1;
        }
        if count == 0 {
            return Err(Error::FieldNotFound(name.to_string()));
        }
        Ok(count)
    }

    pub fn is_modified(&self) -> bool {
        self.fields.iter().any(DecodedField::is_modified)
    }

    /// The subrecord bytes with all assignments applied.
    ///
    /// When every field keeps its width the changed segments are patched
    /// over a copy of the original bytes; otherwise all fields are
    /// re-serialized in order. Bytes past the last field are kept.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let segments = self
            .fields
            .iter()
            .map(DecodedField::encode)
            .collect::<Result<Vec<_>>>()?;
        let same_width = self
            .fields
            .iter()
            .zip(&segments)
            .all(|(field, bytes)| field.len() == bytes.len());

        if same_width {
            let mut out = self.original.clone();
            for (field, bytes) in self.fields.iter().zip(&segments) {
                if field.is_modified() {
                    out[field.offset..field.offset + bytes.len()].copy_from_slice(bytes);
                }
            }
            return Ok(out);
        }

        let consumed = self.fields.last().map_or(0, |f| f.offset + f.len());
        let mut out = segments.concat();
        out.extend_from_slice(&self.original[consumed..]);
        Ok(out)
    }

    /// Write the edited bytes back. Returns `false`, without touching the
    /// plugin, when nothing was changed.
    pub fn finish(self, plugin: &mut Plugin) -> Result<bool> {
        if !self.is_modified() {
            return Ok(false);
        }
        let bytes = self.to_bytes()?;
        if bytes == self.original {
            return Ok(false);
        }
        plugin.set_subrecord_data(self.node, bytes)?;
        Ok(true)
    }
}
