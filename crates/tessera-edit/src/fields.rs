//! Typed field values and the subrecord field walker.
//!
//! [`decode_fields`] walks a subrecord layout left to right over the raw
//! bytes. Each decoded field keeps the exact bytes it was read from, so an
//! untouched field always re-encodes to its original bytes even when its
//! text did not decode cleanly.

use std::fmt;

use tessera_common::{convert, BinaryReader};
use tessera_schema::{FieldNode, FieldSchema, FieldType, Repeat, SubrecordSchema};

use crate::{Error, Result};

/// A localized string field: a string table ID or inline text.
#[derive(Debug, Clone, PartialEq)]
pub enum LStringValue {
    Id(u32),
    Inline(String),
}

/// The value of one decoded field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Any integer type, widened. Always holds a value in range of `ty`.
    Int { value: i64, ty: FieldType },
    Float(f32),
    /// Fixed, null-terminated and length-prefixed strings.
    Text(String),
    LString(LStringValue),
    FormId(u32),
    Blob(Vec<u8>),
}

impl FieldValue {
    /// The zero or empty value of a field.
    pub fn zero(field: &FieldSchema) -> Self {
        let ty = field.field_type;
        match ty {
            _ if ty.is_integer() => Self::Int { value: 0, ty },
            FieldType::Float => Self::Float(0.0),
            FieldType::LString => Self::LString(LStringValue::Inline(String::new())),
            FieldType::FormId => Self::FormId(0),
            FieldType::Blob => Self::Blob(vec![0; field.blob_len.unwrap_or(0)]),
            _ => Self::Text(String::new()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int { value, .. } => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(text) | Self::LString(LStringValue::Inline(text)) => f.write_str(text),
            Self::LString(LStringValue::Id(id)) => write!(f, "[{id:08X}]"),
            Self::FormId(id) => write!(f, "{id:08X}"),
            Self::Blob(bytes) => f.write_str(&convert::to_hex(bytes)),
        }
    }
}

/// One occurrence of a field in a subrecord.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedField<'s> {
    pub schema: &'s FieldSchema,
    /// Byte offset of the field in the subrecord.
    pub offset: usize,
    /// Occurrence number for repeated fields and groups.
    pub index: usize,
    pub value: FieldValue,
    raw: Vec<u8>,
    modified: bool,
}

impl<'s> DecodedField<'s> {
    /// A field that was not read from bytes, such as one being created.
    pub fn new(schema: &'s FieldSchema, value: FieldValue) -> Result<Self> {
        let raw = encode_field(schema.field_type, &value)?;
        Ok(Self {
            schema,
            offset: 0,
            index: 0,
            value,
            raw,
            modified: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    /// Length of the bytes the field was decoded from.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// The bytes the field was decoded from.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Whether [`value`](Self::value) was changed since decoding.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Replace the value, marking the field as modified.
    pub fn set_value(&mut self, value: FieldValue) {
        self.value = value;
        self.modified = true;
    }

    /// The field's current encoding.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.modified {
            encode_field(self.schema.field_type, &self.value)
        } else {
            Ok(self.raw.clone())
        }
    }
}

/// Decode every field of a subrecord.
///
/// Informational fields are decoded like any other so the cursor stays in
/// step. A trailing optional field or group is skipped when the cursor is
/// already at the end. Bytes left over after the last field are not
/// reported here.
pub fn decode_fields<'s>(bytes: &[u8], schema: &'s SubrecordSchema) -> Result<Vec<DecodedField<'s>>> {
    let mut reader = BinaryReader::new(bytes);
    let mut out = Vec::new();

    for node in &schema.nodes {
        match node {
            FieldNode::Field(field) => {
                for_each_occurrence(&mut reader, field.repeat, field.optional, |r, index| {
                    out.push(decode_field(r, field, index)?);
                    Ok(())
                })?;
            }
            FieldNode::Group(group) => {
                let grouped = group.repeat.is_repeated();
                for_each_occurrence(&mut reader, group.repeat, group.optional, |r, outer| {
                    for field in &group.fields {
                        for_each_occurrence(r, field.repeat, field.optional, |r, inner| {
                            let index = if grouped { outer } else { inner };
                            out.push(decode_field(r, field, index)?);
                            Ok(())
                        })?;
                    }
                    Ok(())
                })?;
            }
        }
    }
    Ok(out)
}

fn for_each_occurrence<F>(reader: &mut BinaryReader<'_>, repeat: Repeat, optional: bool, mut f: F) -> Result<()>
where
    F: FnMut(&mut BinaryReader<'_>, usize) -> Result<()>,
{
    match repeat {
        Repeat::Once => {
            if !(optional && reader.is_empty()) {
                f(reader, 0)?;
            }
        }
        Repeat::Fixed(count) => {
            for index in 0..count {
                if optional && reader.is_empty() {
                    break;
                }
                f(reader, index)?;
            }
        }
        Repeat::UntilExhausted => {
            let mut index = 0;
            while !reader.is_empty() {
                let before = reader.position();
                f(reader, index)?;
                if reader.position() == before {
                    break;
                }
                index += 1;
            }
        }
    }
    Ok(())
}

fn decode_field<'s>(reader: &mut BinaryReader<'_>, field: &'s FieldSchema, index: usize) -> Result<DecodedField<'s>> {
    let offset = reader.position();
    let truncated = |_| Error::Truncated {
        field: field.name.clone(),
        offset,
    };

    let ty = field.field_type;
    let value = match ty {
        FieldType::SByte => int(reader.read_i8().map_err(truncated)?, ty),
        FieldType::Byte => int(reader.read_u8().map_err(truncated)?, ty),
        FieldType::Short => int(reader.read_i16().map_err(truncated)?, ty),
        FieldType::UShort => int(reader.read_u16().map_err(truncated)?, ty),
        FieldType::Int => int(reader.read_i32().map_err(truncated)?, ty),
        FieldType::UInt => int(reader.read_u32().map_err(truncated)?, ty),
        FieldType::Float => FieldValue::Float(reader.read_f32().map_err(truncated)?),
        FieldType::FormId => FieldValue::FormId(reader.read_u32().map_err(truncated)?),
        FieldType::Str4 => FieldValue::Text(text(reader.read_bytes(4).map_err(truncated)?)),
        FieldType::String => FieldValue::Text(text(read_terminated(reader))),
        FieldType::BString => {
            let len = reader.read_u16().map_err(truncated)? as usize;
            FieldValue::Text(text(reader.read_bytes(len).map_err(truncated)?))
        }
        FieldType::IString => {
            let len = reader.read_u32().map_err(truncated)? as usize;
            FieldValue::Text(text(reader.read_bytes(len).map_err(truncated)?))
        }
        FieldType::LString => {
            // A string ID is 4 bytes wherever the field sits; inline text runs
            // to its terminator.
            let rest = reader.remaining_bytes();
            let text_end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
            if rest.len() >= 4 && !convert::is_likely_string(&rest[..text_end]) {
                FieldValue::LString(LStringValue::Id(reader.read_u32().map_err(truncated)?))
            } else {
                FieldValue::LString(LStringValue::Inline(text(read_terminated(reader))))
            }
        }
        FieldType::Blob => {
            let len = field.blob_len.unwrap_or(reader.remaining());
            FieldValue::Blob(reader.read_bytes(len).map_err(truncated)?.to_vec())
        }
    };

    let end = reader.position();
    reader.seek(offset);
    let raw = reader.read_bytes(end - offset)?.to_vec();

    Ok(DecodedField {
        schema: field,
        offset,
        index,
        value,
        raw,
        modified: false,
    })
}

#[inline]
fn int<T: Into<i64>>(value: T, ty: FieldType) -> FieldValue {
    FieldValue::Int {
        value: value.into(),
        ty,
    }
}

/// Read up to and including a NUL, or to the end when there is none.
fn read_terminated<'a>(reader: &mut BinaryReader<'a>) -> &'a [u8] {
    let rest = reader.remaining_bytes();
    let len = rest.iter().position(|&b| b == 0).map_or(rest.len(), |p| p + 1);
    reader.seek(reader.position() + len);
    &rest[..len]
}

fn text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Encode a value as a field of type `ty`.
pub fn encode_field(ty: FieldType, value: &FieldValue) -> Result<Vec<u8>> {
    let bytes = match (ty, value) {
        (FieldType::SByte | FieldType::Byte, FieldValue::Int { value, .. }) => vec![*value as u8],
        (FieldType::Short | FieldType::UShort, FieldValue::Int { value, .. }) => {
            (*value as u16).to_le_bytes().to_vec()
        }
        (FieldType::Int | FieldType::UInt, FieldValue::Int { value, .. }) => {
            (*value as u32).to_le_bytes().to_vec()
        }
        (FieldType::Float, FieldValue::Float(value)) => value.to_le_bytes().to_vec(),
        (FieldType::FormId, FieldValue::FormId(id)) => id.to_le_bytes().to_vec(),
        (FieldType::Str4, FieldValue::Text(text)) => {
            let mut bytes = text.as_bytes().to_vec();
            bytes.resize(4, 0);
            bytes
        }
        (FieldType::String, FieldValue::Text(text))
        | (FieldType::LString, FieldValue::LString(LStringValue::Inline(text))) => {
            let mut bytes = Vec::with_capacity(text.len() + 1);
            bytes.extend_from_slice(text.as_bytes());
            bytes.push(0);
            bytes
        }
        (FieldType::BString, FieldValue::Text(text)) => {
            let len = u16::try_from(text.len()).map_err(|_| Error::ValueMismatch(ty))?;
            let mut bytes = len.to_le_bytes().to_vec();
            bytes.extend_from_slice(text.as_bytes());
            bytes
        }
        (FieldType::IString, FieldValue::Text(text)) => {
            let len = u32::try_from(text.len()).map_err(|_| Error::ValueMismatch(ty))?;
            let mut bytes = len.to_le_bytes().to_vec();
            bytes.extend_from_slice(text.as_bytes());
            bytes
        }
        (FieldType::LString, FieldValue::LString(LStringValue::Id(id))) => id.to_le_bytes().to_vec(),
        (FieldType::Blob, FieldValue::Blob(bytes)) => bytes.clone(),
        _ => return Err(Error::ValueMismatch(ty)),
    };
    Ok(bytes)
}

/// Concatenate the current encoding of every field.
pub fn encode_fields(fields: &[DecodedField<'_>]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(fields.iter().map(DecodedField::len).sum());
    for field in fields {
        out.extend(field.encode()?);
    }
    Ok(out)
}

/// Bytes of a new subrecord with every required field zeroed.
///
/// Fixed repeats are filled to their count; open-ended repeats and optional
/// fields are left out.
pub fn default_bytes(schema: &SubrecordSchema) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut push = |field: &FieldSchema, count: usize| -> Result<()> {
        let bytes = encode_field(field.field_type, &FieldValue::zero(field))?;
        for _ in 0..count {
            out.extend_from_slice(&bytes);
        }
        Ok(())
    };

    for node in &schema.nodes {
        if node.is_optional() {
            continue;
        }
        let node_count = occurrences(node.repeat());
        for field in node.fields() {
            if field.optional {
                continue;
            }
            let count = match node {
                FieldNode::Field(_) => node_count,
                FieldNode::Group(_) => node_count * occurrences(field.repeat),
            };
            push(field, count)?;
        }
    }
    Ok(out)
}

fn occurrences(repeat: Repeat) -> usize {
    match repeat {
        Repeat::Once => 1,
        Repeat::Fixed(count) => count,
        Repeat::UntilExhausted => 0,
    }
}
