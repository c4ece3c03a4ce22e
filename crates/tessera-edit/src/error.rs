//! Error types for field editing.

use tessera_common::Tag;
use tessera_schema::FieldType;
use thiserror::Error;

use crate::AssignOp;

/// Errors that can occur while decoding, formatting or editing fields.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error.
    #[error("{0}")]
    Common(#[from] tessera_common::Error),

    /// Plugin tree error.
    #[error("{0}")]
    Plugin(#[from] tessera_plugin::Error),

    /// The subrecord ends before a field does.
    #[error("field {field} at offset {offset} runs past the end of the subrecord")]
    Truncated { field: String, offset: usize },

    /// No layout is known for the subrecord.
    #[error("no schema for subrecord {subrecord} in {record} record")]
    NoSchema { record: Tag, subrecord: Tag },

    /// The subrecord layout has no field with this name.
    #[error("no field named {0:?}")]
    FieldNotFound(String),

    /// The field is displayed but never written.
    #[error("field {0} is read-only")]
    ReadOnlyField(String),

    /// The operation does not apply to the field's type.
    #[error("{op} is not supported on {field_type} fields")]
    UnsupportedOperation { op: AssignOp, field_type: FieldType },

    #[error("field {0}: division by zero")]
    DivideByZero(String),

    /// The text could not be converted to the field's type.
    #[error("field {field}: invalid value {value:?}")]
    InvalidValue { field: String, value: String },

    /// A value does not match the type it is encoded as.
    #[error("value does not fit a {0} field")]
    ValueMismatch(FieldType),
}

/// Result type for edit operations.
pub type Result<T> = std::result::Result<T, Error>;
