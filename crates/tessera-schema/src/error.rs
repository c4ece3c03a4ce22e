//! Error types for schema loading.

use thiserror::Error;

/// Errors that can occur while loading a schema definition.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] tessera_common::Error),

    /// The definition is not well-formed XML or does not match the layout.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::DeError),

    /// Unknown value in a `type` attribute.
    #[error("field {field}: unknown field type {value:?}")]
    InvalidFieldType { field: String, value: String },

    /// Repeat count that is neither 0, a positive count nor -1.
    #[error("field {field}: invalid repeat count {value}")]
    InvalidRepeat { field: String, value: i32 },

    /// Malformed `options` attribute.
    #[error("field {field}: invalid options: {reason}")]
    InvalidOptions { field: String, reason: String },

    /// A repeated field inside a repeated group.
    #[error("field {field}: repeats are not allowed inside a repeated group")]
    NestedRepeat { field: String },
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, Error>;
