//! Error types for string tables.

use thiserror::Error;

/// Errors that can occur while reading or writing string tables.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] tessera_common::Error),

    /// A directory entry points outside the data block.
    #[error("string {id:#010X}: offset {offset} is outside the {data_size}-byte data block")]
    OffsetOutOfBounds {
        id: u32,
        offset: usize,
        data_size: usize,
    },

    /// The table does not fit the 32-bit offsets of the format.
    #[error("string table too large: {0} bytes")]
    TooLarge(usize),
}

/// Result type for string table operations.
pub type Result<T> = std::result::Result<T, Error>;
