//! Common utilities for Tessera.
//!
//! This crate provides the foundational pieces shared by every Tessera crate:
//!
//! - [`BinaryReader`] - Zero-copy little-endian reading from byte slices
//! - [`BinaryWriter`] - Little-endian writing with size back-patching
//! - [`Tag`] - The four-character type code that names records and subrecords
//! - [`convert`] - Stateless conversions between byte spans and primitives

mod error;
mod reader;
mod tag;
mod writer;

pub mod convert;

pub use error::{Error, Result};
pub use reader::BinaryReader;
pub use tag::Tag;
pub use writer::BinaryWriter;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
