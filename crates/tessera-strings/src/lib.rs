//! Localized string tables for Tessera.
//!
//! Plugins flagged as localized store their display text outside the plugin,
//! in three sibling files under `Strings/`:
//!
//! | Extension   | Entry framing                         |
//! |-------------|---------------------------------------|
//! | `STRINGS`   | null-terminated                       |
//! | `DLSTRINGS` | u32 length (including the NUL), text  |
//! | `ILSTRINGS` | u32 length (including the NUL), text  |
//!
//! All three share one layout: a u32 entry count, a u32 data block size,
//! `count` pairs of (u32 id, u32 offset into the data block), then the data
//! block itself.
//!
//! # Example
//!
//! ```no_run
//! use tessera_strings::{LocalizedStrings, StringsKind};
//!
//! let mut strings = LocalizedStrings::load_for_plugin("Data/Skyrim.esm", "English")?;
//! println!("{:?}", strings.lookup(0x0000_1234));
//!
//! strings.table_mut(StringsKind::Strings).insert(0x0000_1234, "Iron Sword");
//! strings.save_for_plugin("Data/Skyrim.esm", "English")?;
//! # Ok::<(), tessera_strings::Error>(())
//! ```

mod bundle;
mod error;
mod kind;
mod table;

pub use bundle::{strings_path, LocalizedStrings};
pub use error::{Error, Result};
pub use kind::StringsKind;
pub use table::StringTable;
