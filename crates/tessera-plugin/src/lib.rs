//! Plugin file container model for Tessera.
//!
//! A plugin is a flat sequence of top-level records and groups. Groups nest
//! further groups and records; records hold subrecords, which are raw byte
//! payloads tagged with a four-character type.
//!
//! # File Format
//!
//! ```text
//! Record:    tag[4] size:u32 flags1:u32 form_id:u32 flags2:u32 [flags3:u32]  payload[size]
//! Group:     "GRUP" size:u32 label[4] kind:u32 stamp:u32 [flags:u32]         children
//! Subrecord: tag[4] len:u16 data[len]
//! Long form: "XXXX" 4:u16 len:u32, then tag[4] 0:u16 data[len]
//! ```
//!
//! All integers are little-endian. A record's size excludes its header; a
//! group's size includes it. The bracketed words are absent in the legacy
//! 20-byte layout. A record with flags1 bit `0x0004_0000` stores a u32
//! decompressed length followed by a zlib stream in place of its subrecords.
//! The first record of every plugin is `TES4`.
//!
//! # Example
//!
//! ```no_run
//! use tessera_plugin::{DecodeOptions, Plugin};
//!
//! let mut plugin = Plugin::open("Mod.esp", &DecodeOptions::new().skip("NAVM".parse()?))?;
//! println!("masters: {:?}", plugin.masters());
//!
//! for record in plugin.records(plugin.root())? {
//!     if let Some(label) = plugin.description(record) {
//!         println!("{label}");
//!     }
//! }
//!
//! if let Some(weapon) = plugin.lookup_form_id(0x0001_2EB7) {
//!     let copy = plugin.clone_node(weapon, true)?;
//!     plugin.record_mut(copy)?.form_id = 0x0100_0800;
//!     let group = plugin.parent(weapon)?.unwrap();
//!     plugin.add_child(group, copy)?;
//! }
//!
//! plugin.save("Mod.esp")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod attach;
mod compress;
mod decode;
mod encode;
mod error;
pub mod format;
mod header;
mod lookup;
mod mutate;
mod node;
mod observer;
mod tree;

use std::hash::BuildHasherDefault;

use rustc_hash::FxHasher;

pub use decode::{DecodeOptions, DecodeSession, DecodeStats};
pub use encode::EncodeOptions;
pub use error::{Error, Result};
pub use header::{GroupHeader, GroupType, HeaderLayout, RecordHeader};
pub use node::{NodeId, NodeKind, SchemaSlot, Subrecord};
pub use observer::{ChangeEvent, SubscriptionId};
pub use tree::Plugin;

/// Hash map with the fast non-cryptographic Fx hasher.
pub type FxHashMap<K, V> = hashbrown::HashMap<K, V, BuildHasherDefault<FxHasher>>;

/// Hash set with the fast non-cryptographic Fx hasher.
pub type FxHashSet<T> = hashbrown::HashSet<T, BuildHasherDefault<FxHasher>>;
