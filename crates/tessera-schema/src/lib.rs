//! Record layout schema for Tessera.
//!
//! A [`Schema`] describes, for every known record type, which subrecords it
//! may contain and how each subrecord's bytes break down into typed fields.
//! It is loaded once (usually from an XML definition file) and is immutable
//! afterwards, so it can be shared freely between threads.
//!
//! Unknown record or subrecord types are not errors: lookups return `None`
//! and callers fall back to a raw hex view.
//!
//! # Example
//!
//! ```
//! use tessera_schema::{FieldType, Schema};
//!
//! let schema = Schema::from_xml_str(r#"
//!     <Records>
//!       <Record name="WEAP" desc="Weapon">
//!         <Subrecord name="EDID"><Element name="ID" type="string"/></Subrecord>
//!         <Subrecord name="DATA">
//!           <Element name="Value" type="uint"/>
//!           <Element name="Weight" type="float"/>
//!         </Subrecord>
//!       </Record>
//!     </Records>
//! "#)?;
//!
//! let weap = schema.lookup_record_schema("WEAP".parse()?).unwrap();
//! let data = weap.lookup_subrecord_schema("DATA".parse()?).unwrap();
//! assert_eq!(data.fields().nth(1).unwrap().field_type, FieldType::Float);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod field;
mod record;
mod schema;
mod types;
mod xml;

pub use error::{Error, Result};
pub use field::{FieldGroup, FieldNode, FieldSchema};
pub use record::{RecordSchema, SubrecordSchema};
pub use schema::{Schema, SubrecordSchemaId};
pub use types::{FieldType, Repeat};
