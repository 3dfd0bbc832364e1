//! Schema conversion between JSON Schema, Avro and typed source code.
//!
//! Documents are imported into a dialect-neutral IR, resolved (names,
//! references, discriminated unions) and rendered either as another
//! dialect or as generated types:
//!
//! ```ignore
//! use polyschema::{Converter, Document, PolyschemaConfig, Target};
//! use polyschema::core::Dialect;
//!
//! let converter = Converter::new(PolyschemaConfig::load(project_root)?);
//! let document = Document::read("order.schema.json".as_ref())?;
//! converter.convert_into(Dialect::JsonSchema, &document, Target::parse("avro")?, out_dir)?;
//! ```

pub mod config;
pub mod convert;
pub mod error;
pub mod logging;

pub use config::PolyschemaConfig;
pub use convert::{Converter, Document, Job, Target};
pub use error::{ConvertError, Result};

pub use polyschema_core as core;
pub use polyschema_formats as formats;
pub use polyschema_resolve as resolve;
pub use polyschema_typegen as typegen;
