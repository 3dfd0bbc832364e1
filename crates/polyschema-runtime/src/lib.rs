//! Runtime for Rust code generated by `polyschema-typegen`.
//!
//! A generated module embeds the canonical IR document of its schema in a
//! [`SchemaHandle`] and implements [`Generated`] for every type. Encoding
//! goes through the instance's JSON form:
//!
//! ```text
//! struct ─serde─> JSON form ─codec─> bytes ─(gzip)─> payload
//! ```
//!
//! | content type                              | codec                 |
//! |-------------------------------------------|-----------------------|
//! | `application/json`                        | JSON                  |
//! | `avro/binary`, `application/avro`, `application/vnd.apache.avro+avro` | Avro binary |
//! | any of the above + `+gzip`                | gzip over the base    |

pub mod base64_bytes;
pub mod codec;
pub mod content_type;
pub mod error;
pub mod generated;
pub mod handle;
pub mod logical;
pub mod matching;
pub mod nullable;
pub mod synth;

pub use content_type::{ContentType, Encoding};
pub use error::{Result, RuntimeError};
pub use generated::Generated;
pub use handle::SchemaHandle;
pub use matching::{dispatch, is_match};
pub use synth::Synthesizer;

// Generated code names these through the runtime so it needs no direct
// dependency on them.
pub use chrono;
pub use polyschema_core::ResolvedSchema;
pub use serde;
pub use serde_json;
