//! Typed source generation from resolved schemas.
//!
//! A [`Backend`] renders a [`ResolvedSchema`](polyschema_core::ResolvedSchema)
//! into one file per top-level named type plus an index that re-exports
//! them and embeds the canonical IR. The generated types encode and decode
//! through a runtime: `polyschema-runtime` for Rust, an npm package for
//! TypeScript.
//!
//! Backends are selected by feature flags and looked up by name:
//!
//! ```ignore
//! let backend = polyschema_typegen::get_backend("rust").unwrap();
//! let files = backend.generate(&schema, &GenerateOptions::default())?;
//! ```

mod error;
mod model;
pub mod output;
mod registry;
mod template;
mod traits;

pub use error::{GenerateError, Result};
pub use registry::{backend_names, backends, backends_for_language, get_backend};
pub use template::Template;
pub use traits::{Backend, GenerateOptions, GeneratedFile};

#[cfg(feature = "backend-rust")]
pub use output::rust::RustBackend;
#[cfg(feature = "backend-typescript")]
pub use output::typescript::TypeScriptBackend;
