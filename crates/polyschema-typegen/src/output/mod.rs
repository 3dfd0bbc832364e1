//! Backend implementations, one module per target language.

#[cfg(feature = "backend-rust")]
pub mod rust;
#[cfg(feature = "backend-typescript")]
pub mod typescript;
