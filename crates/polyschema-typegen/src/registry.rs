//! The built-in backends, fixed at compile time by feature flags.

use crate::traits::Backend;

static BACKENDS: &[&dyn Backend] = &[
    #[cfg(feature = "backend-rust")]
    &crate::output::rust::RustBackend,
    #[cfg(feature = "backend-typescript")]
    &crate::output::typescript::TypeScriptBackend,
];

/// Get a backend by name. `rs` and `ts` are accepted as short names.
pub fn get_backend(name: &str) -> Option<&'static dyn Backend> {
    let name = name.to_ascii_lowercase();
    let name = match name.as_str() {
        "rs" => "rust",
        "ts" => "typescript",
        other => other,
    };
    BACKENDS.iter().find(|b| b.name() == name).copied()
}

/// Get all backends for a language.
pub fn backends_for_language(language: &str) -> Vec<&'static dyn Backend> {
    BACKENDS
        .iter()
        .filter(|b| b.language() == language)
        .copied()
        .collect()
}

/// All backends, in registration order.
pub fn backends() -> &'static [&'static dyn Backend] {
    BACKENDS
}

pub fn backend_names() -> Vec<&'static str> {
    BACKENDS.iter().map(|b| b.name()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(all(feature = "backend-rust", feature = "backend-typescript"))]
    fn builtin_backends_are_listed() {
        assert_eq!(backend_names(), ["rust", "typescript"]);
        assert_eq!(get_backend("ts").map(|b| b.extension()), Some("ts"));
        assert_eq!(backends_for_language("rust").len(), 1);
        assert!(get_backend("cobol").is_none());
    }
}
