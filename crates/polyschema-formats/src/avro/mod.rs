//! Avro schema JSON (`.avsc`).
//!
//! Records and enums are Avro's only named types; other named IR types are
//! written inline with their name kept in the `polyschema` attribute.
//!
//! Under [`NamedTypePolicy::Reference`](crate::options::NamedTypePolicy)
//! the document is a type list in dependency order whose last entry carries
//! `"polyschema": {"root": true}`. A top-level array without that marker is
//! an ordinary union.

mod export;
mod import;

pub use export::AvroExporter;
pub use import::{AvroImporter, parse_avro};

/// Columns appended to the root record when envelopes are enabled.
pub const ENVELOPE_COLUMNS: [&str; 5] = ["___type", "___source", "___id", "___time", "___subject"];

fn valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Symbols rewritten to Avro names, or `None` when all are valid already.
///
/// Invalid characters become `_`, a leading digit gets a `_` prefix and
/// collisions get a numeric suffix.
pub(crate) fn sanitize_symbols(symbols: &[String]) -> Option<Vec<String>> {
    if symbols.iter().all(|s| valid_name(s)) {
        return None;
    }
    let mut out: Vec<String> = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let mut clean: String = symbol
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        if !clean.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
            clean.insert(0, '_');
        }
        let mut candidate = clean.clone();
        let mut n = 2;
        while out.contains(&candidate) || (candidate != *symbol && symbols.contains(&candidate)) {
            candidate = format!("{clean}_{n}");
            n += 1;
        }
        out.push(candidate);
    }
    Some(out)
}
