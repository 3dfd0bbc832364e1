//! Namespaces, qualified names and identifier casing.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A dotted, hierarchical namespace such as `com.example.orders`.
///
/// The empty namespace is valid and means "unqualified".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let cleaned: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        Namespace(cleaned.join("."))
    }

    pub fn empty() -> Self {
        Namespace(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.').filter(|s| !s.is_empty())
    }

    /// Synthesize a namespace from a document URI.
    ///
    /// Host labels are reversed (`www` dropped), then path segments follow
    /// with the file extension removed:
    /// `https://example.com/schemas/order.json` → `com.example.schemas.order`.
    /// URNs contribute their colon-separated segments after the scheme.
    pub fn from_uri(uri: &str) -> Self {
        let uri = uri.split(['#', '?']).next().unwrap_or("");
        let mut segments: Vec<String> = Vec::new();

        if let Some(rest) = uri.strip_prefix("urn:") {
            segments.extend(rest.split(':').map(sanitize_segment));
        } else if let Some((_, rest)) = uri.split_once("://") {
            let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
            let host = authority.rsplit('@').next().unwrap_or(authority);
            let host = host.split(':').next().unwrap_or(host);
            segments.extend(
                host.split('.')
                    .filter(|label| !label.is_empty() && *label != "www")
                    .rev()
                    .map(sanitize_segment),
            );
            segments.extend(path_segments(path));
        } else {
            segments.extend(path_segments(uri));
        }

        Namespace::new(
            segments
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("."),
        )
    }

    /// Synthesize a namespace from a bare document name or file path.
    pub fn from_document_name(name: &str) -> Self {
        let stem = name.rsplit(['/', '\\']).next().unwrap_or(name);
        Namespace::new(sanitize_segment(strip_extension(stem)))
    }

    pub fn qualify(&self, name: &str) -> QualifiedName {
        QualifiedName {
            namespace: self.clone(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn path_segments(path: &str) -> Vec<String> {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let last = parts.len().saturating_sub(1);
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            if i == last {
                sanitize_segment(strip_extension(part))
            } else {
                sanitize_segment(part)
            }
        })
        .collect()
}

fn strip_extension(name: &str) -> &str {
    let name = name.strip_suffix(".json").unwrap_or(name);
    let name = name.strip_suffix(".schema").unwrap_or(name);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.len() <= 5 => stem,
        _ => name,
    }
}

fn sanitize_segment(segment: &str) -> String {
    let mapped: String = segment
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let mut out = mapped.trim_matches('_').to_string();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// A namespace-qualified type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct QualifiedName {
    pub namespace: Namespace,
    pub name: String,
}

impl QualifiedName {
    pub fn new(namespace: Namespace, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }

    /// Split a dotted name at its last dot.
    pub fn parse(full: &str) -> Self {
        match full.rsplit_once('.') {
            Some((ns, name)) => Self::new(Namespace::new(ns), name),
            None => Self::new(Namespace::empty(), full),
        }
    }

    pub fn full(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}.{}", self.namespace, self.name)
        }
    }
}

impl From<String> for QualifiedName {
    fn from(full: String) -> Self {
        QualifiedName::parse(&full)
    }
}

impl From<QualifiedName> for String {
    fn from(name: QualifiedName) -> Self {
        name.full()
    }
}

/// Split an identifier into lowercase words at separators and case changes.
fn words(s: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = s.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        let boundary = c.is_uppercase()
            && !current.is_empty()
            && (chars[i - 1].is_lowercase()
                || chars[i - 1].is_ascii_digit()
                || chars.get(i + 1).is_some_and(|n| n.is_lowercase()));
        if boundary {
            words.push(std::mem::take(&mut current));
        }
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// `order_line-item` → `OrderLineItem`.
pub fn pascal_case(s: &str) -> String {
    words(s)
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// `OrderLineItem` → `order_line_item`.
pub fn snake_case(s: &str) -> String {
    words(s).join("_")
}

/// `order_line_item` → `orderLineItem`.
pub fn camel_case(s: &str) -> String {
    let pascal = pascal_case(s);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Hands out collision-free qualified names for synthesized types.
///
/// Lives inside a [`ConversionContext`](crate::context::ConversionContext),
/// so two conversions never share counters.
#[derive(Debug, Default, Clone)]
pub struct NameAllocator {
    taken: HashSet<QualifiedName>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&mut self, name: &QualifiedName) {
        self.taken.insert(name.clone());
    }

    pub fn is_taken(&self, name: &QualifiedName) -> bool {
        self.taken.contains(name)
    }

    /// Take the first free candidate; if all are taken, append 2, 3, ...
    /// to the last candidate.
    pub fn allocate(&mut self, namespace: &Namespace, candidates: &[String]) -> QualifiedName {
        for candidate in candidates.iter().filter(|c| !c.is_empty()) {
            let name = namespace.qualify(candidate);
            if !self.is_taken(&name) {
                self.reserve(&name);
                return name;
            }
        }
        let base = candidates
            .iter()
            .rev()
            .find(|c| !c.is_empty())
            .cloned()
            .unwrap_or_else(|| "Type".to_string());
        let mut n = 2u32;
        loop {
            let name = namespace.qualify(&format!("{base}{n}"));
            if !self.is_taken(&name) {
                self.reserve(&name);
                return name;
            }
            n += 1;
        }
    }
}
