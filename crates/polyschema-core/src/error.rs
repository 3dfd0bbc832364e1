//! Conversion errors.

use std::fmt;

/// A JSON-pointer-like location inside a schema document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaPath(Vec<String>);

impl SchemaPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn join(&self, segment: impl fmt::Display) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        SchemaPath(segments)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl From<&str> for SchemaPath {
    fn from(path: &str) -> Self {
        SchemaPath(
            path.split('/')
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )
    }
}

/// Errors raised while building, resolving or exporting a schema.
///
/// Every variant names the dialect it was raised for, the path of the
/// offending construct and the rule that was violated.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{dialect}: invalid schema at {path}: {rule}")]
    Schema {
        dialect: String,
        path: SchemaPath,
        rule: String,
    },

    #[error("{dialect}: unresolved reference `{reference}` at {path}")]
    UnresolvedReference {
        dialect: String,
        path: SchemaPath,
        reference: String,
    },

    #[error("{dialect}: ambiguous union at {path}: variant `{shadowed}` is shadowed by `{shadowing}`")]
    AmbiguousUnion {
        dialect: String,
        path: SchemaPath,
        shadowing: String,
        shadowed: String,
    },

    #[error("{dialect}: unsupported construct at {path}: {construct}")]
    UnsupportedConstruct {
        dialect: String,
        path: SchemaPath,
        construct: String,
    },
}

impl Error {
    pub fn schema(dialect: impl fmt::Display, path: &SchemaPath, rule: impl Into<String>) -> Self {
        Error::Schema {
            dialect: dialect.to_string(),
            path: path.clone(),
            rule: rule.into(),
        }
    }

    pub fn unresolved(
        dialect: impl fmt::Display,
        path: &SchemaPath,
        reference: impl Into<String>,
    ) -> Self {
        Error::UnresolvedReference {
            dialect: dialect.to_string(),
            path: path.clone(),
            reference: reference.into(),
        }
    }

    pub fn unsupported(
        dialect: impl fmt::Display,
        path: &SchemaPath,
        construct: impl Into<String>,
    ) -> Self {
        Error::UnsupportedConstruct {
            dialect: dialect.to_string(),
            path: path.clone(),
            construct: construct.into(),
        }
    }

    pub fn path(&self) -> &SchemaPath {
        match self {
            Error::Schema { path, .. }
            | Error::UnresolvedReference { path, .. }
            | Error::AmbiguousUnion { path, .. }
            | Error::UnsupportedConstruct { path, .. } => path,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_dialect_path_and_rule() {
        let path = SchemaPath::root().join("types").join("demo.Order").join("total");
        let err = Error::schema("ir", &path, "minimum exceeds maximum");
        assert_eq!(
            err.to_string(),
            "ir: invalid schema at /types/demo.Order/total: minimum exceeds maximum"
        );
        assert_eq!(SchemaPath::from("/a/b"), SchemaPath::root().join("a").join("b"));
    }
}
