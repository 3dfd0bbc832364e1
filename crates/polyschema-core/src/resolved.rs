//! The frozen, fully resolved schema handed to exporters and generators.

use crate::context::Dialect;
use crate::error::{Error, Result, SchemaPath};
use crate::ir::{NamedType, Schema, TypeNode};
use crate::name::QualifiedName;
use std::collections::HashSet;

/// A schema in which every reference resolves, the root exists and every
/// choice carries a resolution.
///
/// Only shared references are handed out, so a `ResolvedSchema` can be read
/// from many threads at once.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSchema {
    schema: Schema,
}

impl ResolvedSchema {
    /// Freeze a schema after checking the resolution invariants.
    pub fn new(schema: Schema, dialect: Dialect) -> Result<Self> {
        if let Some(root) = &schema.root {
            if !schema.contains(root) {
                return Err(Error::unresolved(dialect, &SchemaPath::root().join("root"), root.full()));
            }
        }
        for (name, def) in &schema.types {
            check_node(&schema, &def.node, &SchemaPath::root().join("types").join(name), dialect)?;
        }
        Ok(Self { schema })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn into_schema(self) -> Schema {
        self.schema
    }

    pub fn root(&self) -> Option<&NamedType> {
        self.schema.root.as_ref().and_then(|r| self.schema.get(r))
    }

    pub fn get(&self, name: &QualifiedName) -> Option<&NamedType> {
        self.schema.get(name)
    }

    pub fn lookup(&self, full: &str) -> Option<&NamedType> {
        self.schema.lookup(full)
    }

    pub fn types(&self) -> impl Iterator<Item = &NamedType> {
        self.schema.types.values()
    }

    /// Follow references to a structural node.
    pub fn deref<'a>(&'a self, node: &'a TypeNode) -> Option<&'a TypeNode> {
        self.schema.deref(node)
    }

    /// Named types reachable from the root, depth-first in declaration
    /// order, the root first. Without a root, every type in table order.
    pub fn closure(&self) -> Vec<&NamedType> {
        let Some(root) = self.root() else {
            return self.types().collect();
        };
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.visit(root, &mut seen, &mut out);
        out
    }

    fn visit<'a>(
        &'a self,
        def: &'a NamedType,
        seen: &mut HashSet<&'a QualifiedName>,
        out: &mut Vec<&'a NamedType>,
    ) {
        if !seen.insert(&def.name) {
            return;
        }
        out.push(def);
        for name in def.node.references() {
            if let Some(target) = self.schema.get(name) {
                self.visit(target, seen, out);
            }
        }
    }

    /// Named types in dependency order: every type after the types it
    /// references, except where a cycle forces a forward reference.
    pub fn dependency_order(&self) -> Vec<&NamedType> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let roots: Vec<&NamedType> = match self.root() {
            Some(root) => vec![root],
            None => self.types().collect(),
        };
        for def in roots {
            self.post_order(def, &mut seen, &mut out);
        }
        out
    }

    fn post_order<'a>(
        &'a self,
        def: &'a NamedType,
        seen: &mut HashSet<&'a QualifiedName>,
        out: &mut Vec<&'a NamedType>,
    ) {
        if !seen.insert(&def.name) {
            return;
        }
        for name in def.node.references() {
            if let Some(target) = self.schema.get(name) {
                self.post_order(target, seen, out);
            }
        }
        out.push(def);
    }
}

fn check_node(schema: &Schema, node: &TypeNode, path: &SchemaPath, dialect: Dialect) -> Result<()> {
    match node {
        TypeNode::Reference { name } => {
            if !schema.contains(name) {
                return Err(Error::unresolved(dialect, path, name.full()));
            }
        }
        TypeNode::Choice(c) if c.resolution.is_none() => {
            return Err(Error::schema(dialect, path, "choice has no resolution"));
        }
        TypeNode::Record(r) => {
            for field in &r.fields {
                check_node(schema, &field.ty, &path.join("fields").join(&field.name), dialect)?;
            }
            return Ok(());
        }
        TypeNode::Choice(c) => {
            for variant in &c.variants {
                check_node(schema, &variant.node, &path.join("variants").join(&variant.name), dialect)?;
            }
            return Ok(());
        }
        _ => {}
    }
    for child in node.children() {
        check_node(schema, child, path, dialect)?;
    }
    Ok(())
}
