//! Namespace assignment, reference qualification and alias-cycle detection.

use crate::{append_path, labeled_children_mut};
use indexmap::IndexMap;
use polyschema_core::{
    ConversionContext, Dialect, Error, NamedType, Namespace, QualifiedName, Result, Schema,
    SchemaPath, TypeNode,
};
use std::collections::{HashMap, HashSet};

/// Give every unqualified named type the document namespace.
pub fn assign_namespaces(schema: &mut Schema, ctx: &ConversionContext) -> Result<()> {
    let ns = ctx.document_namespace();
    if ns.is_empty() {
        return Ok(());
    }
    let mut renamed: IndexMap<QualifiedName, NamedType> = IndexMap::new();
    for (key, mut def) in std::mem::take(&mut schema.types) {
        let key = if key.namespace.is_empty() {
            let qualified = ns.qualify(&key.name);
            def.name = qualified.clone();
            qualified
        } else {
            key
        };
        if renamed.contains_key(&key) {
            return Err(Error::schema(
                ctx.dialect,
                &SchemaPath::root().join("types").join(&key),
                "duplicate type name after namespace assignment",
            ));
        }
        renamed.insert(key, def);
    }
    schema.types = renamed;
    if let Some(root) = &mut schema.root {
        if root.namespace.is_empty() {
            root.namespace = ns.clone();
        }
    }
    tracing::debug!(namespace = %ns, "assigned document namespace");
    Ok(())
}

/// Lookup tables for resolving reference names.
struct NameIndex {
    names: HashSet<QualifiedName>,
    by_short: HashMap<String, Vec<QualifiedName>>,
    aliases: HashMap<String, QualifiedName>,
    document: Namespace,
}

impl NameIndex {
    fn new(schema: &Schema, document: Namespace) -> Self {
        let mut by_short: HashMap<String, Vec<QualifiedName>> = HashMap::new();
        let mut aliases = HashMap::new();
        for def in schema.types.values() {
            by_short.entry(def.name.name.clone()).or_default().push(def.name.clone());
            for alias in &def.aliases {
                let alias = QualifiedName::parse(alias);
                let full = if alias.namespace.is_empty() {
                    def.name.namespace.qualify(&alias.name)
                } else {
                    alias
                };
                aliases.insert(full.full(), def.name.clone());
            }
        }
        Self {
            names: schema.types.keys().cloned().collect(),
            by_short,
            aliases,
            document,
        }
    }

    /// Exact name, then the enclosing namespace, then the document and
    /// empty namespaces, then aliases, then a unique short name.
    fn resolve(&self, name: &QualifiedName, enclosing: &Namespace) -> Option<QualifiedName> {
        if self.names.contains(name) {
            return Some(name.clone());
        }
        let mut candidates = Vec::new();
        if name.namespace.is_empty() {
            candidates.push(enclosing.qualify(&name.name));
            candidates.push(self.document.qualify(&name.name));
        } else {
            let nested = Namespace::new(format!("{}.{}", enclosing, name.namespace));
            candidates.push(nested.qualify(&name.name));
        }
        candidates.push(Namespace::empty().qualify(&name.name));
        if let Some(found) = candidates.into_iter().find(|c| self.names.contains(c)) {
            return Some(found);
        }
        let aliased = if name.namespace.is_empty() {
            enclosing.qualify(&name.name)
        } else {
            name.clone()
        };
        if let Some(target) = self.aliases.get(&aliased.full()) {
            return Some(target.clone());
        }
        match self.by_short.get(&name.name) {
            Some(matches) if matches.len() == 1 => Some(matches[0].clone()),
            _ => None,
        }
    }
}

/// Rewrite every reference to the fully qualified name it resolves to.
pub fn qualify_references(schema: &mut Schema, ctx: &ConversionContext) -> Result<()> {
    let index = NameIndex::new(schema, ctx.document_namespace());
    for (key, def) in schema.types.iter_mut() {
        let path = SchemaPath::root().join("types").join(key);
        qualify_node(&mut def.node, &key.namespace, &index, &path, ctx.dialect)?;
    }
    Ok(())
}

fn qualify_node(
    node: &mut TypeNode,
    enclosing: &Namespace,
    index: &NameIndex,
    path: &SchemaPath,
    dialect: Dialect,
) -> Result<()> {
    if let TypeNode::Reference { name } = node {
        *name = index
            .resolve(name, enclosing)
            .ok_or_else(|| Error::unresolved(dialect, path, name.full()))?;
        return Ok(());
    }
    for (segment, child) in labeled_children_mut(node) {
        qualify_node(child, enclosing, index, &append_path(path, &segment), dialect)?;
    }
    Ok(())
}

/// Reject named types that are nothing but a chain of references back to
/// themselves.
pub fn check_alias_cycles(schema: &Schema, ctx: &ConversionContext) -> Result<()> {
    for (key, def) in &schema.types {
        let mut seen = HashSet::new();
        let mut current = &def.node;
        while let TypeNode::Reference { name } = current {
            if name == key {
                return Err(Error::schema(
                    ctx.dialect,
                    &SchemaPath::root().join("types").join(key),
                    "type embeds itself by value",
                ));
            }
            if !seen.insert(name) {
                break;
            }
            match schema.get(name) {
                Some(target) => current = &target.node,
                None => break,
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyschema_core::Field;

    fn ctx() -> ConversionContext {
        ConversionContext::new(Dialect::JsonSchema).with_uri("https://example.com/schemas/order.json")
    }

    #[test]
    fn unqualified_types_join_the_document_namespace() {
        let mut schema = Schema::new();
        schema.add(NamedType::record(
            QualifiedName::parse("Order"),
            vec![Field::required("customer", TypeNode::reference(QualifiedName::parse("Customer")))],
        ));
        schema.add(NamedType::record(QualifiedName::parse("Customer"), vec![]));
        schema.root = Some(QualifiedName::parse("Order"));

        let ctx = ctx();
        assign_namespaces(&mut schema, &ctx).unwrap();
        qualify_references(&mut schema, &ctx).unwrap();

        let order = schema.lookup("com.example.schemas.order.Order").unwrap();
        let field_ty = match &order.node {
            TypeNode::Record(r) => &r.fields[0].ty,
            _ => unreachable!(),
        };
        assert_eq!(
            field_ty.as_reference().map(|n| n.full()),
            Some("com.example.schemas.order.Customer".to_string())
        );
        assert_eq!(schema.root.unwrap().full(), "com.example.schemas.order.Order");
    }

    #[test]
    fn unknown_reference_reports_path() {
        let mut schema = Schema::new();
        schema.add(NamedType::record(
            QualifiedName::parse("a.Order"),
            vec![Field::required("lines", TypeNode::array(TypeNode::reference(QualifiedName::parse("Line"))))],
        ));
        let err = qualify_references(&mut schema, &ctx()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "json-schema: unresolved reference `Line` at /types/a.Order/fields/lines/items"
        );
    }

    #[test]
    fn aliases_and_unique_short_names_resolve() {
        let mut schema = Schema::new();
        let mut money = NamedType::record(QualifiedName::parse("fin.Money"), vec![]);
        money.aliases.push("Amount".into());
        schema.add(money);
        schema.add(NamedType::record(
            QualifiedName::parse("shop.Order"),
            vec![
                Field::required("total", TypeNode::reference(QualifiedName::parse("fin.Amount"))),
                Field::required("tax", TypeNode::reference(QualifiedName::parse("Money"))),
            ],
        ));
        qualify_references(&mut schema, &ConversionContext::new(Dialect::Avro)).unwrap();
        let refs: Vec<String> = schema
            .lookup("shop.Order")
            .unwrap()
            .node
            .references()
            .iter()
            .map(|n| n.full())
            .collect();
        assert_eq!(refs, vec!["fin.Money", "fin.Money"]);
    }

    #[test]
    fn alias_cycle_is_rejected() {
        let mut schema = Schema::new();
        schema.add(NamedType::new(QualifiedName::parse("a.A"), TypeNode::reference(QualifiedName::parse("a.B"))));
        schema.add(NamedType::new(QualifiedName::parse("a.B"), TypeNode::reference(QualifiedName::parse("a.A"))));
        let err = check_alias_cycles(&schema, &ConversionContext::new(Dialect::Ir)).unwrap_err();
        assert!(err.to_string().contains("embeds itself by value"));
    }
}
