//! Hoisting of anonymous records and enums into the named-type table.

use crate::{Segment, labeled_children_mut};
use polyschema_core::{
    ConversionContext, NamedType, QualifiedName, Schema, TypeNode, pascal_case,
};
use std::collections::{HashMap, VecDeque};

/// Give every inline record and enum a name and replace it by a reference.
///
/// Candidate names are tried in order: the node's hint, the path below the
/// owning type (`Address`, `LinesItem`), the owner plus that path
/// (`OrderAddress`), then the last candidate with a numeric suffix.
pub fn hoist_anonymous(schema: &mut Schema, ctx: &mut ConversionContext) {
    for def in schema.types.values_mut() {
        ctx.names.reserve(&def.name);
        clear_hint(&mut def.node);
    }
    let mut seen: HashMap<TypeNode, QualifiedName> = HashMap::new();
    let mut queue: VecDeque<QualifiedName> = schema.types.keys().cloned().collect();
    let mut hoisted = 0usize;

    while let Some(owner) = queue.pop_front() {
        let Some(def) = schema.get_mut(&owner) else {
            continue;
        };
        let mut node = std::mem::replace(&mut def.node, TypeNode::null());
        let mut found = Vec::new();
        let mut segments = Vec::new();
        for (segment, child) in labeled_children_mut(&mut node) {
            segments.push(segment);
            hoist_child(child, &owner, &mut segments, ctx, &mut seen, &mut found);
            segments.pop();
        }
        if let Some(def) = schema.get_mut(&owner) {
            def.node = node;
        }
        for def in found {
            queue.push_back(def.name.clone());
            schema.add(def);
            hoisted += 1;
        }
    }
    if hoisted > 0 {
        tracing::debug!(hoisted, "hoisted anonymous types");
    }
}

/// Hints only steer naming and never survive hoisting.
fn clear_hint(node: &mut TypeNode) {
    match node {
        TypeNode::Record(r) => r.hint = None,
        TypeNode::Enum(e) => e.hint = None,
        _ => {}
    }
}

fn hoist_child(
    node: &mut TypeNode,
    owner: &QualifiedName,
    segments: &mut Vec<Segment>,
    ctx: &mut ConversionContext,
    seen: &mut HashMap<TypeNode, QualifiedName>,
    found: &mut Vec<NamedType>,
) {
    if matches!(node, TypeNode::Record(_) | TypeNode::Enum(_)) {
        if ctx.dedupe_anonymous {
            if let Some(existing) = seen.get(node) {
                *node = TypeNode::reference(existing.clone());
                return;
            }
        }
        let name = ctx.names.allocate(&owner.namespace, &candidates(node, owner, segments));
        if ctx.dedupe_anonymous {
            seen.insert(node.clone(), name.clone());
        }
        let mut body = std::mem::replace(node, TypeNode::reference(name.clone()));
        clear_hint(&mut body);
        found.push(NamedType::new(name, body));
        return;
    }
    for (segment, child) in labeled_children_mut(node) {
        segments.push(segment);
        hoist_child(child, owner, segments, ctx, seen, found);
        segments.pop();
    }
}

fn candidates(node: &TypeNode, owner: &QualifiedName, segments: &[Segment]) -> Vec<String> {
    let hint = match node {
        TypeNode::Record(r) => r.hint.as_deref(),
        TypeNode::Enum(e) => e.hint.as_deref(),
        _ => None,
    };
    let joined: String = segments.iter().map(Segment::name_part).collect();
    let mut out = Vec::new();
    if let Some(hint) = hint {
        out.push(pascal_case(hint));
    }
    out.push(joined.clone());
    out.push(format!("{}{}", pascal_case(&owner.name), joined));
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyschema_core::{Dialect, EnumType, Field, RecordType};

    fn address() -> TypeNode {
        TypeNode::Record(RecordType {
            fields: vec![Field::required("street", TypeNode::string())],
            ..RecordType::default()
        })
    }

    fn order_schema() -> Schema {
        let mut schema = Schema::new();
        schema.add(NamedType::record(
            QualifiedName::parse("shop.Order"),
            vec![
                Field::required("address", address()),
                Field::optional("billing_address", address()),
                Field::required(
                    "status",
                    TypeNode::Enum(EnumType {
                        symbols: vec!["open".into(), "closed".into()],
                        hint: None,
                    }),
                ),
                Field::required(
                    "lines",
                    TypeNode::array(TypeNode::Record(RecordType {
                        fields: vec![Field::required("sku", TypeNode::string())],
                        ..RecordType::default()
                    })),
                ),
            ],
        ));
        schema.add(NamedType::record(
            QualifiedName::parse("shop.Invoice"),
            vec![Field::required(
                "address",
                TypeNode::Record(RecordType {
                    fields: vec![Field::required("zip", TypeNode::string())],
                    ..RecordType::default()
                }),
            )],
        ));
        schema
    }

    #[test]
    fn names_follow_paths_and_dedupe() {
        let mut schema = order_schema();
        let mut ctx = ConversionContext::new(Dialect::JsonSchema);
        hoist_anonymous(&mut schema, &mut ctx);
        let names: Vec<String> = schema.types.keys().map(|k| k.full()).collect();
        assert_eq!(
            names,
            vec![
                "shop.Order",
                "shop.Invoice",
                "shop.Address",
                "shop.Status",
                "shop.LinesItem",
                "shop.InvoiceAddress",
            ]
        );
        let order = schema.lookup("shop.Order").unwrap();
        let refs: Vec<String> = order.node.references().iter().map(|n| n.full()).collect();
        assert_eq!(refs, vec!["shop.Address", "shop.Address", "shop.Status", "shop.LinesItem"]);
    }

    #[test]
    fn without_dedupe_each_site_gets_a_name() {
        let mut schema = order_schema();
        let mut ctx = ConversionContext::new(Dialect::JsonSchema);
        ctx.dedupe_anonymous = false;
        hoist_anonymous(&mut schema, &mut ctx);
        assert!(schema.lookup("shop.BillingAddress").is_some());
    }

    #[test]
    fn naming_is_deterministic() {
        let run = || {
            let mut schema = order_schema();
            let mut ctx = ConversionContext::new(Dialect::JsonSchema);
            hoist_anonymous(&mut schema, &mut ctx);
            schema.types.keys().map(|k| k.full()).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
