//! The declarations a backend renders, collected once per schema.
//!
//! Every top-level named type becomes a [`Unit`] (one output file). A unit
//! holds the type's own declaration followed by the anonymous unions found
//! inside it, each with the path the runtime uses to find it again.

use polyschema_core::{
    ChoiceType, EnumType, NamedType, QualifiedName, RecordType, ResolvedSchema, TypeNode, pascal_case,
};
use std::collections::{HashMap, HashSet};

/// Names the generated code relies on from the target's prelude.
const RESERVED: &[&str] = &[
    "Array", "Box", "Date", "Err", "Error", "Map", "None", "Number", "Object", "Ok", "Option", "Record",
    "Result", "Self", "Set", "Some", "String", "Vec",
];

#[derive(Debug)]
pub struct Module<'s> {
    pub schema: &'s ResolvedSchema,
    pub units: Vec<Unit<'s>>,
    idents: HashMap<QualifiedName, String>,
    unions: HashMap<*const ChoiceType, String>,
}

/// One top-level named type and the declarations its file holds.
#[derive(Debug)]
pub struct Unit<'s> {
    pub def: &'s NamedType,
    pub ident: String,
    pub decls: Vec<Decl<'s>>,
}

#[derive(Debug)]
pub enum Decl<'s> {
    Record {
        ident: String,
        def: &'s NamedType,
        record: &'s RecordType,
    },
    Enum {
        ident: String,
        def: &'s NamedType,
        symbols: &'s EnumType,
    },
    /// A choice that is not just `null | X`.
    Union(Union<'s>),
    /// A named primitive, collection or nullable type.
    Alias {
        ident: String,
        def: &'s NamedType,
    },
}

#[derive(Debug)]
pub struct Union<'s> {
    pub ident: String,
    /// Full name of the named type the path starts from.
    pub owner: String,
    /// Field names, variant names, `[]` and `{}`, as the runtime's
    /// `dispatch` walks them.
    pub path: Vec<String>,
    pub choice: &'s ChoiceType,
    /// Set when the union is a top-level named type.
    pub def: Option<&'s NamedType>,
}

impl Decl<'_> {
    pub fn ident(&self) -> &str {
        match self {
            Decl::Record { ident, .. } | Decl::Enum { ident, .. } | Decl::Alias { ident, .. } => ident,
            Decl::Union(union) => &union.ident,
        }
    }
}

impl<'s> Module<'s> {
    pub fn new(schema: &'s ResolvedSchema) -> Self {
        let mut module = Module {
            schema,
            units: Vec::new(),
            idents: HashMap::new(),
            unions: HashMap::new(),
        };
        let defs = schema.closure();
        let mut used: HashSet<String> = RESERVED.iter().map(|s| s.to_string()).collect();
        for def in &defs {
            let mut ident = pascal_case(&def.name.name);
            if ident.is_empty() || used.contains(&ident) {
                ident = pascal_case(&format!("{} {}", def.name.namespace.as_str(), def.name.name));
            }
            let ident = unique(ident, &mut used);
            module.idents.insert(def.name.clone(), ident);
        }
        for def in defs {
            let ident = module.idents[&def.name].clone();
            let mut decls = Vec::new();
            match &def.node {
                TypeNode::Record(record) => decls.push(Decl::Record {
                    ident: ident.clone(),
                    def,
                    record,
                }),
                TypeNode::Enum(symbols) => decls.push(Decl::Enum {
                    ident: ident.clone(),
                    def,
                    symbols,
                }),
                TypeNode::Choice(choice) if choice.nullable_inner().is_none() => {
                    module.unions.insert(choice as *const _, ident.clone());
                    decls.push(Decl::Union(Union {
                        ident: ident.clone(),
                        owner: def.name.full(),
                        path: Vec::new(),
                        choice,
                        def: Some(def),
                    }));
                }
                _ => decls.push(Decl::Alias {
                    ident: ident.clone(),
                    def,
                }),
            }
            let mut walker = Walker {
                owner: def.name.full(),
                unions: &mut module.unions,
                used: &mut used,
                found: Vec::new(),
            };
            walker.children(&def.node, &ident, &mut Vec::new());
            decls.extend(walker.found.into_iter().map(Decl::Union));
            module.units.push(Unit { def, ident, decls });
        }
        module
    }

    /// Identifier of a named type.
    pub fn ident<'a>(&'a self, name: &'a QualifiedName) -> &'a str {
        self.idents.get(name).map_or(name.name.as_str(), String::as_str)
    }

    /// Identifier of a union declaration, `None` for `null | X` choices.
    pub fn union_ident(&self, choice: &ChoiceType) -> Option<&str> {
        self.unions.get(&(choice as *const _)).map(String::as_str)
    }

    pub fn get(&self, name: &QualifiedName) -> Option<&'s NamedType> {
        self.schema.get(name)
    }

    /// Whether values of this node need indirection to have a finite size.
    pub fn is_recursive(&self, name: &QualifiedName) -> bool {
        self.schema.schema().is_recursive(name)
    }
}

struct Walker<'m, 's> {
    owner: String,
    unions: &'m mut HashMap<*const ChoiceType, String>,
    used: &'m mut HashSet<String>,
    found: Vec<Union<'s>>,
}

impl<'s> Walker<'_, 's> {
    fn children(&mut self, node: &'s TypeNode, prefix: &str, path: &mut Vec<String>) {
        match node {
            TypeNode::Record(r) => {
                for field in &r.fields {
                    path.push(field.name.clone());
                    self.visit(&field.ty, &format!("{prefix}{}", pascal_case(&field.name)), path);
                    path.pop();
                }
            }
            TypeNode::Array(c) | TypeNode::Set(c) => {
                path.push("[]".to_string());
                self.visit(&c.items, &format!("{prefix}Item"), path);
                path.pop();
            }
            TypeNode::Map(m) => {
                path.push("{}".to_string());
                self.visit(&m.values, &format!("{prefix}Value"), path);
                path.pop();
            }
            TypeNode::Choice(c) => {
                for variant in &c.variants {
                    path.push(variant.name.clone());
                    self.visit(&variant.node, &format!("{prefix}{}", pascal_case(&variant.name)), path);
                    path.pop();
                }
            }
            TypeNode::Primitive(_) | TypeNode::Enum(_) | TypeNode::Reference { .. } => {}
        }
    }

    fn visit(&mut self, node: &'s TypeNode, ident: &str, path: &mut Vec<String>) {
        if let TypeNode::Choice(choice) = node {
            if choice.nullable_inner().is_none() {
                let ident = unique(ident.to_string(), self.used);
                self.unions.insert(choice as *const _, ident.clone());
                self.found.push(Union {
                    ident: ident.clone(),
                    owner: self.owner.clone(),
                    path: path.clone(),
                    choice,
                    def: None,
                });
                self.children(node, &ident, path);
                return;
            }
        }
        self.children(node, ident, path);
    }
}

/// `base`, or `base` with the first free numeric suffix.
pub(crate) fn unique(base: String, used: &mut HashSet<String>) -> String {
    let mut candidate = base.clone();
    let mut n = 2;
    while used.contains(&candidate) {
        candidate = format!("{base}{n}");
        n += 1;
    }
    used.insert(candidate.clone());
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyschema_core::{ConversionContext, Dialect, Field, Namespace, Scalar, Schema};

    #[test]
    fn anonymous_unions_get_owner_paths() {
        let ns = Namespace::new("shop");
        let mut schema = Schema::new();
        schema.add(NamedType::record(ns.qualify("Card"), vec![Field::required("last4", TypeNode::string())]));
        schema.add(NamedType::record(ns.qualify("Cash"), vec![Field::required("amount", TypeNode::primitive(Scalar::Int64))]));
        schema.add(NamedType::record(
            ns.qualify("Order"),
            vec![
                Field::optional("note", TypeNode::choice(vec![TypeNode::null(), TypeNode::string()])),
                Field::required(
                    "payments",
                    TypeNode::array(TypeNode::choice(vec![
                        TypeNode::reference(ns.qualify("Card")),
                        TypeNode::reference(ns.qualify("Cash")),
                    ])),
                ),
            ],
        ));
        schema.root = Some(ns.qualify("Order"));
        let resolved = polyschema_resolve::resolve(schema, &mut ConversionContext::new(Dialect::Ir)).unwrap();

        let module = Module::new(&resolved);
        let idents: Vec<&str> = module.units.iter().map(|u| u.ident.as_str()).collect();
        assert_eq!(idents, ["Order", "Card", "Cash"]);
        let order = &module.units[0];
        let unions: Vec<(&str, Vec<String>)> = order
            .decls
            .iter()
            .filter_map(|d| match d {
                Decl::Union(u) => Some((u.ident.as_str(), u.path.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(unions, [("OrderPaymentsItem", vec!["payments".to_string(), "[]".to_string()])]);
    }

    #[test]
    fn unknown_names_fall_back_to_their_local_part() {
        let ns = Namespace::new("shop");
        let mut schema = Schema::new();
        schema.add(NamedType::record(ns.qualify("Option"), vec![Field::required("id", TypeNode::string())]));
        schema.root = Some(ns.qualify("Option"));
        let resolved = polyschema_resolve::resolve(schema, &mut ConversionContext::new(Dialect::Ir)).unwrap();
        let module = Module::new(&resolved);
        assert_ne!(module.ident(&ns.qualify("Option")), "Option");
        let missing = ns.qualify("Missing");
        assert_eq!(module.ident(&missing), "Missing");
    }
}
