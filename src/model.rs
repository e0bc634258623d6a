//! Resolved type graph consumed by the compiler.
//!
//! The graph is an arena of `TypeNode`s addressed by `TypeId`. It is built
//! with `GraphBuilder` (which seeds one node per built-in classification)
//! and frozen with `GraphBuilder::finish`. The compiler only ever reads a
//! frozen `TypeGraph`.
//!
//! Structured kinds carry their OWN structure only; everything inherited
//! (facets, properties, array items, union branches) is resolved through the
//! super-type chain by the query methods on `TypeGraph`.
pub mod document;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::SchemaError;

// ------------------------------- Identity -------------------------------- //

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) usize);

impl TypeId {
    pub fn index(self) -> usize { self.0 }
}

/// The fixed built-in classifications. Every type reaches exactly one of
/// these through its super-type chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Builtin {
    Any,
    Nil,
    Boolean,
    Number,
    Integer,
    String,
    DateTime,
    Object,
    Array,
    Union,
}

impl Builtin {
    pub const ALL: [Builtin; 10] = [
        Builtin::Any,
        Builtin::Nil,
        Builtin::Boolean,
        Builtin::Number,
        Builtin::Integer,
        Builtin::String,
        Builtin::DateTime,
        Builtin::Object,
        Builtin::Array,
        Builtin::Union,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Any => "any",
            Builtin::Nil => "nil",
            Builtin::Boolean => "boolean",
            Builtin::Number => "number",
            Builtin::Integer => "integer",
            Builtin::String => "string",
            Builtin::DateTime => "datetime",
            Builtin::Object => "object",
            Builtin::Array => "array",
            Builtin::Union => "union",
        }
    }

    /// Resolve a built-in type name, including the RAML date aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        let found = match name {
            "date-only" | "time-only" | "datetime-only" => Builtin::DateTime,
            other => *Builtin::ALL.iter().find(|b| b.name() == other)?,
        };
        Some(found)
    }

    fn slot(self) -> TypeId {
        TypeId(self as usize)
    }
}

// -------------------------------- Nodes ---------------------------------- //

#[derive(Clone, Debug)]
pub enum Kind {
    Any,
    Nil,
    Boolean,
    Number,
    Integer,
    String,
    DateTime,
    Object { properties: Vec<PropertyNode> },
    Array { items: Option<TypeId> },
    Union { branches: Option<(TypeId, TypeId)> },
}

impl Kind {
    pub fn classification(&self) -> Builtin {
        match self {
            Kind::Any => Builtin::Any,
            Kind::Nil => Builtin::Nil,
            Kind::Boolean => Builtin::Boolean,
            Kind::Number => Builtin::Number,
            Kind::Integer => Builtin::Integer,
            Kind::String => Builtin::String,
            Kind::DateTime => Builtin::DateTime,
            Kind::Object { .. } => Builtin::Object,
            Kind::Array { .. } => Builtin::Array,
            Kind::Union { .. } => Builtin::Union,
        }
    }

    /// A kind of the given classification with no own structure.
    pub fn bare(builtin: Builtin) -> Self {
        match builtin {
            Builtin::Any => Kind::Any,
            Builtin::Nil => Kind::Nil,
            Builtin::Boolean => Kind::Boolean,
            Builtin::Number => Kind::Number,
            Builtin::Integer => Kind::Integer,
            Builtin::String => Kind::String,
            Builtin::DateTime => Kind::DateTime,
            Builtin::Object => Kind::Object { properties: Vec::new() },
            Builtin::Array => Kind::Array { items: None },
            Builtin::Union => Kind::Union { branches: None },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyKey {
    Literal(String),
    Pattern(String),
}

impl PropertyKey {
    pub fn text(&self) -> &str {
        match self {
            PropertyKey::Literal(s) | PropertyKey::Pattern(s) => s,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PropertyNode {
    pub key: PropertyKey,
    pub required: bool,
    pub range: TypeId,
}

impl PropertyNode {
    pub fn required(key: &str, range: TypeId) -> Self {
        Self { key: PropertyKey::Literal(key.to_string()), required: true, range }
    }
    pub fn optional(key: &str, range: TypeId) -> Self {
        Self { key: PropertyKey::Literal(key.to_string()), required: false, range }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FacetValue {
    Value(Value),
    /// A nested type, as carried by `items`.
    Type(TypeId),
}

impl From<Value> for FacetValue {
    fn from(v: Value) -> Self { FacetValue::Value(v) }
}

#[derive(Clone, Debug)]
pub struct TypeNode {
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind: Kind,
    pub super_types: Vec<TypeId>,
    pub facets: IndexMap<String, FacetValue>,
    pub builtin: bool,
}

impl TypeNode {
    pub fn new(kind: Kind) -> Self {
        Self {
            name: None,
            description: None,
            kind,
            super_types: Vec::new(),
            facets: IndexMap::new(),
            builtin: false,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_description(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    pub fn with_super(mut self, base: TypeId) -> Self {
        self.super_types.push(base);
        self
    }

    pub fn with_facet(mut self, name: &str, value: impl Into<FacetValue>) -> Self {
        self.facets.insert(name.to_string(), value.into());
        self
    }
}

// ------------------------------- Builder --------------------------------- //

#[derive(Clone, Debug)]
enum Slot {
    Reserved(String),
    Defined(TypeNode),
}

#[derive(Clone, Debug)]
pub struct GraphBuilder {
    slots: Vec<Slot>,
}

impl Default for GraphBuilder {
    fn default() -> Self { Self::new() }
}

impl GraphBuilder {
    pub fn new() -> Self {
        let slots = Builtin::ALL
            .iter()
            .map(|b| {
                let mut node = TypeNode::new(Kind::bare(*b)).with_name(b.name());
                node.builtin = true;
                Slot::Defined(node)
            })
            .collect();
        Self { slots }
    }

    pub fn builtin(&self, builtin: Builtin) -> TypeId { builtin.slot() }

    /// Allocate a slot so it can be referenced before it is defined.
    pub fn reserve(&mut self, label: &str) -> TypeId {
        self.slots.push(Slot::Reserved(label.to_string()));
        TypeId(self.slots.len() - 1)
    }

    pub fn define(&mut self, id: TypeId, node: TypeNode) -> Result<TypeId, SchemaError> {
        if !matches!(self.slots.get(id.0), Some(Slot::Reserved(_))) {
            return Err(SchemaError::Redefined(id));
        }
        let kind = node.kind.classification();
        for base in &node.super_types {
            let base_node = match self.slots.get(base.0) {
                Some(Slot::Defined(n)) => n,
                _ => {
                    return Err(SchemaError::BaseNotDefined {
                        ty: self.label_of(&node, id),
                        base: self.describe(*base),
                    });
                }
            };
            let base_kind = base_node.kind.classification();
            if base_kind != kind {
                return Err(SchemaError::ClassificationMismatch {
                    ty: self.label_of(&node, id),
                    kind: kind.name(),
                    base: self.describe(*base),
                    base_kind: base_kind.name(),
                });
            }
        }
        if let Some(name) = node.name.as_deref().filter(|n| !n.is_empty()) {
            let taken = self
                .slots
                .iter()
                .any(|slot| matches!(slot, Slot::Defined(n) if n.name.as_deref() == Some(name)));
            if taken {
                return Err(SchemaError::DuplicateName(name.to_string()));
            }
        }
        self.slots[id.0] = Slot::Defined(node);
        Ok(id)
    }

    pub fn add(&mut self, node: TypeNode) -> Result<TypeId, SchemaError> {
        let id = self.reserve("<anonymous>");
        self.define(id, node).inspect_err(|_| {
            self.slots.pop();
        })
    }

    pub fn is_defined(&self, id: TypeId) -> bool {
        matches!(self.slots.get(id.0), Some(Slot::Defined(_)))
    }

    pub fn classification(&self, id: TypeId) -> Option<Builtin> {
        match self.slots.get(id.0) {
            Some(Slot::Defined(n)) => Some(n.kind.classification()),
            _ => None,
        }
    }

    /// Named object type inheriting from the `object` built-in.
    pub fn object(&mut self, name: &str, properties: Vec<PropertyNode>) -> Result<TypeId, SchemaError> {
        let node = TypeNode::new(Kind::Object { properties })
            .with_name(name)
            .with_super(Builtin::Object.slot());
        self.add(node)
    }

    /// Anonymous `items[]` array.
    pub fn array_of(&mut self, items: TypeId) -> Result<TypeId, SchemaError> {
        let node = TypeNode::new(Kind::Array { items: Some(items) }).with_super(Builtin::Array.slot());
        self.add(node)
    }

    /// Anonymous `left | right` union.
    pub fn union_of(&mut self, left: TypeId, right: TypeId) -> Result<TypeId, SchemaError> {
        let node = TypeNode::new(Kind::Union { branches: Some((left, right)) })
            .with_super(Builtin::Union.slot());
        self.add(node)
    }

    /// Anonymous specialization of `base` with extra facets.
    pub fn refine<I, K>(&mut self, base: TypeId, facets: I) -> Result<TypeId, SchemaError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let kind = self.classification(base).ok_or_else(|| SchemaError::BaseNotDefined {
            ty: "<anonymous>".to_string(),
            base: self.describe(base),
        })?;
        let mut node = TypeNode::new(Kind::bare(kind)).with_super(base);
        for (k, v) in facets {
            node = node.with_facet(k.as_ref(), v);
        }
        self.add(node)
    }

    pub fn finish(self) -> Result<TypeGraph, SchemaError> {
        let mut nodes = Vec::with_capacity(self.slots.len());
        for (i, slot) in self.slots.into_iter().enumerate() {
            match slot {
                Slot::Defined(n) => nodes.push(n),
                Slot::Reserved(_) => return Err(SchemaError::Undefined(TypeId(i))),
            }
        }
        Ok(TypeGraph { nodes })
    }

    fn describe(&self, id: TypeId) -> String {
        match self.slots.get(id.0) {
            Some(Slot::Defined(n)) => self.label_of(n, id),
            Some(Slot::Reserved(label)) => label.clone(),
            None => format!("<missing #{}>", id.0),
        }
    }

    fn label_of(&self, node: &TypeNode, id: TypeId) -> String {
        match &node.name {
            Some(name) => name.clone(),
            None => match self.slots.get(id.0) {
                Some(Slot::Reserved(label)) => label.clone(),
                _ => format!("<anonymous #{}>", id.0),
            },
        }
    }
}

// -------------------------------- Graph ---------------------------------- //

#[derive(Clone, Debug)]
pub struct TypeGraph {
    nodes: Vec<TypeNode>,
}

impl TypeGraph {
    pub fn node(&self, id: TypeId) -> &TypeNode { &self.nodes[id.0] }

    pub fn builtin(&self, builtin: Builtin) -> TypeId { builtin.slot() }

    pub fn name(&self, id: TypeId) -> Option<&str> { self.node(id).name.as_deref() }

    pub fn is_builtin(&self, id: TypeId) -> bool { self.node(id).builtin }

    pub fn classification(&self, id: TypeId) -> Builtin { self.node(id).kind.classification() }

    /// First user-declared node carrying `name`.
    pub fn find(&self, name: &str) -> Option<TypeId> {
        self.declared().find(|id| self.name(*id) == Some(name))
    }

    /// Named, non-built-in nodes in declaration order.
    pub fn declared(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.builtin && n.name.as_deref().is_some_and(|s| !s.is_empty()))
            .map(|(i, _)| TypeId(i))
    }

    pub fn is_value_type(&self, id: TypeId) -> bool {
        !matches!(
            self.classification(id),
            Builtin::Object | Builtin::Array | Builtin::Union
        )
    }

    pub fn super_types(&self, id: TypeId) -> &[TypeId] { &self.node(id).super_types }

    /// Depth-first, first super type first, without duplicates.
    pub fn all_super_types(&self, id: TypeId) -> Vec<TypeId> {
        fn walk(g: &TypeGraph, id: TypeId, out: &mut Vec<TypeId>) {
            for s in g.super_types(id) {
                if !out.contains(s) {
                    out.push(*s);
                    walk(g, *s, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(self, id, &mut out);
        out
    }

    pub fn facets(&self, id: TypeId) -> &IndexMap<String, FacetValue> { &self.node(id).facets }

    /// Facets applicable at `id`: inherited ones first, nearer definitions
    /// override the value of farther ones.
    pub fn all_facets(&self, id: TypeId) -> IndexMap<String, FacetValue> {
        let mut out = IndexMap::new();
        for base in self.super_types(id).iter().rev() {
            for (k, v) in self.all_facets(*base) {
                out.insert(k, v);
            }
        }
        for (k, v) in self.facets(id) {
            out.insert(k.clone(), v.clone());
        }
        out
    }

    pub fn properties(&self, id: TypeId) -> &[PropertyNode] {
        match &self.node(id).kind {
            Kind::Object { properties } => properties,
            _ => &[],
        }
    }

    /// Properties applicable at `id`; own declarations override inherited
    /// ones with the same key.
    pub fn all_properties(&self, id: TypeId) -> Vec<PropertyNode> {
        let mut by_key: IndexMap<String, PropertyNode> = IndexMap::new();
        for base in self.super_types(id) {
            for p in self.all_properties(*base) {
                by_key.insert(p.key.text().to_string(), p);
            }
        }
        for p in self.properties(id) {
            by_key.insert(p.key.text().to_string(), p.clone());
        }
        by_key.into_values().collect()
    }

    pub fn component_type(&self, id: TypeId) -> Option<TypeId> {
        if let Kind::Array { items: Some(items) } = &self.node(id).kind {
            return Some(*items);
        }
        self.super_types(id).iter().find_map(|s| self.component_type(*s))
    }

    pub fn union_branches(&self, id: TypeId) -> Option<(TypeId, TypeId)> {
        if let Kind::Union { branches: Some(b) } = &self.node(id).kind {
            return Some(*b);
        }
        self.super_types(id).iter().find_map(|s| self.union_branches(*s))
    }

    pub fn has_own_structure(&self, id: TypeId) -> bool {
        let node = self.node(id);
        let shaped = match &node.kind {
            Kind::Object { properties } => !properties.is_empty(),
            Kind::Array { items } => items.is_some(),
            Kind::Union { branches } => branches.is_some(),
            _ => false,
        };
        shaped || !node.facets.is_empty()
    }

    /// Human-readable label for diagnostics.
    pub fn describe(&self, id: TypeId) -> String {
        match self.name(id) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("<anonymous {} #{}>", self.classification(id).name(), id.0),
        }
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtins_are_seeded_and_named() {
        let g = GraphBuilder::new().finish().unwrap();
        for b in Builtin::ALL {
            let id = g.builtin(b);
            assert!(g.is_builtin(id));
            assert_eq!(g.name(id), Some(b.name()));
            assert_eq!(g.classification(id), b);
        }
        assert_eq!(g.declared().count(), 0);
    }

    #[test]
    fn facets_are_inherited_and_overridden() {
        let mut b = GraphBuilder::new();
        let string = b.builtin(Builtin::String);
        let base = b.reserve("Base");
        b.define(base, TypeNode::new(Kind::String)
            .with_name("Base")
            .with_super(string)
            .with_facet("minLength", json!(1))
            .with_facet("maxLength", json!(10))).unwrap();
        let derived = b.refine(base, [("maxLength", json!(5)), ("pattern", json!("^a"))]).unwrap();
        let g = b.finish().unwrap();

        let facets = g.all_facets(derived);
        let keys: Vec<&str> = facets.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, ["minLength", "maxLength", "pattern"]);
        assert_eq!(facets["maxLength"], FacetValue::Value(json!(5)));
        assert_eq!(g.all_super_types(derived), vec![base, string]);
    }

    #[test]
    fn properties_are_inherited_with_own_override() {
        let mut b = GraphBuilder::new();
        let number = b.builtin(Builtin::Number);
        let string = b.builtin(Builtin::String);
        let parent = b.object("Parent", vec![
            PropertyNode::required("a", number),
            PropertyNode::optional("b", number),
        ]).unwrap();
        let child = b.add(TypeNode::new(Kind::Object {
            properties: vec![PropertyNode::required("b", string), PropertyNode::required("c", string)],
        }).with_name("Child").with_super(parent)).unwrap();
        let g = b.finish().unwrap();

        let props = g.all_properties(child);
        let keys: Vec<&str> = props.iter().map(|p| p.key.text()).collect();
        assert_eq!(keys, ["a", "b", "c"]);
        assert!(props[1].required);
        assert_eq!(props[1].range, string);
    }

    #[test]
    fn define_rejects_mismatched_classification() {
        let mut b = GraphBuilder::new();
        let string = b.builtin(Builtin::String);
        let err = b.add(TypeNode::new(Kind::Number).with_name("Bad").with_super(string)).unwrap_err();
        assert!(matches!(err, SchemaError::ClassificationMismatch { .. }), "{err}");
    }

    #[test]
    fn define_rejects_duplicate_names() {
        let mut b = GraphBuilder::new();
        b.object("Pod", vec![]).unwrap();
        let err = b.object("Pod", vec![]).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateName(ref n) if n == "Pod"), "{err}");

        let number = b.builtin(Builtin::Number);
        let err = b.add(TypeNode::new(Kind::Number).with_name("number").with_super(number)).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateName(_)), "{err}");
        assert!(b.finish().is_ok());
    }

    #[test]
    fn define_rejects_undefined_base_and_finish_rejects_holes() {
        let mut b = GraphBuilder::new();
        let pending = b.reserve("Pending");
        let err = b.add(TypeNode::new(Kind::String).with_super(pending)).unwrap_err();
        assert!(matches!(err, SchemaError::BaseNotDefined { .. }));
        assert!(matches!(b.finish(), Err(SchemaError::Undefined(id)) if id == pending));
    }

    #[test]
    fn inherited_structure_resolves_through_supers() {
        let mut b = GraphBuilder::new();
        let string = b.builtin(Builtin::String);
        let number = b.builtin(Builtin::Number);
        let list = b.array_of(string).unwrap();
        let named_list = b.add(TypeNode::new(Kind::Array { items: None }).with_name("Names").with_super(list)).unwrap();
        let either = b.union_of(string, number).unwrap();
        let named_either = b.add(TypeNode::new(Kind::Union { branches: None }).with_name("Either").with_super(either)).unwrap();
        let g = b.finish().unwrap();

        assert_eq!(g.component_type(named_list), Some(string));
        assert_eq!(g.union_branches(named_either), Some((string, number)));
        assert!(!g.has_own_structure(named_list));
        assert!(g.has_own_structure(list));
    }
}
