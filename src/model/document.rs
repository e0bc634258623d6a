//! JSON documents describing an already-resolved type graph.
//!
//! ```json
//! { "types": {
//!     "Pod": { "properties": { "id": "string", "labels?": "Labels", "/^x-/": "any" } },
//!     "Labels": { "type": "object", "additionalProperties": false },
//!     "Id": { "type": "string", "pattern": "^[a-z]+$" },
//!     "Ids": "Id[]",
//!     "IdOrCount": "Id | integer"
//! } }
//! ```
//!
//! This is not RAML source text: includes, libraries and YAML are the
//! producer's business. A declaration's `type` names its super type(s);
//! `properties`, `items` and `description` are structural, documentation
//! keys are dropped and every other key is a facet.
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use super::{Builtin, FacetValue, GraphBuilder, Kind, PropertyKey, PropertyNode, TypeGraph, TypeId, TypeNode};
use crate::error::SchemaError;

const DOCUMENTATION_KEYS: &[&str] = &["displayName", "example", "examples", "default"];

// -------------------------------- Shape ---------------------------------- //

#[derive(Debug, Clone, Deserialize)]
pub struct GraphDocument {
    pub types: IndexMap<String, TypeExpr>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TypeExpr {
    /// `"Name"`, `"A | B"` or `"T[]"`
    Reference(String),
    Declaration(Box<Declaration>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BaseExpr {
    One(TypeExpr),
    Many(Vec<TypeExpr>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Declaration {
    #[serde(rename = "type", default)]
    pub base: Option<BaseExpr>,
    #[serde(default)]
    pub properties: Option<IndexMap<String, TypeExpr>>,
    #[serde(default)]
    pub items: Option<TypeExpr>,
    #[serde(default)]
    pub description: Option<String>,
    /// Only meaningful on property declarations.
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(flatten)]
    pub facets: IndexMap<String, Value>,
}

impl Declaration {
    /// `{ "type": "Name" }` with nothing that would make it a new type.
    fn plain_reference(&self) -> Option<&str> {
        let no_facets = self
            .facets
            .keys()
            .all(|k| is_documentation_key(k));
        match &self.base {
            Some(BaseExpr::One(TypeExpr::Reference(name)))
                if self.properties.is_none() && self.items.is_none() && no_facets =>
            {
                Some(name)
            }
            _ => None,
        }
    }
}

fn is_documentation_key(key: &str) -> bool {
    DOCUMENTATION_KEYS.contains(&key) || key.starts_with('(')
}

// ------------------------------- Loading --------------------------------- //

#[derive(Debug, Clone)]
pub struct LoadedGraph {
    pub graph: TypeGraph,
    /// Declared names in document order.
    pub declared: IndexMap<String, TypeId>,
}

pub fn load_str(src: &str) -> Result<LoadedGraph, SchemaError> {
    let doc: GraphDocument = crate::path_de::from_str_with_path(src)?;
    load(&doc)
}

pub fn load(doc: &GraphDocument) -> Result<LoadedGraph, SchemaError> {
    let mut loader = Loader {
        doc,
        builder: GraphBuilder::new(),
        declared: IndexMap::new(),
        resolving: Vec::new(),
    };
    for name in doc.types.keys() {
        if Builtin::from_name(name).is_some() {
            return Err(SchemaError::BuiltinRedeclared(name.clone()));
        }
        let id = loader.builder.reserve(name);
        loader.declared.insert(name.clone(), id);
    }
    for name in doc.types.keys() {
        loader.ensure_defined(name)?;
    }
    let Loader { builder, declared, .. } = loader;
    Ok(LoadedGraph { graph: builder.finish()?, declared })
}

struct Loader<'d> {
    doc: &'d GraphDocument,
    builder: GraphBuilder,
    declared: IndexMap<String, TypeId>,
    resolving: Vec<String>,
}

impl<'d> Loader<'d> {
    fn ensure_defined(&mut self, name: &str) -> Result<TypeId, SchemaError> {
        let id = self.declared[name];
        if self.builder.is_defined(id) {
            return Ok(id);
        }
        if self.resolving.iter().any(|n| n == name) {
            return Err(SchemaError::CyclicInheritance(name.to_string()));
        }
        self.resolving.push(name.to_string());
        let doc = self.doc;
        let node = match &doc.types[name] {
            TypeExpr::Reference(expr) => {
                let base = self.reference(expr, true)?;
                let kind = self.classification(base)?;
                TypeNode::new(Kind::bare(kind)).with_name(name).with_super(base)
            }
            TypeExpr::Declaration(decl) => self.build_node(decl, Some(name))?,
        };
        self.builder.define(id, node)?;
        self.resolving.pop();
        Ok(id)
    }

    /// Resolve a textual type expression. Super types must be fully
    /// defined; ranges, items and branches only need an identity.
    fn reference(&mut self, expr: &str, need_defined: bool) -> Result<TypeId, SchemaError> {
        let expr = expr.trim();
        if expr.contains('|') {
            let mut parts = expr.split('|');
            let first = parts.next().unwrap_or_default();
            let mut acc = self.reference(first, false)?;
            for part in parts {
                let right = self.reference(part, false)?;
                acc = self.builder.union_of(acc, right)?;
            }
            return Ok(acc);
        }
        if let Some(inner) = expr.strip_suffix("[]") {
            if inner.trim().is_empty() {
                return Err(SchemaError::MalformedExpression(expr.to_string()));
            }
            let items = self.reference(inner, false)?;
            return self.builder.array_of(items);
        }
        if let Some(b) = Builtin::from_name(expr) {
            return Ok(self.builder.builtin(b));
        }
        match self.declared.get(expr) {
            Some(id) if !need_defined => Ok(*id),
            Some(_) => self.ensure_defined(expr),
            None if expr.is_empty() => Err(SchemaError::MalformedExpression(expr.to_string())),
            None => Err(SchemaError::UnknownType(expr.to_string())),
        }
    }

    fn reference_expr(&mut self, expr: &TypeExpr, need_defined: bool) -> Result<TypeId, SchemaError> {
        match expr {
            TypeExpr::Reference(s) => self.reference(s, need_defined),
            TypeExpr::Declaration(decl) => match decl.plain_reference() {
                Some(name) => self.reference(name, need_defined),
                _ => {
                    let node = self.build_node(decl, None)?;
                    self.builder.add(node)
                }
            },
        }
    }

    fn classification(&self, id: TypeId) -> Result<Builtin, SchemaError> {
        self.builder.classification(id).ok_or(SchemaError::Undefined(id))
    }

    fn build_node(&mut self, decl: &Declaration, name: Option<&str>) -> Result<TypeNode, SchemaError> {
        let supers = match &decl.base {
            Some(BaseExpr::One(e)) => vec![self.reference_expr(e, true)?],
            Some(BaseExpr::Many(es)) => es
                .iter()
                .map(|e| self.reference_expr(e, true))
                .collect::<Result<Vec<_>, _>>()?,
            None if decl.properties.is_some() => vec![self.builder.builtin(Builtin::Object)],
            None if decl.items.is_some() => vec![self.builder.builtin(Builtin::Array)],
            None => vec![self.builder.builtin(Builtin::String)],
        };
        let Some(first) = supers.first() else {
            return Err(SchemaError::MalformedExpression(name.unwrap_or("<anonymous>").to_string()));
        };
        let class = self.classification(*first)?;
        let label = name.unwrap_or("<anonymous>").to_string();

        let kind = match class {
            Builtin::Object => {
                let mut properties = Vec::new();
                for (raw, expr) in decl.properties.iter().flatten() {
                    properties.push(self.property(raw, expr)?);
                }
                Kind::Object { properties }
            }
            Builtin::Array => {
                let items = match &decl.items {
                    Some(e) => Some(self.reference_expr(e, false)?),
                    None => None,
                };
                Kind::Array { items }
            }
            other => Kind::bare(other),
        };
        if decl.properties.is_some() && class != Builtin::Object {
            return Err(self.mismatch(&label, Builtin::Object, *first, class));
        }
        if decl.items.is_some() && class != Builtin::Array {
            return Err(self.mismatch(&label, Builtin::Array, *first, class));
        }

        let mut node = TypeNode::new(kind);
        node.name = name.map(str::to_string);
        node.description = decl.description.clone();
        node.super_types = supers;
        for (k, v) in &decl.facets {
            if !is_documentation_key(k) {
                node.facets.insert(k.clone(), FacetValue::Value(v.clone()));
            }
        }
        Ok(node)
    }

    fn property(&mut self, raw: &str, expr: &TypeExpr) -> Result<PropertyNode, SchemaError> {
        let (text, optional) = match raw.strip_suffix('?') {
            Some(stripped) if !stripped.is_empty() => (stripped, true),
            _ => (raw, false),
        };
        let key = match text.strip_prefix('/').and_then(|t| t.strip_suffix('/')) {
            Some(pattern) => PropertyKey::Pattern(pattern.to_string()),
            None => PropertyKey::Literal(text.to_string()),
        };
        let required = match expr {
            TypeExpr::Declaration(decl) => decl.required.unwrap_or(!optional),
            TypeExpr::Reference(_) => !optional,
        };
        let range = self.reference_expr(expr, false)?;
        Ok(PropertyNode { key, required, range })
    }

    fn mismatch(&self, ty: &str, kind: Builtin, base: TypeId, base_kind: Builtin) -> SchemaError {
        SchemaError::ClassificationMismatch {
            ty: ty.to_string(),
            kind: kind.name(),
            base: format!("#{}", base.index()),
            base_kind: base_kind.name(),
        }
    }
}

// ------------------------------- Tests ------------------------------------ //
