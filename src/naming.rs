//! Stable names for type nodes.
//!
//! The assigned name is the identity of a compiled validator. Declared types
//! keep their name; inline specializations (anonymous arrays and anonymous
//! facet-refined value types) get a content-derived name, so structurally
//! identical inline types collapse onto one validator.
use sha2::{Digest, Sha256};

use crate::error::CompileError;
use crate::model::{Builtin, FacetValue, TypeGraph, TypeId};

/// Deep enough for any real schema; protects against self-referential
/// anonymous nodes.
const MAX_NAMING_DEPTH: usize = 64;

pub fn type_name(graph: &TypeGraph, id: TypeId) -> Result<String, CompileError> {
    name_at(graph, id, 0)
}

fn name_at(graph: &TypeGraph, id: TypeId, depth: usize) -> Result<String, CompileError> {
    if depth > MAX_NAMING_DEPTH {
        return Err(CompileError::AnonymousType(graph.describe(id)));
    }
    let node = graph.node(id);
    let is_array = graph.classification(id) == Builtin::Array;

    if is_inline(graph, id) {
        return inline_name(graph, id, depth);
    }

    if let Some(name) = &node.name {
        if !name.is_empty() {
            return Ok(name.clone());
        }
        if is_array {
            if let Some(component) = graph.component_type(id) {
                return Ok(format!("{}AsArray", name_at(graph, component, depth + 1)?));
            }
        }
    }

    // a bare specialization adds nothing of its own
    if !graph.has_own_structure(id) {
        if let Some(first) = graph.super_types(id).first() {
            return name_at(graph, *first, depth + 1);
        }
    }

    if is_array {
        if let Some(component) = graph.component_type(id) {
            return Ok(format!("{}AsArray", name_at(graph, component, depth + 1)?));
        }
    }

    // `A | B` written in place; facets on it would need their own identity
    if graph.facets(id).is_empty() {
        if let Some((left, right)) = graph.union_branches(id) {
            let left = name_at(graph, left, depth + 1)?;
            let right = name_at(graph, right, depth + 1)?;
            return Ok(format!("{left}Or{}", capitalize(&right)));
        }
    }

    Err(CompileError::AnonymousType(graph.describe(id)))
}

/// Anonymous arrays and anonymous value-type refinements.
pub fn is_inline(graph: &TypeGraph, id: TypeId) -> bool {
    graph.node(id).name.is_none()
        && (graph.classification(id) == Builtin::Array || graph.is_value_type(id))
}

/// Name of what an inline type specializes: the component of an array,
/// the first super type of a value type.
pub fn inline_base(graph: &TypeGraph, id: TypeId) -> Result<String, CompileError> {
    inline_base_at(graph, id, 0)
}

fn inline_base_at(graph: &TypeGraph, id: TypeId, depth: usize) -> Result<String, CompileError> {
    if let Some(name) = graph.name(id) {
        return Ok(name.to_string());
    }
    let base = if graph.classification(id) == Builtin::Array {
        graph.component_type(id)
    } else {
        graph.super_types(id).first().copied()
    };
    match base {
        Some(b) => name_at(graph, b, depth + 1),
        None => Ok(Builtin::Any.name().to_string()),
    }
}

fn inline_name(graph: &TypeGraph, id: TypeId, depth: usize) -> Result<String, CompileError> {
    let base = inline_base_at(graph, id, depth)?;
    let mut entries = facet_entries(graph, id, depth)?;
    entries.sort();

    // classification keeps `string[]` apart from a bare inline `string`
    let mut expr = format!("{}:{}", graph.classification(id).name(), base);
    for (k, v) in &entries {
        expr.push('|');
        expr.push_str(k);
        expr.push('=');
        expr.push_str(v);
    }
    Ok(format!("inline{}_{}", capitalize(&base), digest(&expr)))
}

fn facet_entries(graph: &TypeGraph, id: TypeId, depth: usize) -> Result<Vec<(String, String)>, CompileError> {
    graph
        .all_facets(id)
        .iter()
        .map(|(k, v)| Ok((k.clone(), facet_text(graph, v, depth)?)))
        .collect()
}

fn facet_text(graph: &TypeGraph, value: &FacetValue, depth: usize) -> Result<String, CompileError> {
    Ok(match value {
        FacetValue::Value(serde_json::Value::String(s)) => s.clone(),
        FacetValue::Value(v) => v.to_string(),
        FacetValue::Type(t) => name_at(graph, *t, depth + 1)?,
    })
}

/// Comment attached to the validator of an inline type.
pub fn inline_comment(graph: &TypeGraph, id: TypeId) -> Result<String, CompileError> {
    let mut out = format!(
        "This is an in-line specialisation of {}\n with the following constraints:\n",
        inline_base(graph, id)?
    );
    for (k, v) in facet_entries(graph, id, 0)? {
        out.push_str(&format!("\n- {k}: {v}"));
    }
    Ok(out)
}

/// First built-in node on the super-type chain, the node itself first.
pub fn base_builtin_of(graph: &TypeGraph, id: TypeId) -> Result<TypeId, CompileError> {
    if graph.is_builtin(id) {
        return Ok(id);
    }
    graph
        .all_super_types(id)
        .into_iter()
        .find(|s| graph.is_builtin(*s))
        .ok_or_else(|| CompileError::MissingBuiltin(graph.describe(id)))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn digest(expr: &str) -> String {
    let hash = Sha256::digest(expr.as_bytes());
    hash.iter().take(16).map(|b| format!("{b:02x}")).collect()
}

// ------------------------------- Tests ------------------------------------ //
