//! High-order composers: the structural part of a validator body.
use serde_json::Value;

use crate::context::Context;
use crate::error::CompileError;
use crate::ir::Stmt;
use crate::model::{FacetValue, PropertyKey, TypeId};

use super::facets;
use super::fragment::{self, Message};

/// Keys containing any of these are matched as regular expressions.
const REGEX_META: &[char] = &['^', '$', '.', '*', '+', '?', '(', ')', '[', ']', '{', '}', '|', '\\'];

// ---- Facets ---- //

/// Fragments of every applicable facet except those named in `skip`.
pub fn compose_facets(id: TypeId, ctx: &mut Context<'_>, skip: &[&str]) -> Result<Vec<Stmt>, CompileError> {
    let facets = ctx.graph().all_facets(id);
    facets::generate_facet_fragments(facets.iter().filter(|(k, _)| !skip.contains(&k.as_str())), ctx)
}

// ---- Arrays ---- //

/// Each element goes through the component validator, then the array
/// facets apply. A known component supersedes an `items` facet.
pub fn compose_array(id: TypeId, ctx: &mut Context<'_>) -> Result<Vec<Stmt>, CompileError> {
    let Some(component) = ctx.graph().component_type(id) else {
        return compose_facets(id, ctx, &[]);
    };
    let validator = ctx.use_type(component)?;
    let mut out = vec![Stmt::EachItem { validator }];
    out.extend(compose_facets(id, ctx, &["items"])?);
    Ok(out)
}

// ---- Unions ---- //

pub fn compose_union(id: TypeId, ctx: &mut Context<'_>) -> Result<Vec<Stmt>, CompileError> {
    let graph = ctx.graph();
    let (left, right) = graph
        .union_branches(id)
        .ok_or_else(|| CompileError::EmptyUnion(graph.describe(id)))?;
    let left = ctx.use_type(left)?;
    let right = ctx.use_type(right)?;
    let mut out = vec![Stmt::Union { left, right }];
    out.extend(compose_facets(id, ctx, &[])?);
    Ok(out)
}

// ---- Objects ---- //

enum Matcher {
    Literal(String),
    Pattern(String),
}

fn matcher(key: &PropertyKey) -> Matcher {
    match key {
        PropertyKey::Pattern(source) => Matcher::Pattern(source.clone()),
        PropertyKey::Literal(text) if text.contains(REGEX_META) => {
            let source = text
                .strip_prefix('/')
                .and_then(|t| t.strip_suffix('/'))
                .unwrap_or(text);
            Matcher::Pattern(source.to_string())
        }
        PropertyKey::Literal(text) => Matcher::Literal(text.clone()),
    }
}

/// Literal-key and pattern-key property checks, then the extraneous-key
/// check when `additionalProperties: false` applies.
pub fn compose_object_properties(id: TypeId, ctx: &mut Context<'_>) -> Result<Vec<Stmt>, CompileError> {
    let graph = ctx.graph();
    let forbid_extras = matches!(
        graph.all_facets(id).get("additionalProperties"),
        Some(FacetValue::Value(Value::Bool(false)))
    );

    let mut out = Vec::new();
    let mut keys = Vec::new();
    let mut patterns = Vec::new();
    for property in graph.all_properties(id) {
        match matcher(&property.key) {
            Matcher::Literal(key) => {
                out.push(if property.required {
                    compose_required_property(&key, property.range, ctx)?
                } else {
                    compose_property(&key, property.range, ctx)?
                });
                keys.push(key);
            }
            Matcher::Pattern(source) => {
                let pattern = facets::register_pattern(&source, ctx)?;
                let validator = ctx.use_type(property.range)?;
                let missing = property
                    .required
                    .then(|| fragment::message(ctx, Message::PropMissingMatching));
                patterns.push(pattern.clone());
                out.push(Stmt::PatternProperty { pattern, source, validator, missing });
            }
        }
    }

    if forbid_extras {
        let message = fragment::message(ctx, Message::PropAdditional);
        out.push(Stmt::RejectAdditional { keys, patterns, message });
    }
    Ok(out)
}

pub fn compose_required_property(key: &str, range: TypeId, ctx: &mut Context<'_>) -> Result<Stmt, CompileError> {
    let validator = ctx.use_type(range)?;
    let missing = Some(fragment::message(ctx, Message::PropMissing));
    Ok(Stmt::Property { key: key.to_string(), validator, missing })
}

pub fn compose_property(key: &str, range: TypeId, ctx: &mut Context<'_>) -> Result<Stmt, CompileError> {
    let validator = ctx.use_type(range)?;
    Ok(Stmt::Property { key: key.to_string(), validator, missing: None })
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Options;
    use crate::ir::ValidatorRef;
    use crate::model::{Builtin, GraphBuilder, Kind, PropertyNode, TypeNode};
    use serde_json::json;

    #[test]
    fn literal_keys_with_metacharacters_become_patterns() {
        assert!(matches!(matcher(&PropertyKey::Literal("name".into())), Matcher::Literal(k) if k == "name"));
        assert!(matches!(matcher(&PropertyKey::Literal("/^x-/".into())), Matcher::Pattern(p) if p == "^x-"));
        assert!(matches!(matcher(&PropertyKey::Literal("a.b".into())), Matcher::Pattern(p) if p == "a.b"));
        assert!(matches!(matcher(&PropertyKey::Pattern("^y".into())), Matcher::Pattern(p) if p == "^y"));
    }

    #[test]
    fn object_properties_partition_and_close() {
        let mut b = GraphBuilder::new();
        let number = b.builtin(Builtin::Number);
        let string = b.builtin(Builtin::String);
        let object = b.builtin(Builtin::Object);
        let node = TypeNode::new(Kind::Object {
            properties: vec![
                PropertyNode::required("id", number),
                PropertyNode::optional("note", string),
                PropertyNode { key: PropertyKey::Pattern("^x-".into()), required: false, range: string },
            ],
        })
        .with_name("Closed")
        .with_super(object)
        .with_facet("additionalProperties", json!(false));
        let id = b.add(node).unwrap();
        let g = b.finish().unwrap();

        let mut ctx = Context::new(&g, Options::default());
        let out = compose_object_properties(id, &mut ctx).unwrap();
        assert_eq!(out.len(), 4);
        assert!(matches!(&out[0], Stmt::Property { key, missing: Some(_), .. } if key == "id"));
        assert!(matches!(&out[1], Stmt::Property { key, missing: None, .. } if key == "note"));
        assert!(matches!(&out[2], Stmt::PatternProperty { source, missing: None, .. } if source == "^x-"));
        match &out[3] {
            Stmt::RejectAdditional { keys, patterns, .. } => {
                assert_eq!(keys, &vec!["id".to_string(), "note".to_string()]);
                assert_eq!(patterns.len(), 1);
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn array_component_supersedes_items_facet() {
        let mut b = GraphBuilder::new();
        let string = b.builtin(Builtin::String);
        let list = b.array_of(string).unwrap();
        let limited = b.refine(list, [("maxItems", json!(3))]).unwrap();
        let g = b.finish().unwrap();

        let mut ctx = Context::new(&g, Options::default());
        let out = compose_array(limited, &mut ctx).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Stmt::EachItem { validator: ValidatorRef("string".into()) });
    }

    #[test]
    fn union_without_branches_is_fatal() {
        let g = GraphBuilder::new().finish().unwrap();
        let mut ctx = Context::new(&g, Options::default());
        assert!(matches!(
            compose_union(g.builtin(Builtin::Union), &mut ctx),
            Err(CompileError::EmptyUnion(_))
        ));
    }

    #[test]
    fn union_references_both_branches() {
        let mut b = GraphBuilder::new();
        let number = b.builtin(Builtin::Number);
        let string = b.builtin(Builtin::String);
        let either = b.union_of(number, string).unwrap();
        let g = b.finish().unwrap();
        let mut ctx = Context::new(&g, Options::default());
        let out = compose_union(either, &mut ctx).unwrap();
        assert_eq!(
            out,
            vec![Stmt::Union {
                left: ValidatorRef("number".into()),
                right: ValidatorRef("string".into()),
            }]
        );
    }
}
