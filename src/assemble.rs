//! Compile session driver: drains the queue and assembles a `Module`.
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::context::{Context, Options};
use crate::error::CompileError;
use crate::generators;
use crate::ir::{CompiledValidator, Module};
use crate::model::{TypeGraph, TypeId};
use crate::naming;

/// Compile `roots` and everything they reach. Any compile error discards
/// the session.
pub fn compile(graph: &TypeGraph, roots: &[TypeId], options: Options) -> Result<Module, CompileError> {
    let mut ctx = Context::new(graph, options);
    for root in roots {
        ctx.export(*root).map_err(|e| e.in_type(&graph.describe(*root)))?;
    }

    let mut validators = IndexMap::new();
    while let Some(id) = ctx.next_type_in_queue() {
        let name = naming::type_name(graph, id)?;
        debug!(name = %name, "compiling type");
        let body = generators::type_validator(id, &mut ctx).map_err(|e| e.in_type(&name))?;
        let comment = comment_for(graph, id).map_err(|e| e.in_type(&name))?;
        validators.insert(name.clone(), CompiledValidator { name, comment, body });
    }

    let (constants, exports) = ctx.into_parts();
    info!(validators = validators.len(), exports = exports.len(), "assembled module");
    Ok(Module { constants, validators, exports })
}

/// Compile every declared type of `graph`, in declaration order.
pub fn compile_declared(graph: &TypeGraph, options: Options) -> Result<Module, CompileError> {
    let roots: Vec<TypeId> = graph.declared().collect();
    compile(graph, &roots, options)
}

fn comment_for(graph: &TypeGraph, id: TypeId) -> Result<Option<String>, CompileError> {
    let mut parts = Vec::new();
    if let Some(text) = graph.node(id).description.as_deref() {
        parts.push(text.trim().to_string());
    }
    if naming::is_inline(graph, id) && !graph.all_facets(id).is_empty() {
        parts.push(naming::inline_comment(graph, id)?);
    }
    Ok((!parts.is_empty()).then(|| parts.join("\n\n")))
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Builtin, GraphBuilder, Kind, PropertyNode, TypeNode};
    use serde_json::json;

    #[test]
    fn shared_types_compile_once() {
        let mut b = GraphBuilder::new();
        let string = b.builtin(Builtin::String);
        let name = b.refine(string, [("minLength", json!(3))]).unwrap();
        let same = b.refine(string, [("minLength", json!(3))]).unwrap();
        let person = b
            .object("Person", vec![PropertyNode::required("first", name), PropertyNode::required("last", same)])
            .unwrap();
        let g = b.finish().unwrap();

        let module = compile(&g, &[person], Options::default()).unwrap();
        let names: Vec<_> = module.validators.keys().cloned().collect();
        assert_eq!(names.len(), 2, "{names:?}");
        assert_eq!(names[0], "Person");
        assert!(names[1].starts_with("inlineString_"));
        assert_eq!(module.exports, vec!["Person".to_string()]);
    }

    #[test]
    fn recursive_types_terminate() {
        let mut b = GraphBuilder::new();
        let object = b.builtin(Builtin::Object);
        let node = b.reserve("Node");
        let children = b.array_of(node).unwrap();
        b.define(
            node,
            TypeNode::new(Kind::Object {
                properties: vec![PropertyNode::optional("next", node), PropertyNode::optional("children", children)],
            })
            .with_name("Node")
            .with_super(object),
        )
        .unwrap();
        let g = b.finish().unwrap();

        let module = compile(&g, &[node], Options::default()).unwrap();
        assert_eq!(module.validators.len(), 2);
        assert!(module.validator("Node").is_some());
    }

    #[test]
    fn independent_sessions_are_identical() {
        let mut b = GraphBuilder::new();
        let number = b.builtin(Builtin::Number);
        let string = b.builtin(Builtin::String);
        let code = b.refine(string, [("pattern", json!("^[A-Z]{3}$"))]).unwrap();
        let amount = b.refine(number, [("minimum", json!(0)), ("format", json!("float"))]).unwrap();
        let money = b
            .object("Money", vec![PropertyNode::required("currency", code), PropertyNode::required("amount", amount)])
            .unwrap();
        let g = b.finish().unwrap();

        let a = serde_json::to_string(&compile(&g, &[money], Options::default()).unwrap()).unwrap();
        let c = serde_json::to_string(&compile(&g, &[money], Options::default()).unwrap()).unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn errors_name_the_type_being_compiled() {
        let mut b = GraphBuilder::new();
        let number = b.builtin(Builtin::Number);
        let bad = b.add(TypeNode::new(Kind::Number).with_name("Odd").with_super(number).with_facet("format", json!("int7"))).unwrap();
        let g = b.finish().unwrap();

        let err = compile(&g, &[bad], Options::default()).unwrap_err();
        assert!(matches!(&err, CompileError::InType { ty, source }
            if ty == "Odd" && matches!(**source, CompileError::UnknownFormat(_))));
    }

    #[test]
    fn inline_types_carry_a_constraint_comment() {
        let mut b = GraphBuilder::new();
        let string = b.builtin(Builtin::String);
        let short = b.refine(string, [("maxLength", json!(8))]).unwrap();
        let g = b.finish().unwrap();

        let module = compile(&g, &[short], Options::default()).unwrap();
        let validator = module.validators.values().next().unwrap();
        let comment = validator.comment.as_deref().unwrap();
        assert!(comment.contains("in-line specialisation of string"));
        assert!(comment.contains("- maxLength: 8"));
    }

    #[test]
    fn declared_types_compile_in_declaration_order() {
        let mut b = GraphBuilder::new();
        let string = b.builtin(Builtin::String);
        let integer = b.builtin(Builtin::Integer);
        let id = b.reserve("Id");
        b.define(id, TypeNode::new(Kind::String).with_name("Id").with_super(string).with_description("opaque id"))
            .unwrap();
        let count = b.reserve("Count");
        b.define(count, TypeNode::new(Kind::Integer).with_name("Count").with_super(integer)).unwrap();
        let g = b.finish().unwrap();

        assert_eq!(g.find("Count"), Some(count));
        let module = compile_declared(&g, Options::default()).unwrap();
        assert_eq!(module.exports, vec!["Id".to_string(), "Count".to_string()]);
        assert_eq!(module.validator("Id").unwrap().comment.as_deref(), Some("opaque id"));
    }
}
