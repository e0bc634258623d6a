//! Validator body generation.
//!
//! `type_validator` dispatches on the node's classification: composers
//! build the structural part, facet validators the constraint part, and
//! the native guard of the nearest built-in ancestor wraps the result.
pub mod composers;
pub mod facets;
pub mod fragment;
pub mod native;

use crate::context::Context;
use crate::error::CompileError;
use crate::ir::Stmt;
use crate::model::{Kind, TypeId};
use crate::naming;

/// Body of the validator for `id`. Referenced types are enqueued on `ctx`.
pub fn type_validator(id: TypeId, ctx: &mut Context<'_>) -> Result<Vec<Stmt>, CompileError> {
    let graph = ctx.graph();
    let body = match &graph.node(id).kind {
        Kind::Object { .. } => {
            let mut out = composers::compose_facets(id, ctx, &[])?;
            out.extend(composers::compose_object_properties(id, ctx)?);
            out
        }
        Kind::Array { .. } => composers::compose_array(id, ctx)?,
        Kind::Union { .. } => composers::compose_union(id, ctx)?,
        Kind::Any
        | Kind::Nil
        | Kind::Boolean
        | Kind::Number
        | Kind::Integer
        | Kind::String
        | Kind::DateTime => composers::compose_facets(id, ctx, &[])?,
    };
    let builtin = naming::base_builtin_of(graph, id)?;
    Ok(native::wrap(body, builtin, ctx))
}

// ------------------------------- Tests ------------------------------------ //
