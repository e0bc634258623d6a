//! Compiles a resolved RAML type graph into standalone validator functions.
//!
//! ```text
//! model::TypeGraph ── assemble::compile ──▶ ir::Module ── codegen::Codegen ──▶ CommonJS source
//! ```
pub mod assemble;
pub mod codegen;
pub mod context;
pub mod error;
pub mod generators;
pub mod ir;
pub mod model;
pub mod naming;
pub mod path_de;

pub use assemble::{compile, compile_declared};
pub use codegen::Codegen;
pub use context::Options;
pub use error::{CompileError, SchemaError};
pub use ir::{Module, PathSegment, Violation};
pub use model::{Builtin, GraphBuilder, TypeGraph, TypeId};

/// Compile `roots` and render the module as JavaScript.
pub fn compile_to_string(graph: &TypeGraph, roots: &[TypeId], options: Options) -> Result<String, CompileError> {
    let module = compile(graph, roots, options)?;
    let mut cg = Codegen::new();
    cg.emit(&module);
    Ok(cg.into_string())
}
