//! Error types for graph construction and compilation.
//!
//! Two failure classes exist. `SchemaError` covers building a `TypeGraph`
//! (by hand or from a graph document). `CompileError` covers the fatal
//! compile-time errors; runtime violations are never errors, they are the
//! data the emitted validators return.

use thiserror::Error;

use crate::model::TypeId;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("type slot {0:?} is already defined")]
    Redefined(TypeId),

    #[error("type slot {0:?} was reserved but never defined")]
    Undefined(TypeId),

    #[error("type `{ty}` inherits from `{base}`, which is not defined yet")]
    BaseNotDefined { ty: String, base: String },

    #[error("type `{ty}` is classified as `{kind}` but inherits from `{base}` ({base_kind})")]
    ClassificationMismatch {
        ty: String,
        kind: &'static str,
        base: String,
        base_kind: &'static str,
    },

    #[error("cyclic inheritance through `{0}`")]
    CyclicInheritance(String),

    #[error("unknown type `{0}`")]
    UnknownType(String),

    #[error("type `{0}` is declared more than once")]
    DuplicateName(String),

    #[error("`{0}` is a built-in type and cannot be redeclared")]
    BuiltinRedeclared(String),

    #[error("malformed type expression `{0}`")]
    MalformedExpression(String),

    #[error("at JSON path {path} → {message}")]
    Document { path: String, message: String },
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("unknown facet `{0}`")]
    UnknownFacet(String),

    #[error("facet `{facet}` expects {expected}, found `{found}`")]
    InvalidFacetValue {
        facet: String,
        expected: &'static str,
        found: String,
    },

    #[error("unknown value for the `format` facet: `{0}`")]
    UnknownFormat(String),

    #[error("invalid regular expression `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("don't know how to name an anonymous, structured type ({0})")]
    AnonymousType(String),

    #[error("type `{0}` has no built-in ancestor")]
    MissingBuiltin(String),

    #[error("union type `{0}` has no branches")]
    EmptyUnion(String),

    #[error("while compiling `{ty}`: {source}")]
    InType {
        ty: String,
        #[source]
        source: Box<CompileError>,
    },
}

impl CompileError {
    /// Attach the name of the type being compiled, once.
    pub fn in_type(self, ty: &str) -> Self {
        match self {
            CompileError::InType { .. } => self,
            other => CompileError::InType {
                ty: ty.to_string(),
                source: Box::new(other),
            },
        }
    }
}
