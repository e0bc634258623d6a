// Fragment IR for emitted validators. Composers build it, `codegen` renders
// it; nothing here knows about JavaScript text or escaping.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::ConstantTables;

/// Reference to a compiled validator, by its assigned name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidatorRef(pub String);

impl ValidatorRef {
    pub fn name(&self) -> &str { &self.0 }
}

/// Reference to an entry of a constant table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstRef {
    pub table: String,
    pub slot: Slot,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Slot {
    Key(String),
    Index(usize),
}

/// Template variables carried by a violation.
pub type Params = IndexMap<String, Value>;

/// A predicate over the value under validation. Every test reads as
/// "this is wrong", so a true result reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "test", content = "arg", rename_all = "camelCase")]
pub enum Test {
    NotNull,
    NotNumber,
    NotInteger,
    NotBoolean,
    NotString,
    NotDateTime,
    NotObject,
    NotArray,
    Above(f64),
    Below(f64),
    NotMultipleOf(f64),
    Fractional,
    OutsideRange { min: f64, max: f64 },
    /// Rounding through a 32-bit float loses digits that were written.
    Float32Lossy { scratch: ConstRef },
    /// String or array length.
    LengthBelow(u64),
    LengthAbove(u64),
    KeyCountBelow(u64),
    KeyCountAbove(u64),
    NoMatch(ConstRef),
    NotOneOf { values: ConstRef, case_insensitive: bool },
    HasDuplicates,
    Either(Vec<Test>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stmt", rename_all = "camelCase")]
pub enum Stmt {
    /// Report `message` when `test` holds.
    Check { test: Test, message: ConstRef, params: Params },
    /// Report `message` when `test` holds, run `body` otherwise.
    Guard { test: Test, message: ConstRef, body: Vec<Stmt> },
    /// Validate every element, path extended by its index.
    EachItem { validator: ValidatorRef },
    /// Validate `value[key]` when present; report `missing` when absent and required.
    Property { key: String, validator: ValidatorRef, missing: Option<ConstRef> },
    /// Validate every own key matching `pattern`.
    PatternProperty {
        pattern: ConstRef,
        source: String,
        validator: ValidatorRef,
        missing: Option<ConstRef>,
    },
    /// Report every own key not covered by `keys` or `patterns`.
    RejectAdditional { keys: Vec<String>, patterns: Vec<ConstRef>, message: ConstRef },
    /// Valid if either branch is; otherwise keep the branch with fewer
    /// violations (left on ties).
    Union { left: ValidatorRef, right: ValidatorRef },
}

#[derive(Debug, Clone, Serialize)]
pub struct CompiledValidator {
    pub name: String,
    pub comment: Option<String>,
    pub body: Vec<Stmt>,
}

/// One assembled compilation unit.
#[derive(Debug, Clone, Serialize)]
pub struct Module {
    pub constants: ConstantTables,
    /// In compile order.
    pub validators: IndexMap<String, CompiledValidator>,
    /// Names registered as roots.
    pub exports: Vec<String>,
}

impl Module {
    pub fn validator(&self, name: &str) -> Option<&CompiledValidator> {
        self.validators.get(name)
    }
}

// ------------------------------ Violations ------------------------------- //

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// The record emitted validators produce, one per failed check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub path: Vec<PathSegment>,
    pub message: String,
    #[serde(default)]
    pub params: Params,
}
