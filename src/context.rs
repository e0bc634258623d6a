//! Per-session compiler state: the compile queue and the constant tables.
//!
//! A `Context` lives for exactly one compilation. `use_type` hands out a
//! validator reference by assigned name and enqueues the type the first
//! time that name is seen; because the check happens before any body is
//! generated, recursive schemas terminate. Constant tables deduplicate
//! literals by canonical content and keep first-registration order so that
//! output is byte-stable across sessions.
use std::collections::VecDeque;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::CompileError;
use crate::ir::{ConstRef, Slot, ValidatorRef};
use crate::model::{TypeGraph, TypeId};
use crate::naming;

pub const ERROR_MESSAGES: &str = "ERROR_MESSAGES";
pub const REGEX: &str = "REGEX";
pub const ENUMS: &str = "ENUMS";
pub const HELPERS: &str = "HELPERS";

// -------------------------------- Options -------------------------------- //

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    /// Compare `enum` members and candidates case-insensitively.
    pub case_insensitive_enums: bool,
}

// ---------------------------- Constant tables ---------------------------- //

/// A literal that emitted code closes over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Literal {
    Regex(String),
    Values(Vec<Value>),
    /// One-slot 32-bit float buffer used by the `float` format check.
    Float32Scratch,
}

impl Literal {
    fn canonical(&self) -> String {
        match self {
            Literal::Regex(src) => format!("regex:{src}"),
            Literal::Values(vs) => format!("values:{}", Value::Array(vs.clone())),
            Literal::Float32Scratch => "float32".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConstantTables {
    /// Keyed string tables (error message templates).
    strings: IndexMap<String, IndexMap<String, String>>,
    /// Indexed literal tables, keyed by canonical form.
    expressions: IndexMap<String, IndexMap<String, Literal>>,
}

impl ConstantTables {
    /// Register `key` in `table`; the first template registered wins.
    pub fn string(&mut self, table: &str, key: &str, template: &str) -> ConstRef {
        let entries = self.strings.entry(table.to_string()).or_default();
        if !entries.contains_key(key) {
            trace!(table, key, "registered constant string");
            entries.insert(key.to_string(), template.to_string());
        }
        ConstRef { table: table.to_string(), slot: Slot::Key(key.to_string()) }
    }

    /// Register `literal` in `table`, returning the slot of the first
    /// identical registration.
    pub fn expression(&mut self, table: &str, literal: Literal) -> ConstRef {
        let entries = self.expressions.entry(table.to_string()).or_default();
        let canonical = literal.canonical();
        let index = match entries.get_index_of(&canonical) {
            Some(i) => i,
            None => {
                trace!(table, %canonical, "registered constant expression");
                entries.insert(canonical, literal);
                entries.len() - 1
            }
        };
        ConstRef { table: table.to_string(), slot: Slot::Index(index) }
    }

    pub fn string_tables(&self) -> impl Iterator<Item = (&str, &IndexMap<String, String>)> {
        self.strings.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn expression_tables(&self) -> impl Iterator<Item = (&str, Vec<&Literal>)> {
        self.expressions
            .iter()
            .map(|(k, v)| (k.as_str(), v.values().collect()))
    }

    pub fn resolve_string(&self, r: &ConstRef) -> Option<&str> {
        match &r.slot {
            Slot::Key(key) => self.strings.get(&r.table)?.get(key).map(String::as_str),
            Slot::Index(_) => None,
        }
    }

    pub fn resolve_expression(&self, r: &ConstRef) -> Option<&Literal> {
        match &r.slot {
            Slot::Index(i) => self.expressions.get(&r.table)?.get_index(*i).map(|(_, l)| l),
            Slot::Key(_) => None,
        }
    }
}

// -------------------------------- Context -------------------------------- //

pub struct Context<'g> {
    graph: &'g TypeGraph,
    options: Options,
    queue: VecDeque<TypeId>,
    known: IndexMap<String, TypeId>,
    exports: Vec<String>,
    constants: ConstantTables,
}

impl<'g> Context<'g> {
    pub fn new(graph: &'g TypeGraph, options: Options) -> Self {
        Self {
            graph,
            options,
            queue: VecDeque::new(),
            known: IndexMap::new(),
            exports: Vec::new(),
            constants: ConstantTables::default(),
        }
    }

    pub fn graph(&self) -> &'g TypeGraph { self.graph }

    pub fn options(&self) -> &Options { &self.options }

    /// Reference to the eventual validator of `id`, enqueueing it when its
    /// name has not been seen in this session.
    pub fn use_type(&mut self, id: TypeId) -> Result<ValidatorRef, CompileError> {
        let name = naming::type_name(self.graph, id)?;
        if !self.known.contains_key(&name) {
            debug!(name = %name, "enqueued type");
            self.known.insert(name.clone(), id);
            self.queue.push_back(id);
        }
        Ok(ValidatorRef(name))
    }

    /// `use_type` for a root the caller asked for; roots are exported.
    pub fn export(&mut self, id: TypeId) -> Result<ValidatorRef, CompileError> {
        let r = self.use_type(id)?;
        if !self.exports.iter().any(|e| e == r.name()) {
            self.exports.push(r.name().to_string());
        }
        Ok(r)
    }

    pub fn next_type_in_queue(&mut self) -> Option<TypeId> {
        self.queue.pop_front()
    }

    pub fn constant_string(&mut self, table: &str, key: &str, template: &str) -> ConstRef {
        self.constants.string(table, key, template)
    }

    pub fn constant_expression(&mut self, table: &str, literal: Literal) -> ConstRef {
        self.constants.expression(table, literal)
    }

    pub fn into_parts(self) -> (ConstantTables, Vec<String>) {
        (self.constants, self.exports)
    }
}

// ------------------------------- Tests ------------------------------------ //
