//! Test harness: runs an assembled `Module` the way the emitted JavaScript
//! would, and loads data-driven fixtures.
//!
//! Semantics follow the rendered code: lengths are UTF-16 code units,
//! `enum` membership is strict equality, element identity for
//! `uniqueItems` is the JSON serialization, and `format: float` compares
//! against a 32-bit round trip.
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use raml_validator_gen::context::Literal;
use raml_validator_gen::generators::facets::js_string;
use raml_validator_gen::ir::{ConstRef, Module, Params, PathSegment, Slot, Stmt, Test, Violation};
use raml_validator_gen::model::document::{self, GraphDocument};
use raml_validator_gen::{compile, CompileError, Options, SchemaError};

// ---- Errors ---- //

#[derive(Debug, Error)]
pub enum RunError {
    #[error("no validator named `{0}`")]
    UnknownValidator(String),

    #[error("dangling constant reference {table}[{slot}]")]
    DanglingConstant { table: String, slot: String },

    #[error("regex table entry does not compile: {0}")]
    Regex(#[from] regex::Error),
}

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}: at JSON path {path} → {message}")]
    Parse { file: PathBuf, path: String, message: String },

    #[error("unknown root type `{0}`")]
    UnknownRoot(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Run(#[from] RunError),
}

// ---- Runner ---- //

pub struct Runner<'m> {
    module: &'m Module,
    regexes: HashMap<(String, usize), Regex>,
}

impl<'m> Runner<'m> {
    pub fn new(module: &'m Module) -> Result<Self, RunError> {
        let mut regexes = HashMap::new();
        for (table, literals) in module.constants.expression_tables() {
            for (index, literal) in literals.into_iter().enumerate() {
                if let Literal::Regex(source) = literal {
                    regexes.insert((table.to_string(), index), Regex::new(source)?);
                }
            }
        }
        Ok(Self { module, regexes })
    }

    /// Run the validator `name` against `value` at the root path.
    pub fn validate(&self, name: &str, value: &Value) -> Result<Vec<Violation>, RunError> {
        self.run(name, value, &[])
    }

    fn run(&self, name: &str, value: &Value, path: &[PathSegment]) -> Result<Vec<Violation>, RunError> {
        let validator = self
            .module
            .validator(name)
            .ok_or_else(|| RunError::UnknownValidator(name.to_string()))?;
        let mut errors = Vec::new();
        self.block(&validator.body, value, path, &mut errors)?;
        Ok(errors)
    }

    fn block(
        &self,
        body: &[Stmt],
        value: &Value,
        path: &[PathSegment],
        errors: &mut Vec<Violation>,
    ) -> Result<(), RunError> {
        for stmt in body {
            self.stmt(stmt, value, path, errors)?;
        }
        Ok(())
    }

    fn stmt(
        &self,
        stmt: &Stmt,
        value: &Value,
        path: &[PathSegment],
        errors: &mut Vec<Violation>,
    ) -> Result<(), RunError> {
        match stmt {
            Stmt::Check { test, message, params } => {
                if self.test(test, value)? {
                    errors.push(self.violation(path, message, params.clone())?);
                }
            }
            Stmt::Guard { test, message, body } => {
                if self.test(test, value)? {
                    errors.push(self.violation(path, message, Params::new())?);
                } else {
                    self.block(body, value, path, errors)?;
                }
            }
            Stmt::EachItem { validator } => {
                if let Value::Array(items) = value {
                    for (i, item) in items.iter().enumerate() {
                        let sub = extend(path, PathSegment::Index(i));
                        errors.extend(self.run(validator.name(), item, &sub)?);
                    }
                }
            }
            Stmt::Property { key, validator, missing } => {
                let sub = extend(path, PathSegment::Key(key.clone()));
                match value.get(key).filter(|v| !v.is_null()) {
                    Some(v) => errors.extend(self.run(validator.name(), v, &sub)?),
                    None => {
                        if let Some(message) = missing {
                            errors.push(self.violation(&sub, message, name_param(key))?);
                        }
                    }
                }
            }
            Stmt::PatternProperty { pattern, source, validator, missing } => {
                let regex = self.regex(pattern)?;
                let matched: Vec<(&String, &Value)> = match value {
                    Value::Object(map) => map.iter().filter(|(k, _)| regex.is_match(k)).collect(),
                    _ => Vec::new(),
                };
                if matched.is_empty() {
                    if let Some(message) = missing {
                        errors.push(self.violation(path, message, name_param(source))?);
                    }
                }
                for (k, v) in matched {
                    let sub = extend(path, PathSegment::Key(k.clone()));
                    errors.extend(self.run(validator.name(), v, &sub)?);
                }
            }
            Stmt::RejectAdditional { keys, patterns, message } => {
                let patterns = patterns.iter().map(|p| self.regex(p)).collect::<Result<Vec<_>, _>>()?;
                if let Value::Object(map) = value {
                    for k in map.keys() {
                        let covered = keys.contains(k) || patterns.iter().any(|r| r.is_match(k));
                        if !covered {
                            errors.push(self.violation(path, message, name_param(k))?);
                        }
                    }
                }
            }
            Stmt::Union { left, right } => {
                let l = self.run(left.name(), value, path)?;
                if l.is_empty() {
                    return Ok(());
                }
                let r = self.run(right.name(), value, path)?;
                if r.is_empty() {
                    return Ok(());
                }
                errors.extend(if r.len() < l.len() { r } else { l });
            }
        }
        Ok(())
    }

    fn test(&self, test: &Test, value: &Value) -> Result<bool, RunError> {
        let n = value.as_f64();
        Ok(match test {
            Test::NotNull => !value.is_null(),
            Test::NotNumber => !value.is_number(),
            Test::NotInteger => n.is_none_or(|f| f % 1.0 != 0.0),
            Test::NotBoolean => !value.is_boolean(),
            Test::NotString => !value.is_string(),
            Test::NotDateTime => !value.as_str().is_some_and(parses_as_date),
            Test::NotObject => !value.is_object(),
            Test::NotArray => !value.is_array(),
            Test::Above(bound) => n.is_some_and(|f| f > *bound),
            Test::Below(bound) => n.is_some_and(|f| f < *bound),
            Test::NotMultipleOf(divisor) => n.is_some_and(|f| f % divisor != 0.0),
            Test::Fractional => n.is_some_and(|f| f % 1.0 != 0.0),
            Test::OutsideRange { min, max } => n.is_some_and(|f| f < *min || f > *max),
            Test::Float32Lossy { .. } => n.is_some_and(|f| float32_lossy(f, value)),
            Test::LengthBelow(bound) => length(value).is_some_and(|l| l < *bound),
            Test::LengthAbove(bound) => length(value).is_some_and(|l| l > *bound),
            Test::KeyCountBelow(bound) => value.as_object().is_some_and(|m| (m.len() as u64) < *bound),
            Test::KeyCountAbove(bound) => value.as_object().is_some_and(|m| (m.len() as u64) > *bound),
            Test::NoMatch(regex) => !self.regex(regex)?.is_match(&js_string(value)),
            Test::NotOneOf { values, case_insensitive } => {
                let members = self.values(values)?;
                if *case_insensitive {
                    let candidate = js_string(value).to_lowercase();
                    !members.iter().any(|m| m.as_str() == Some(candidate.as_str()))
                } else {
                    !members.iter().any(|m| strict_equals(m, value))
                }
            }
            Test::HasDuplicates => match value {
                Value::Array(items) => {
                    let mut seen = HashSet::new();
                    items.iter().any(|item| !seen.insert(item.to_string()))
                }
                _ => false,
            },
            Test::Either(tests) => {
                for t in tests {
                    if self.test(t, value)? {
                        return Ok(true);
                    }
                }
                false
            }
        })
    }

    fn violation(&self, path: &[PathSegment], message: &ConstRef, params: Params) -> Result<Violation, RunError> {
        let template = self
            .module
            .constants
            .resolve_string(message)
            .ok_or_else(|| dangling(message))?;
        Ok(Violation { path: path.to_vec(), message: template.to_string(), params })
    }

    fn regex(&self, r: &ConstRef) -> Result<&Regex, RunError> {
        match &r.slot {
            Slot::Index(i) => self.regexes.get(&(r.table.clone(), *i)).ok_or_else(|| dangling(r)),
            Slot::Key(_) => Err(dangling(r)),
        }
    }

    fn values(&self, r: &ConstRef) -> Result<&[Value], RunError> {
        match self.module.constants.resolve_expression(r) {
            Some(Literal::Values(values)) => Ok(values),
            _ => Err(dangling(r)),
        }
    }
}

/// The message with `{placeholders}` substituted from the params.
pub fn render(violation: &Violation) -> String {
    let mut out = violation.message.clone();
    for (k, v) in &violation.params {
        out = out.replace(&format!("{{{k}}}"), &js_string(v));
    }
    out
}

fn extend(path: &[PathSegment], segment: PathSegment) -> Vec<PathSegment> {
    let mut out = path.to_vec();
    out.push(segment);
    out
}

fn name_param(name: &str) -> Params {
    let mut params = Params::new();
    params.insert("name".to_string(), Value::String(name.to_string()));
    params
}

fn dangling(r: &ConstRef) -> RunError {
    let slot = match &r.slot {
        Slot::Key(k) => k.clone(),
        Slot::Index(i) => i.to_string(),
    };
    RunError::DanglingConstant { table: r.table.clone(), slot }
}

/// String length in UTF-16 code units, or array length.
fn length(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => Some(s.encode_utf16().count() as u64),
        Value::Array(items) => Some(items.len() as u64),
        _ => None,
    }
}

/// `===` for JSON values: structured values are never equal.
fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::String(x), Value::String(y)) => x == y,
        _ => false,
    }
}

/// Digits written after the decimal point must survive a 32-bit round trip.
fn float32_lossy(f: f64, value: &Value) -> bool {
    let rounded = f as f32 as f64;
    let text = format!("{}.", js_string(value));
    let decimals = text.split('.').nth(1).map_or(0, str::len) as i32;
    !((f - rounded).abs() < 10f64.powi(-decimals - 1))
}

/// RFC 3339, RFC 2822, and ISO date or date-time without offset.
///
/// Narrower than `new Date(value)` in JavaScript, which also takes engine
/// specific forms such as a bare year (`"2016"`). Fixtures only rely on
/// the forms listed here.
fn parses_as_date(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || DateTime::parse_from_rfc2822(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

// ---- Fixtures ---- //

/// A graph document, the root to compile and the expected outcomes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    #[serde(default)]
    pub description: Option<String>,
    pub document: GraphDocument,
    pub root: String,
    #[serde(default)]
    pub options: Options,
    pub cases: Vec<Case>,
}

#[derive(Debug, Deserialize)]
pub struct Case {
    pub name: String,
    pub value: Value,
    /// Expected number of violations.
    pub errors: usize,
    /// Expected violation paths, in order, when given.
    #[serde(default)]
    pub paths: Option<Vec<Vec<PathSegment>>>,
    /// Expected rendered messages, in order, when given.
    #[serde(default)]
    pub messages: Option<Vec<String>>,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let source = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let de = &mut serde_json::Deserializer::from_str(&source);
        serde_path_to_error::deserialize(de).map_err(|err| FixtureError::Parse {
            file: path.to_path_buf(),
            path: err.path().to_string(),
            message: err.into_inner().to_string(),
        })
    }

    /// Compile the fixture's root; returns the module and the root's name.
    pub fn compile(&self) -> Result<(Module, String), FixtureError> {
        let loaded = document::load(&self.document)?;
        let root = *loaded
            .declared
            .get(&self.root)
            .ok_or_else(|| FixtureError::UnknownRoot(self.root.clone()))?;
        let module = compile(&loaded.graph, &[root], self.options.clone())?;
        let name = module
            .exports
            .first()
            .cloned()
            .ok_or_else(|| FixtureError::UnknownRoot(self.root.clone()))?;
        Ok((module, name))
    }

    /// Run every case; returns one line per mismatch.
    pub fn check(&self) -> Result<Vec<String>, FixtureError> {
        let (module, root) = self.compile()?;
        let runner = Runner::new(&module)?;
        let mut failures = Vec::new();
        for case in &self.cases {
            let violations = runner.validate(&root, &case.value)?;
            if violations.len() != case.errors {
                failures.push(format!(
                    "{}: expected {} violation(s), got {}: {:?}",
                    case.name,
                    case.errors,
                    violations.len(),
                    violations.iter().map(render).collect::<Vec<_>>()
                ));
                continue;
            }
            if let Some(paths) = &case.paths {
                let got: Vec<_> = violations.iter().map(|v| v.path.clone()).collect();
                if &got != paths {
                    failures.push(format!("{}: expected paths {paths:?}, got {got:?}", case.name));
                }
            }
            if let Some(messages) = &case.messages {
                let got: Vec<_> = violations.iter().map(render).collect();
                if &got != messages {
                    failures.push(format!("{}: expected messages {messages:?}, got {got:?}", case.name));
                }
            }
        }
        Ok(failures)
    }
}

/// Fixtures matching `pattern`, sorted by path.
pub fn discover(pattern: &str) -> Result<Vec<PathBuf>, glob::PatternError> {
    let mut paths: Vec<PathBuf> = glob::glob(pattern)?.filter_map(Result::ok).collect();
    paths.sort();
    Ok(paths)
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn float32_round_trip_respects_written_precision() {
        assert!(!float32_lossy(1.5, &json!(1.5)));
        assert!(!float32_lossy(3.0, &json!(3)));
        assert!(!float32_lossy(0.1, &json!(0.1)));
        assert!(float32_lossy(1.0000001234, &json!(1.0000001234)));
    }

    #[test]
    fn lengths_count_utf16_units() {
        assert_eq!(length(&json!("abc")), Some(3));
        assert_eq!(length(&json!("😀")), Some(2));
        assert_eq!(length(&json!([1, 2])), Some(2));
        assert_eq!(length(&json!(5)), None);
    }

    #[test]
    fn strict_equality_ignores_structured_values() {
        assert!(strict_equals(&json!(1), &json!(1.0)));
        assert!(!strict_equals(&json!("1"), &json!(1)));
        assert!(!strict_equals(&json!([1]), &json!([1])));
    }

    #[test]
    fn date_strings() {
        assert!(parses_as_date("2016-01-01T12:00:00Z"));
        assert!(parses_as_date("2016-01-01"));
        assert!(parses_as_date("Sun, 28 Feb 2016 16:41:41 +0000"));
        assert!(!parses_as_date("yesterday"));
        assert!(!parses_as_date("2016"));
    }

    #[test]
    fn render_substitutes_params() {
        let v = Violation {
            path: vec![],
            message: "Missing property `{name}`".into(),
            params: name_param("required"),
        };
        assert_eq!(render(&v), "Missing property `required`");
    }
}
