//! Facet validators: one pure generator per facet name.
//!
//! Every generator takes the facet value and the session context and
//! returns the fragments enforcing it. The catalog is closed; a facet
//! with no generator is a fatal compile error.
use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::context::{Context, Literal, ENUMS, HELPERS, REGEX};
use crate::error::CompileError;
use crate::ir::{ConstRef, Params, Stmt, Test};
use crate::model::FacetValue;

use super::fragment::{self, Message, params};

type FacetFn = fn(&FacetValue, &mut Context<'_>) -> Result<Vec<Stmt>, CompileError>;

static CATALOG: Lazy<HashMap<&'static str, FacetFn>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, FacetFn> = HashMap::new();
    m.insert("maximum", maximum);
    m.insert("minimum", minimum);
    m.insert("multipleOf", multiple_of);
    m.insert("format", format);
    m.insert("pattern", pattern);
    m.insert("minLength", min_length);
    m.insert("maxLength", max_length);
    m.insert("minItems", min_items);
    m.insert("maxItems", max_items);
    m.insert("uniqueItems", unique_items);
    m.insert("items", items);
    m.insert("minProperties", min_properties);
    m.insert("maxProperties", max_properties);
    m.insert("enum", enumeration);
    m.insert("additionalProperties", additional_properties);
    m
});

/// Fragments for every facet, in iteration order.
pub fn generate_facet_fragments<'a, I>(facets: I, ctx: &mut Context<'_>) -> Result<Vec<Stmt>, CompileError>
where
    I: IntoIterator<Item = (&'a String, &'a FacetValue)>,
{
    let mut out = Vec::new();
    for (name, value) in facets {
        let generate = CATALOG
            .get(name.as_str())
            .ok_or_else(|| CompileError::UnknownFacet(name.clone()))?;
        out.extend(generate(value, ctx)?);
    }
    Ok(out)
}

// ---- Number ---- //

fn maximum(value: &FacetValue, ctx: &mut Context<'_>) -> Result<Vec<Stmt>, CompileError> {
    let bound = number("maximum", value)?;
    Ok(vec![fragment::test_and_push(ctx, Test::Above(bound), Message::NumberMax, echo(value))])
}

fn minimum(value: &FacetValue, ctx: &mut Context<'_>) -> Result<Vec<Stmt>, CompileError> {
    let bound = number("minimum", value)?;
    Ok(vec![fragment::test_and_push(ctx, Test::Below(bound), Message::NumberMin, echo(value))])
}

fn multiple_of(value: &FacetValue, ctx: &mut Context<'_>) -> Result<Vec<Stmt>, CompileError> {
    let divisor = number("multipleOf", value)?;
    if divisor == 0.0 {
        return Err(invalid("multipleOf", "a non-zero number", value));
    }
    Ok(vec![fragment::test_and_push(
        ctx,
        Test::NotMultipleOf(divisor),
        Message::NumberMultipleOf,
        echo(value),
    )])
}

fn format(value: &FacetValue, ctx: &mut Context<'_>) -> Result<Vec<Stmt>, CompileError> {
    let name = string("format", value)?;
    let within = |min: f64, max: f64| Test::Either(vec![Test::Fractional, Test::OutsideRange { min, max }]);
    let test = match name {
        "int64" => Test::Fractional,
        "int32" | "long" => within(-2147483648.0, 2147483647.0),
        "int16" | "int" => within(-32768.0, 32767.0),
        "int8" => within(-128.0, 127.0),
        "float" => Test::Float32Lossy {
            scratch: ctx.constant_expression(HELPERS, Literal::Float32Scratch),
        },
        "double" => return Ok(vec![]),
        other => return Err(CompileError::UnknownFormat(other.to_string())),
    };
    Ok(vec![fragment::test_and_push(ctx, test, Message::NumberType, echo(value))])
}

// ---- String ---- //

fn pattern(value: &FacetValue, ctx: &mut Context<'_>) -> Result<Vec<Stmt>, CompileError> {
    let source = string("pattern", value)?;
    let regex = register_pattern(source, ctx)?;
    Ok(vec![fragment::test_and_push(
        ctx,
        Test::NoMatch(regex),
        Message::StringPattern,
        params([("pattern", json!(source))]),
    )])
}

/// Compile-check `source` and register it in the `REGEX` table.
pub(crate) fn register_pattern(source: &str, ctx: &mut Context<'_>) -> Result<ConstRef, CompileError> {
    Regex::new(source).map_err(|source_err| CompileError::InvalidPattern {
        pattern: source.to_string(),
        source: source_err,
    })?;
    Ok(ctx.constant_expression(REGEX, Literal::Regex(source.to_string())))
}

fn min_length(value: &FacetValue, ctx: &mut Context<'_>) -> Result<Vec<Stmt>, CompileError> {
    let n = count("minLength", value)?;
    Ok(vec![fragment::test_and_push(ctx, Test::LengthBelow(n), Message::LengthMin, echo(value))])
}

fn max_length(value: &FacetValue, ctx: &mut Context<'_>) -> Result<Vec<Stmt>, CompileError> {
    let n = count("maxLength", value)?;
    Ok(vec![fragment::test_and_push(ctx, Test::LengthAbove(n), Message::LengthMax, echo(value))])
}

// ---- Array ---- //

fn min_items(value: &FacetValue, ctx: &mut Context<'_>) -> Result<Vec<Stmt>, CompileError> {
    let n = count("minItems", value)?;
    Ok(vec![fragment::test_and_push(ctx, Test::LengthBelow(n), Message::ItemsMin, echo(value))])
}

fn max_items(value: &FacetValue, ctx: &mut Context<'_>) -> Result<Vec<Stmt>, CompileError> {
    let n = count("maxItems", value)?;
    Ok(vec![fragment::test_and_push(ctx, Test::LengthAbove(n), Message::ItemsMax, echo(value))])
}

fn unique_items(value: &FacetValue, ctx: &mut Context<'_>) -> Result<Vec<Stmt>, CompileError> {
    if !boolean("uniqueItems", value)? {
        return Ok(vec![]);
    }
    Ok(vec![fragment::test_and_push(ctx, Test::HasDuplicates, Message::ItemsUnique, Params::new())])
}

fn items(value: &FacetValue, ctx: &mut Context<'_>) -> Result<Vec<Stmt>, CompileError> {
    let FacetValue::Type(item) = value else {
        return Err(invalid("items", "a type", value));
    };
    let validator = ctx.use_type(*item)?;
    Ok(vec![Stmt::EachItem { validator }])
}

// ---- Object ---- //

fn min_properties(value: &FacetValue, ctx: &mut Context<'_>) -> Result<Vec<Stmt>, CompileError> {
    let n = count("minProperties", value)?;
    Ok(vec![fragment::test_and_push(ctx, Test::KeyCountBelow(n), Message::PropsMin, echo(value))])
}

fn max_properties(value: &FacetValue, ctx: &mut Context<'_>) -> Result<Vec<Stmt>, CompileError> {
    let n = count("maxProperties", value)?;
    Ok(vec![fragment::test_and_push(ctx, Test::KeyCountAbove(n), Message::PropsMax, echo(value))])
}

/// Enforced structurally by the object composer.
fn additional_properties(value: &FacetValue, _ctx: &mut Context<'_>) -> Result<Vec<Stmt>, CompileError> {
    boolean("additionalProperties", value)?;
    Ok(vec![])
}

// ---- General ---- //

fn enumeration(value: &FacetValue, ctx: &mut Context<'_>) -> Result<Vec<Stmt>, CompileError> {
    let FacetValue::Value(Value::Array(members)) = value else {
        return Err(invalid("enum", "an array", value));
    };
    let case_insensitive = ctx.options().case_insensitive_enums;
    let listing = members.iter().map(js_string).collect::<Vec<_>>().join(", ");
    let members: Vec<Value> = if case_insensitive {
        members.iter().map(|m| Value::String(js_string(m).to_lowercase())).collect()
    } else {
        members.clone()
    };
    let values = ctx.constant_expression(ENUMS, Literal::Values(members));
    Ok(vec![fragment::test_and_push(
        ctx,
        Test::NotOneOf { values, case_insensitive },
        Message::Enum,
        params([("values", Value::String(listing))]),
    )])
}

// ---- Values ---- //

/// `String(value)` as JavaScript renders it.
pub fn js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 0.0 => "0".to_string(),
            Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{f:.0}"),
            _ => n.to_string(),
        },
        Value::Array(items) => items.iter().map(js_string).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn echo(value: &FacetValue) -> Params {
    match value {
        FacetValue::Value(v) => params([("value", v.clone())]),
        FacetValue::Type(_) => Params::new(),
    }
}

fn number(facet: &str, value: &FacetValue) -> Result<f64, CompileError> {
    match value {
        FacetValue::Value(Value::Number(n)) => n.as_f64().ok_or_else(|| invalid(facet, "a number", value)),
        _ => Err(invalid(facet, "a number", value)),
    }
}

fn count(facet: &str, value: &FacetValue) -> Result<u64, CompileError> {
    if let FacetValue::Value(Value::Number(n)) = value {
        if let Some(u) = n.as_u64() {
            return Ok(u);
        }
        if let Some(f) = n.as_f64() {
            if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
                return Ok(f as u64);
            }
        }
    }
    Err(invalid(facet, "a non-negative integer", value))
}

fn string<'v>(facet: &str, value: &'v FacetValue) -> Result<&'v str, CompileError> {
    match value {
        FacetValue::Value(Value::String(s)) => Ok(s),
        _ => Err(invalid(facet, "a string", value)),
    }
}

fn boolean(facet: &str, value: &FacetValue) -> Result<bool, CompileError> {
    match value {
        FacetValue::Value(Value::Bool(b)) => Ok(*b),
        _ => Err(invalid(facet, "a boolean", value)),
    }
}

fn invalid(facet: &str, expected: &'static str, value: &FacetValue) -> CompileError {
    let found = match value {
        FacetValue::Value(v) => v.to_string(),
        FacetValue::Type(t) => format!("type #{}", t.index()),
    };
    CompileError::InvalidFacetValue { facet: facet.to_string(), expected, found }
}

// ------------------------------- Tests ------------------------------------ //
