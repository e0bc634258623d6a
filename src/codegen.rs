//! Renders an assembled `Module` as one CommonJS text unit.
//!
//! Layout, in order: the `RAMLError` constructor, one declaration per
//! constant table, then the `Validators` object keyed by compiled name.
//! Generated validators have the signature `function(value, _path)` and
//! return an array of `RAMLError`; template substitution is left to the
//! consumer.
use serde_json::Value;

use crate::context::{ConstantTables, Literal};
use crate::ir::{CompiledValidator, ConstRef, Module, Params, Slot, Stmt, Test, ValidatorRef};

const INDENT: &str = "  ";

const RAML_ERROR: &[&str] = &[
    "function RAMLError(path, message, params) {",
    "  this.path = path;",
    "  this.message = message;",
    "  this.params = params || {};",
    "}",
];

pub struct Codegen {
    out: String,
    depth: usize,
}

impl Default for Codegen {
    fn default() -> Self { Self::new() }
}

impl Codegen {
    pub fn new() -> Self {
        Self { out: String::new(), depth: 0 }
    }

    pub fn emit(&mut self, module: &Module) {
        self.line("module.exports = (function() {");
        self.depth += 1;
        for l in RAML_ERROR {
            self.line(l);
        }
        self.blank();
        self.emit_tables(&module.constants);
        self.line("var Validators = {");
        self.depth += 1;
        for validator in module.validators.values() {
            self.blank();
            self.emit_validator(validator);
        }
        self.depth -= 1;
        self.line("};");
        self.blank();
        self.line("return Validators;");
        self.depth -= 1;
        self.line("})();");
    }

    pub fn into_string(self) -> String {
        self.out
    }

    // ---- Layout ---- //

    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn open(&mut self, text: &str) {
        self.line(text);
        self.depth += 1;
    }

    fn close(&mut self, text: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
    }

    // ---- Tables ---- //

    fn emit_tables(&mut self, constants: &ConstantTables) {
        for (table, entries) in constants.string_tables() {
            self.open(&format!("var {table} = {{"));
            for (key, template) in entries {
                self.line(&format!("{}: {},", quote(key), quote(template)));
            }
            self.close("};");
            self.blank();
        }
        for (table, literals) in constants.expression_tables() {
            self.open(&format!("var {table} = ["));
            for literal in literals {
                self.line(&format!("{},", literal_expr(literal)));
            }
            self.close("];");
            self.blank();
        }
    }

    // ---- Validators ---- //

    fn emit_validator(&mut self, validator: &CompiledValidator) {
        if let Some(comment) = &validator.comment {
            self.line("/**");
            for l in comment.lines() {
                let l = l.replace("*/", "* /");
                if l.is_empty() {
                    self.line(" *");
                } else {
                    self.line(&format!(" * {l}"));
                }
            }
            self.line(" */");
        }
        self.open(&format!("{}: function(value, _path) {{", quote(&validator.name)));
        self.line("var path = _path || [];");
        self.line("var errors = [];");
        self.emit_block(&validator.body);
        self.line("return errors;");
        self.close("},");
    }

    fn emit_block(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.emit_stmt(stmt);
        }
    }

    fn emit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Check { test, message, params } => {
                self.open(&format!("if ({}) {{", test_expr(test)));
                self.line(&push_error("path", message, Some(params_expr(params))));
                self.close("}");
            }
            Stmt::Guard { test, message, body } => {
                self.open(&format!("if ({}) {{", test_expr(test)));
                self.line(&push_error("path", message, None));
                if body.is_empty() {
                    self.close("}");
                } else {
                    self.close("} else {");
                    self.depth += 1;
                    self.emit_block(body);
                    self.close("}");
                }
            }
            Stmt::EachItem { validator } => {
                self.open("for (var i = 0; i < value.length; ++i) {");
                self.line(&concat_errors(validator, "value[i]", "path.concat([i])"));
                self.close("}");
            }
            Stmt::Property { key, validator, missing } => {
                let access = format!("value[{}]", quote(key));
                let sub_path = format!("path.concat([{}])", quote(key));
                match missing {
                    Some(message) => {
                        self.open(&format!("if ({access} == null) {{"));
                        let params = format!("{{name: {}}}", quote(key));
                        self.line(&push_error(&sub_path, message, Some(params)));
                        self.close("} else {");
                        self.depth += 1;
                    }
                    None => self.open(&format!("if ({access} != null) {{")),
                }
                self.line(&concat_errors(validator, &access, &sub_path));
                self.close("}");
            }
            Stmt::PatternProperty { pattern, source, validator, missing } => {
                self.open("(function() {");
                self.open("var keys = Object.keys(value).filter(function(key) {");
                self.line(&format!("return {}.test(key);", const_expr(pattern)));
                self.close("});");
                if let Some(message) = missing {
                    self.open("if (keys.length === 0) {");
                    let params = format!("{{name: {}}}", quote(source));
                    self.line(&push_error("path", message, Some(params)));
                    self.close("}");
                }
                self.open("keys.forEach(function(key) {");
                self.line(&concat_errors(validator, "value[key]", "path.concat([key])"));
                self.close("});");
                self.close("})();");
            }
            Stmt::RejectAdditional { keys, patterns, message } => {
                let known = Value::Array(keys.iter().cloned().map(Value::String).collect());
                let mut covered = vec![format!("{known}.indexOf(key) !== -1")];
                covered.extend(patterns.iter().map(|p| format!("{}.test(key)", const_expr(p))));
                self.open("Object.keys(value).forEach(function(key) {");
                self.open(&format!("if (!({})) {{", covered.join(" || ")));
                self.line(&push_error("path", message, Some("{name: key}".to_string())));
                self.close("}");
                self.close("});");
            }
            Stmt::Union { left, right } => {
                self.open("(function() {");
                self.line(&format!("var left = {}(value, path);", call(left)));
                self.line("if (left.length === 0) return;");
                self.line(&format!("var right = {}(value, path);", call(right)));
                self.line("if (right.length === 0) return;");
                self.line("errors = errors.concat(right.length < left.length ? right : left);");
                self.close("})();");
            }
        }
    }
}

// ---- Expressions ---- //

fn test_expr(test: &Test) -> String {
    match test {
        Test::NotNull => "value !== null".to_string(),
        Test::NotNumber => "typeof value !== \"number\" || isNaN(value)".to_string(),
        Test::NotInteger => "typeof value !== \"number\" || isNaN(value) || value % 1 !== 0".to_string(),
        Test::NotBoolean => "typeof value !== \"boolean\"".to_string(),
        Test::NotString => "typeof value !== \"string\"".to_string(),
        Test::NotDateTime => "typeof value !== \"string\" || isNaN(new Date(value).getTime())".to_string(),
        Test::NotObject => "typeof value !== \"object\" || value === null || Array.isArray(value)".to_string(),
        Test::NotArray => "!Array.isArray(value)".to_string(),
        Test::Above(n) => format!("value > {}", number(*n)),
        Test::Below(n) => format!("value < {}", number(*n)),
        Test::NotMultipleOf(n) => format!("value % {} !== 0", number(*n)),
        Test::Fractional => "value % 1 !== 0".to_string(),
        Test::OutsideRange { min, max } => format!("value < {} || value > {}", number(*min), number(*max)),
        Test::Float32Lossy { scratch } => {
            let slot = format!("{}[0]", const_expr(scratch));
            format!(
                "!(Math.abs(({slot} = value) - {slot}) < Math.pow(10, -(value + \".\").split(\".\")[1].length - 1))"
            )
        }
        Test::LengthBelow(n) => format!("value.length < {n}"),
        Test::LengthAbove(n) => format!("value.length > {n}"),
        Test::KeyCountBelow(n) => format!("Object.keys(value).length < {n}"),
        Test::KeyCountAbove(n) => format!("Object.keys(value).length > {n}"),
        Test::NoMatch(regex) => format!("!{}.test(value)", const_expr(regex)),
        Test::NotOneOf { values, case_insensitive: true } => {
            format!("{}.indexOf(String(value).toLowerCase()) === -1", const_expr(values))
        }
        Test::NotOneOf { values, case_insensitive: false } => {
            format!("{}.indexOf(value) === -1", const_expr(values))
        }
        Test::HasDuplicates => concat!(
            "(function() { var seen = Object.create(null); ",
            "for (var i = 0; i < value.length; ++i) { var key = JSON.stringify(value[i]); ",
            "if (key in seen) return true; seen[key] = true; } return false; })()"
        )
        .to_string(),
        Test::Either(tests) => tests
            .iter()
            .map(|t| format!("({})", test_expr(t)))
            .collect::<Vec<_>>()
            .join(" || "),
    }
}

fn literal_expr(literal: &Literal) -> String {
    match literal {
        Literal::Regex(source) => format!("new RegExp({})", quote(source)),
        Literal::Values(values) => Value::Array(values.clone()).to_string(),
        Literal::Float32Scratch => "new Float32Array(1)".to_string(),
    }
}

fn const_expr(r: &ConstRef) -> String {
    match &r.slot {
        Slot::Key(key) => format!("{}[{}]", r.table, quote(key)),
        Slot::Index(i) => format!("{}[{i}]", r.table),
    }
}

fn params_expr(params: &Params) -> String {
    Value::Object(params.iter().map(|(k, v)| (k.clone(), v.clone())).collect()).to_string()
}

fn push_error(path: &str, message: &ConstRef, params: Option<String>) -> String {
    match params {
        Some(p) => format!("errors.push(new RAMLError({path}, {}, {p}));", const_expr(message)),
        None => format!("errors.push(new RAMLError({path}, {}));", const_expr(message)),
    }
}

fn call(validator: &ValidatorRef) -> String {
    format!("Validators[{}]", quote(validator.name()))
}

fn concat_errors(validator: &ValidatorRef, value: &str, path: &str) -> String {
    format!("errors = errors.concat({}({value}, {path}));", call(validator))
}

fn quote(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// JavaScript numeric literal.
fn number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::compile;
    use crate::context::Options;
    use crate::model::{Builtin, GraphBuilder, PropertyNode};
    use serde_json::json;

    fn render(module: &Module) -> String {
        let mut cg = Codegen::new();
        cg.emit(module);
        cg.into_string()
    }

    #[test]
    fn output_is_ordered_error_tables_validators() {
        let mut b = GraphBuilder::new();
        let number = b.builtin(Builtin::Number);
        let string = b.builtin(Builtin::String);
        let code = b.refine(string, [("pattern", json!("^[a-z]+$"))]).unwrap();
        let obj = b
            .object("Thing", vec![PropertyNode::required("required", number), PropertyNode::optional("code", code)])
            .unwrap();
        let g = b.finish().unwrap();

        let src = render(&compile(&g, &[obj], Options::default()).unwrap());
        let error_at = src.find("function RAMLError").unwrap();
        let messages_at = src.find("var ERROR_MESSAGES = {").unwrap();
        let regex_at = src.find("var REGEX = [").unwrap();
        let validators_at = src.find("var Validators = {").unwrap();
        assert!(error_at < messages_at && messages_at < regex_at && regex_at < validators_at);
        assert!(src.starts_with("module.exports = (function() {"));
        assert!(src.trim_end().ends_with("})();"));
        assert!(src.contains("\"Thing\": function(value, _path) {"));
        assert!(src.contains("new RegExp(\"^[a-z]+$\")"));
        assert!(src.contains("if (value[\"required\"] == null) {"));
        assert!(src.contains(
            "errors.push(new RAMLError(path.concat([\"required\"]), ERROR_MESSAGES[\"PROP_MISSING\"], {name: \"required\"}));"
        ));
        assert!(src.contains("errors = errors.concat(Validators[\"number\"](value[\"required\"], path.concat([\"required\"])));"));
    }

    #[test]
    fn float_format_renders_the_precision_check() {
        assert_eq!(
            test_expr(&Test::Float32Lossy {
                scratch: ConstRef { table: "HELPERS".into(), slot: Slot::Index(0) }
            }),
            "!(Math.abs((HELPERS[0][0] = value) - HELPERS[0][0]) < Math.pow(10, -(value + \".\").split(\".\")[1].length - 1))"
        );
    }

    #[test]
    fn numbers_render_as_javascript_literals() {
        assert_eq!(number(10.0), "10");
        assert_eq!(number(-2147483648.0), "-2147483648");
        assert_eq!(number(0.5), "0.5");
    }

    #[test]
    fn comments_cannot_close_early() {
        let validator = CompiledValidator {
            name: "X".into(),
            comment: Some("a */ b\n\nsecond".into()),
            body: vec![],
        };
        let mut cg = Codegen::new();
        cg.emit_validator(&validator);
        let src = cg.into_string();
        assert!(src.contains(" * a * / b\n"));
        assert!(src.contains(" *\n"));
    }
}
