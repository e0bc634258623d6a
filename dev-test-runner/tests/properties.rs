use dev_test_runner::{render, Runner};
use raml_validator_gen::ir::{Module, PathSegment};
use raml_validator_gen::model::document;
use raml_validator_gen::model::{Builtin, GraphBuilder, PropertyNode};
use raml_validator_gen::naming::type_name;
use raml_validator_gen::{compile, compile_to_string, Options};
use serde_json::{json, Value};

fn compile_doc(doc: Value, root: &str) -> (Module, String) {
    let loaded = document::load_str(&doc.to_string()).unwrap();
    let id = loaded.declared[root];
    let module = compile(&loaded.graph, &[id], Options::default()).unwrap();
    let name = module.exports[0].clone();
    (module, name)
}

fn count(module: &Module, root: &str, value: Value) -> usize {
    Runner::new(module).unwrap().validate(root, &value).unwrap().len()
}

#[test]
fn shared_type_compiles_to_one_function() {
    let (module, _) = compile_doc(
        json!({ "types": {
            "Name": { "type": "string", "minLength": 1 },
            "Person": { "properties": { "first": "Name", "last": "Name" } }
        } }),
        "Person",
    );
    assert_eq!(module.validators.keys().filter(|k| *k == "Name").count(), 1);

    let loaded = document::load_str(
        &json!({ "types": {
            "Name": { "type": "string", "minLength": 1 },
            "Person": { "properties": { "first": "Name", "last": "Name" } }
        } })
        .to_string(),
    )
    .unwrap();
    let src = compile_to_string(&loaded.graph, &[loaded.declared["Person"]], Options::default()).unwrap();
    assert_eq!(src.matches("\"Name\": function(value, _path) {").count(), 1);
}

#[test]
fn identical_anonymous_specializations_share_a_name() {
    let mut b = GraphBuilder::new();
    let string = b.builtin(Builtin::String);
    let t1 = b.refine(string, [("minLength", json!(3))]).unwrap();
    let t2 = b.refine(string, [("minLength", json!(3))]).unwrap();
    let g = b.finish().unwrap();
    assert_ne!(t1, t2);
    assert_eq!(type_name(&g, t1).unwrap(), type_name(&g, t2).unwrap());
}

#[test]
fn required_numeric_property() {
    let (module, root) = compile_doc(
        json!({ "types": {
            "TestType": { "type": "object", "properties": { "required": "number" } }
        } }),
        "TestType",
    );
    let runner = Runner::new(&module).unwrap();
    assert!(runner.validate(&root, &json!({ "required": 1 })).unwrap().is_empty());

    let violations = runner.validate(&root, &json!({})).unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].path, vec![PathSegment::Key("required".into())]);
    assert_eq!(render(&violations[0]), "Missing property `required`");

    let violations = runner.validate(&root, &json!({ "required": "1" })).unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].path, vec![PathSegment::Key("required".into())]);
    assert_eq!(violations[0].message, "Expecting a number");
}

#[test]
fn min_items() {
    let (module, root) = compile_doc(
        json!({ "types": { "TestType": { "type": "array", "items": "number", "minItems": 5 } } }),
        "TestType",
    );
    assert_eq!(count(&module, &root, json!([1, 2, 3, 4, 5])), 0);
    assert_eq!(count(&module, &root, json!([1, 2, 3])), 1);
}

#[test]
fn unique_items() {
    let (module, root) = compile_doc(
        json!({ "types": { "TestType": { "type": "array", "items": "number", "uniqueItems": true } } }),
        "TestType",
    );
    assert_eq!(count(&module, &root, json!([1, 2, 3, 4])), 0);
    assert_eq!(count(&module, &root, json!([1, 2, 3, 4, 1])), 1);
}

#[test]
fn union_prefers_the_branch_with_fewer_violations() {
    let (module, root) = compile_doc(
        json!({ "types": {
            "TypeA": { "type": "object", "properties": { "a": "number", "x": "string" } },
            "TypeB": { "type": "object", "properties": { "b": "number", "x": "boolean" } },
            "TestType": { "type": "TypeA | TypeB" }
        } }),
        "TestType",
    );
    let runner = Runner::new(&module).unwrap();
    assert!(runner.validate(&root, &json!({ "a": 1, "x": "s" })).unwrap().is_empty());
    assert!(runner.validate(&root, &json!({ "b": 2, "x": false })).unwrap().is_empty());

    let partial_a = runner.validate(&root, &json!({ "a": 1, "x": 1234 })).unwrap();
    assert_eq!(partial_a.len(), 1);
    assert_eq!(partial_a[0].message, "Expecting a string");

    let partial_b = runner.validate(&root, &json!({ "b": 1, "x": 1234 })).unwrap();
    assert_eq!(partial_b.len(), 1);
    assert_eq!(partial_b[0].message, "Expecting a boolean value");

    assert_eq!(runner.validate(&root, &json!({ "z": 2 })).unwrap().len(), 2);
}

#[test]
fn float_format_keeps_written_precision() {
    let (module, root) = compile_doc(
        json!({ "types": { "TestType": { "type": "number", "format": "float" } } }),
        "TestType",
    );
    assert_eq!(count(&module, &root, json!(1.5)), 0);
    assert_eq!(count(&module, &root, json!(1.0000001234)), 1);
}

#[test]
fn compilation_is_byte_stable_across_sessions() {
    let doc = json!({ "types": {
        "Code": { "type": "string", "pattern": "^[A-Z]{3}$" },
        "Money": { "properties": {
            "currency": "Code",
            "amount": { "type": "number", "minimum": 0, "format": "double" },
            "tags?": { "type": "array", "items": { "type": "string", "maxLength": 8 }, "uniqueItems": true },
            "kind": { "enum": ["cash", "card"] }
        } }
    } });
    let loaded = document::load_str(&doc.to_string()).unwrap();
    let root = [loaded.declared["Money"]];
    let a = compile_to_string(&loaded.graph, &root, Options::default()).unwrap();
    let b = compile_to_string(&loaded.graph, &root, Options::default()).unwrap();
    assert_eq!(a, b);

    let reloaded = document::load_str(&doc.to_string()).unwrap();
    let c = compile_to_string(&reloaded.graph, &[reloaded.declared["Money"]], Options::default()).unwrap();
    assert_eq!(a, c);
}

#[test]
fn recursive_schema_validates_nested_values() {
    let (module, root) = compile_doc(
        json!({ "types": {
            "Node": { "properties": { "value": "integer", "children?": "Node[]" } }
        } }),
        "Node",
    );
    let runner = Runner::new(&module).unwrap();
    let ok = json!({ "value": 1, "children": [{ "value": 2 }, { "value": 3, "children": [] }] });
    assert!(runner.validate(&root, &ok).unwrap().is_empty());

    let bad = json!({ "value": 1, "children": [{ "value": 2 }, { "value": 3.5 }] });
    let violations = runner.validate(&root, &bad).unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(
        violations[0].path,
        vec![PathSegment::Key("children".into()), PathSegment::Index(1), PathSegment::Key("value".into())]
    );
}

#[test]
fn builder_graphs_run_without_documents() {
    let mut b = GraphBuilder::new();
    let number = b.builtin(Builtin::Number);
    let positive = b.refine(number, [("minimum", json!(0))]).unwrap();
    let point = b
        .object("Point", vec![PropertyNode::required("x", positive), PropertyNode::required("y", positive)])
        .unwrap();
    let g = b.finish().unwrap();
    let module = compile(&g, &[point], Options::default()).unwrap();
    let runner = Runner::new(&module).unwrap();

    let violations = runner.validate("Point", &json!({ "x": -1, "y": -2 })).unwrap();
    let rendered: Vec<_> = violations.iter().map(render).collect();
    assert_eq!(
        rendered,
        vec!["Must be bigger than or equal to 0", "Must be bigger than or equal to 0"]
    );
}

#[test]
fn missing_and_unexpected_keys_report_their_paths() {
    let (module, root) = compile_doc(
        json!({ "types": {
            "Inner": { "additionalProperties": false, "properties": {
                "id": "string",
                "/^tag-/": { "type": "string", "required": true }
            } },
            "Outer": { "properties": { "inner": "Inner" } }
        } }),
        "Outer",
    );
    let runner = Runner::new(&module).unwrap();
    let violations = runner.validate(&root, &json!({ "inner": { "other": 1 } })).unwrap();
    let got: Vec<_> = violations.iter().map(|v| (v.path.clone(), render(v))).collect();
    let inner = PathSegment::Key("inner".into());
    assert_eq!(
        got,
        vec![
            (vec![inner.clone(), PathSegment::Key("id".into())], "Missing property `id`".to_string()),
            (vec![inner.clone()], "Missing a property that matches `^tag-`".to_string()),
            (vec![inner], "Unexpected extraneous property `other`".to_string()),
        ]
    );
}
