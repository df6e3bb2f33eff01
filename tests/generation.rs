use guardgen::{DeclarationSet, Error, SerializeOptions, ValidationGenerator, Validator};
use serde_json::{Value, json};

fn decls(doc: Value) -> DeclarationSet {
    DeclarationSet::from_json("test.json", &doc.to_string()).unwrap()
}

fn forest_decls() -> DeclarationSet {
    decls(json!({
        "module": "forest.ts",
        "declarations": [
            { "name": "Tree", "tags": ["validate"], "type": { "kind": "object", "properties": [
                { "name": "value", "type": { "kind": "number" } },
                { "name": "forest", "type": { "kind": "ref", "name": "Forest" } } ] } },
            { "name": "Forest", "tags": ["validate"], "type": { "kind": "union", "members": [
                { "kind": "undefined" },
                { "kind": "object", "properties": [
                    { "name": "head", "type": { "kind": "ref", "name": "Tree" } },
                    { "name": "tail", "type": { "kind": "ref", "name": "Forest" } } ] } ] } }
        ]
    }))
}

fn one(set: &DeclarationSet, name: &str) -> Validator {
    let mut generator = ValidationGenerator::new(set);
    generator.generate([name]).unwrap().swap_remove(name).unwrap()
}

#[test]
fn object_with_a_number_property() {
    let set = decls(json!({ "module": "m.ts", "declarations": [
        { "name": "HasNumber", "type": { "kind": "object", "properties": [
            { "name": "aNumber", "type": { "kind": "number" } } ] } } ] }));
    let v = one(&set, "HasNumber");
    assert!(v.check(&json!({"aNumber": 1})).is_ok());
    assert!(v.check(&json!({"aNumber": "x"})).is_err());
    assert!(v.check(&json!({})).is_err());
    assert!(v.check(&json!(null)).is_err());
}

#[test]
fn self_referential_optional_chain() {
    // Chain = undefined | { a: 1, b: Chain }
    let set = decls(json!({ "module": "chain.ts", "declarations": [
        { "name": "Chain", "type": { "kind": "union", "members": [
            { "kind": "undefined" },
            { "kind": "object", "properties": [
                { "name": "a", "type": { "kind": "literal", "value": 1 } },
                { "name": "b", "type": { "kind": "ref", "name": "Chain" } } ] } ] } } ] }));
    let v = one(&set, "Chain");
    assert!(v.check(&json!({"a": 1})).is_ok());
    assert!(v.check(&json!({"a": 1, "b": {"a": 1}})).is_ok());
    assert!(v.validate(None).is_ok());

    let Err(Error::Validation(failure)) = v.check(&json!({"a": 1, "b": {}})) else {
        panic!("inner level without `a` must fail");
    };
    assert_eq!(failure.location(), "$|1.b|1.a");
}

/// `{ value, forest: { head: <inner> } }` nested `depth` times around `innermost`.
fn nested_trees(innermost: Value, depth: usize) -> Value {
    let mut doc = innermost;
    for level in 1..depth {
        doc = json!({"value": level, "forest": {"head": doc}});
    }
    doc
}

#[test]
fn mutually_recursive_types_accept_deep_nesting() {
    let set = forest_decls();
    let tree = one(&set, "Tree");

    assert!(tree.check(&nested_trees(json!({"value": 0}), 100)).is_ok());
    let broken = nested_trees(json!({"forest": {}}), 50);
    assert!(tree.check(&broken).is_err(), "innermost tree lacks `value`");
}

#[test]
fn very_deep_nesting_is_bounded_only_by_the_stack() {
    // validation recurses once per nesting level; give it room for thousands
    let worker = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| {
            let set = forest_decls();
            let tree = one(&set, "Tree");
            let ok = tree.check(&nested_trees(json!({"value": 0}), 2_000)).is_ok();
            let rejected = tree.check(&nested_trees(json!({"forest": {}}), 2_000)).is_err();
            (ok, rejected)
        })
        .unwrap();
    assert_eq!(worker.join().unwrap(), (true, true));
}

#[test]
fn generate_returns_the_same_instances_get_validator_does() {
    let set = forest_decls();
    let mut generator = ValidationGenerator::new(&set);
    let built = generator.generate(["Tree", "Forest"]).unwrap();
    assert!(built["Tree"].same(&generator.get_validator("Tree").unwrap()));
    assert!(built["Forest"].same(&generator.get_validator("Forest").unwrap()));
}

#[test]
fn cyclic_types_serialize_through_placeholders() {
    let set = forest_decls();
    let mut generator = ValidationGenerator::new(&set);
    generator.generate(set.discover(&Default::default())).unwrap();

    let plain = generator.serialize(&SerializeOptions::default()).unwrap();
    assert_eq!(
        plain,
        "import * as v from \"@guardgen/runtime\";\n\
         \n\
         export const Tree = v.stub();\n\
         export const Forest = v.stub();\n\
         \n\
         v.bind(Tree, v.object({ value: v.number, forest: Forest }));\n\
         v.bind(Forest, v.or([v.undefined, v.object({ head: Tree, tail: Forest })]));\n"
    );

    let options = SerializeOptions { optimize: true, ..Default::default() };
    let optimized = generator.serialize(&options).unwrap();
    assert!(optimized.ends_with("v.bind(Forest, v.optional(v.object({ head: Tree, tail: Forest })));\n"));
}

#[test]
fn references_outside_the_requested_set_cannot_be_serialized() {
    let set = forest_decls();
    let mut generator = ValidationGenerator::new(&set);
    generator.generate(["Tree"]).unwrap();
    let err = generator.serialize(&SerializeOptions::default()).unwrap_err();
    let Error::MissingReferenceAtSerialize { id } = &err else {
        panic!("expected a missing reference, got {err}");
    };
    assert_eq!(id.as_str(), "forest.ts:Forest");
}

#[test]
fn optional_properties_build_plain_unions_and_optimize_to_optional() {
    let set = decls(json!({ "module": "user.ts", "declarations": [
        { "name": "User", "type": { "kind": "object", "properties": [
            { "name": "name", "type": { "kind": "string" } },
            { "name": "admin", "optional": true, "type": { "kind": "union", "members": [
                { "kind": "literal", "value": true }, { "kind": "literal", "value": false } ] } },
            { "name": "role", "type": { "kind": "union", "members": [
                { "kind": "literal", "value": "owner" }, { "kind": "literal", "value": "guest" },
                { "kind": "null" } ] } } ] } } ] }));
    let mut generator = ValidationGenerator::new(&set);
    generator.generate(["User"]).unwrap();

    let plain = generator.serialize(&SerializeOptions::default()).unwrap();
    assert!(plain.contains(
        "admin: v.or([v.undefined, v.or([v.exact([true]), v.exact([false])])])"
    ));

    let options = SerializeOptions { optimize: true, ..Default::default() };
    let optimized = generator.serialize(&options).unwrap();
    assert!(optimized.contains(
        "export const User = v.object({ name: v.string, admin: v.optional(v.boolean), \
         role: v.or([v.null, v.exact([\"guest\", \"owner\"])]) });"
    ));

    let user = generator.get_validator("User").unwrap();
    assert!(user.check(&json!({"name": "a", "role": null})).is_ok());
    assert!(user.check(&json!({"name": "a", "admin": true, "role": "owner"})).is_ok());
    assert!(user.check(&json!({"name": "a", "admin": 1, "role": "owner"})).is_err());
    assert!(user.check(&json!({"name": "a", "role": "root"})).is_err());
}

#[test]
fn unsupported_kinds_abort_generation() {
    let set = decls(json!({ "module": "m.ts", "declarations": [
        { "name": "Tags", "type": { "kind": "object", "properties": [
            { "name": "list", "type": { "kind": "array" } } ] } } ] }));
    let mut generator = ValidationGenerator::new(&set);
    assert!(matches!(generator.generate(["Tags"]), Err(Error::UnresolvableType { .. })));
}

#[test]
fn ambiguous_references_abort_generation() {
    let mut set = decls(json!({ "module": "a.ts", "declarations": [
        { "name": "Id", "type": { "kind": "string" } } ] }));
    set.add_json("b.json", &json!({ "module": "b.ts", "declarations": [
        { "name": "Id", "type": { "kind": "number" } } ] }).to_string()).unwrap();
    set.add_json("c.json", &json!({ "module": "c.ts", "declarations": [
        { "name": "Holder", "type": { "kind": "object", "properties": [
            { "name": "id", "type": { "kind": "ref", "name": "Id" } } ] } } ] }).to_string()).unwrap();
    let mut generator = ValidationGenerator::new(&set);
    let err = generator.generate(["Holder"]).unwrap_err();
    assert!(err.to_string().contains("declared more than once (a.ts, b.ts)"), "{err}");
}

#[test]
fn discovered_same_named_types_clash_only_at_serialization() {
    let mut set = decls(json!({ "module": "a.ts", "declarations": [
        { "name": "User", "tags": ["validate"], "type": { "kind": "string" } } ] }));
    set.add_json("b.json", &json!({ "module": "b.ts", "declarations": [
        { "name": "User", "tags": ["validate"], "type": { "kind": "number" } } ] }).to_string()).unwrap();

    let mut generator = ValidationGenerator::new(&set);
    let built = generator.generate(set.discover(&Default::default())).unwrap();
    assert!(built["a.ts:User"].check(&json!("x")).is_ok());
    assert!(built["b.ts:User"].check(&json!(1)).is_ok());

    let err = generator.serialize(&SerializeOptions::default()).unwrap_err();
    let Error::DuplicateVariableName { name, first, second } = &err else {
        panic!("expected a name clash, got {err}");
    };
    assert_eq!(name, "User");
    assert_eq!(first.as_str(), "a.ts:User");
    assert_eq!(second.as_str(), "b.ts:User");
}
