use guardgen::validator::{BOOLEAN, Literal, NULL, NUMBER, STRING, UNDEFINED};
use guardgen::{SerializeOptions, TopLevel, UniqueId, Validator, optimize, serialize};
use proptest::prelude::*;
use serde_json::{Value, json};

fn literal() -> impl Strategy<Value = Literal> {
    prop_oneof![
        Just(Literal::Undefined),
        Just(Literal::Null),
        any::<bool>().prop_map(Literal::Bool),
        (0..3i32).prop_map(|n| Literal::number(f64::from(n))),
        prop_oneof![Just("a"), Just("b")].prop_map(|s| Literal::string(s)),
    ]
}

fn validator_tree() -> impl Strategy<Value = Validator> {
    let leaf = prop_oneof![
        Just(STRING),
        Just(NUMBER),
        Just(BOOLEAN),
        Just(UNDEFINED),
        Just(NULL),
        prop::collection::vec(literal(), 0..4).prop_map(|values| Validator::exact(values)),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(|members| Validator::or(members)),
            inner.clone().prop_map(|v| Validator::optional(v)),
            (inner.clone(), inner).prop_map(|(a, b)| Validator::object([("a", a), ("b", b)])),
        ]
    })
}

fn input() -> impl Strategy<Value = Option<Value>> {
    let scalar = prop_oneof![
        Just(json!(null)),
        any::<bool>().prop_map(Value::Bool),
        (0..3i32).prop_map(|n| json!(n)),
        prop_oneof![Just("a"), Just("b"), Just("c")].prop_map(|s| json!(s)),
        Just(json!([])),
    ];
    let value = scalar.prop_recursive(2, 8, 2, |inner| {
        (proptest::option::of(inner.clone()), proptest::option::of(inner)).prop_map(|(a, b)| {
            let mut map = serde_json::Map::new();
            if let Some(a) = a {
                map.insert("a".to_string(), a);
            }
            if let Some(b) = b {
                map.insert("b".to_string(), b);
            }
            Value::Object(map)
        })
    });
    proptest::option::of(value)
}

fn text(v: &Validator) -> String {
    let entries = [TopLevel { id: UniqueId::from("prop:T"), validator: v.clone() }];
    serialize(&entries, &SerializeOptions::default()).unwrap()
}

proptest! {
    #[test]
    fn optimize_preserves_acceptance(v in validator_tree(), inputs in prop::collection::vec(input(), 1..16)) {
        let optimized = optimize(&v);
        for input in &inputs {
            prop_assert_eq!(v.accepts(input.as_ref()), optimized.accepts(input.as_ref()), "input {:?}", input);
        }
    }

    #[test]
    fn optimize_is_idempotent(v in validator_tree()) {
        let once = optimize(&v);
        let twice = optimize(&once);
        prop_assert_eq!(text(&once), text(&twice));
    }
}
