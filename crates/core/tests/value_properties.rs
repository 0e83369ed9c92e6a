//! Property tests for value equality, lexical forms and the serialized
//! representation.

use proptest::prelude::*;
use qti_core::{BaseType, Cardinality, Identifier, SingleValue, Value};

fn identifier_strategy() -> impl Strategy<Value = Identifier> {
    "[A-Za-z_][A-Za-z0-9_.-]{0,8}".prop_map(|s| Identifier::new(s).unwrap())
}

fn single_strategy() -> impl Strategy<Value = SingleValue> {
    prop_oneof![
        any::<i32>().prop_map(SingleValue::Integer),
        any::<f64>().prop_map(SingleValue::Float),
        any::<bool>().prop_map(SingleValue::Boolean),
        identifier_strategy().prop_map(SingleValue::Identifier),
        (any::<i32>(), any::<i32>()).prop_map(|(x, y)| SingleValue::Point { x, y }),
        any::<String>().prop_map(SingleValue::String),
        (identifier_strategy(), identifier_strategy()).prop_map(|(a, b)| SingleValue::Pair(a, b)),
        (identifier_strategy(), identifier_strategy())
            .prop_map(|(a, b)| SingleValue::DirectedPair(a, b)),
        (0.0f64..1.0e9).prop_map(SingleValue::Duration),
        "[a-z]{1,6}://[a-z0-9./-]{0,20}".prop_map(SingleValue::Uri),
    ]
}

proptest! {
    #[test]
    fn lexical_form_parses_back(value in single_strategy()) {
        let parsed = SingleValue::parse(value.base_type(), &value.to_string()).unwrap();
        prop_assert_eq!(parsed, value);
    }

    #[test]
    fn pair_equality_ignores_order(a in identifier_strategy(), b in identifier_strategy()) {
        prop_assert_eq!(SingleValue::Pair(a.clone(), b.clone()), SingleValue::Pair(b, a));
    }

    #[test]
    fn multiple_equality_ignores_order(items in prop::collection::vec(any::<i32>(), 1..8)) {
        let forward = Value::multiple(BaseType::Integer, items.iter().copied().map(SingleValue::Integer));
        let backward = Value::multiple(BaseType::Integer, items.iter().rev().copied().map(SingleValue::Integer));
        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn ordered_equality_respects_order(a in any::<i32>(), b in any::<i32>()) {
        prop_assume!(a != b);
        let ab = Value::ordered(BaseType::Integer, [SingleValue::Integer(a), SingleValue::Integer(b)]);
        let ba = Value::ordered(BaseType::Integer, [SingleValue::Integer(b), SingleValue::Integer(a)]);
        prop_assert_ne!(ab, ba);
    }

    #[test]
    fn serialized_containers_read_back(items in prop::collection::vec(any::<i32>(), 0..6)) {
        let value = Value::from_items(
            Cardinality::Ordered,
            BaseType::Integer,
            items.iter().copied().map(SingleValue::Integer),
        );
        let json = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(&back, &value);
        prop_assert_eq!(back.is_null(), items.is_empty());
    }
}
