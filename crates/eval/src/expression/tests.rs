use std::collections::BTreeMap;

use qti_core::model::ResponseDeclaration;
use qti_core::{BaseType, Expression, Identifier, NodePath, NotificationLevel, Notifier, SingleValue, Value};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;

use super::evaluate_root;
use crate::context::{EvalContext, VariableResolver};
use crate::error::EvalError;

#[derive(Default)]
struct Fixture {
    variables: BTreeMap<Identifier, Value>,
    responses: Vec<ResponseDeclaration>,
}

impl Fixture {
    fn with(mut self, identifier: &str, value: Value) -> Self {
        self.variables.insert(Identifier::new(identifier).unwrap(), value);
        self
    }

    fn with_response(mut self, declaration: serde_json::Value) -> Self {
        self.responses.push(serde_json::from_value(declaration).unwrap());
        self
    }
}

impl VariableResolver for Fixture {
    fn lookup(&self, identifier: &Identifier) -> Result<Value, EvalError> {
        self.variables
            .get(identifier.as_str())
            .cloned()
            .ok_or_else(|| EvalError::UnknownVariable {
                identifier: identifier.to_string(),
            })
    }

    fn template_value(&self, identifier: &Identifier) -> Result<Value, EvalError> {
        self.lookup(identifier)
    }

    fn default_value(&self, _identifier: &Identifier) -> Result<Value, EvalError> {
        Ok(Value::Null)
    }

    fn correct_value(&self, identifier: &Identifier) -> Result<Value, EvalError> {
        let declaration = self.response_declaration(identifier)?;
        Ok(declaration.correct_value()?)
    }

    fn response_declaration(
        &self,
        identifier: &Identifier,
    ) -> Result<&ResponseDeclaration, EvalError> {
        self.responses
            .iter()
            .find(|d| d.variable.identifier == *identifier)
            .ok_or_else(|| EvalError::UnknownVariable {
                identifier: identifier.to_string(),
            })
    }
}

fn run_seeded(
    fixture: &Fixture,
    expr: serde_json::Value,
    seed: u64,
) -> (Result<Value, EvalError>, Notifier) {
    let expr: Expression = serde_json::from_value(expr).unwrap();
    let mut notifier = Notifier::new();
    let mut rng = StdRng::seed_from_u64(seed);
    let result = {
        let mut ctx = EvalContext::new(fixture, &mut notifier, &mut rng);
        evaluate_root(&expr, &mut ctx, &NodePath::root("expression"))
    };
    (result, notifier)
}

fn run(fixture: &Fixture, expr: serde_json::Value) -> (Result<Value, EvalError>, Notifier) {
    run_seeded(fixture, expr, 7)
}

fn eval(expr: serde_json::Value) -> Value {
    run(&Fixture::default(), expr).0.unwrap()
}

fn int(v: i32) -> serde_json::Value {
    json!({"type": "baseValue", "baseType": "integer", "value": v.to_string()})
}

fn float(v: f64) -> serde_json::Value {
    json!({"type": "baseValue", "baseType": "float", "value": v.to_string()})
}

fn boolean(v: bool) -> serde_json::Value {
    json!({"type": "baseValue", "baseType": "boolean", "value": v.to_string()})
}

fn string(v: &str) -> serde_json::Value {
    json!({"type": "baseValue", "baseType": "string", "value": v})
}

fn null() -> serde_json::Value {
    json!({"type": "null"})
}

fn op(kind: &str, children: Vec<serde_json::Value>) -> serde_json::Value {
    json!({"type": kind, "children": children})
}

fn assert_close(value: Value, expected: f64) {
    let actual = value.as_f64().unwrap();
    assert!((actual - expected).abs() < 1e-9, "{actual} != {expected}");
}

fn ints(items: &[i32]) -> Vec<SingleValue> {
    items.iter().map(|i| SingleValue::Integer(*i)).collect()
}

// ──────────────────────────────────────────────
// Arithmetic
// ──────────────────────────────────────────────

#[test]
fn integer_arithmetic_stays_integer() {
    assert_eq!(eval(op("sum", vec![int(2), int(3), int(4)])), Value::integer(9));
    assert_eq!(eval(op("product", vec![int(2), int(3)])), Value::integer(6));
    assert_eq!(eval(op("subtract", vec![int(2), int(5)])), Value::integer(-3));
}

#[test]
fn float_operand_promotes_result() {
    assert_eq!(eval(op("sum", vec![int(1), float(0.5)])), Value::float(1.5));
    assert_eq!(eval(op("divide", vec![int(1), int(4)])), Value::float(0.25));
}

#[test]
fn sum_flattens_containers() {
    let expr = op(
        "sum",
        vec![op("multiple", vec![int(1), int(2)]), int(3)],
    );
    assert_eq!(eval(expr), Value::integer(6));
}

#[test]
fn null_operand_propagates() {
    assert_eq!(eval(op("sum", vec![int(1), null()])), Value::Null);
    assert_eq!(eval(op("lt", vec![null(), int(1)])), Value::Null);
    assert_eq!(eval(op("not", vec![null()])), Value::Null);
}

#[test]
fn division_by_zero_is_null_with_warning() {
    let (result, notifier) = run(&Fixture::default(), op("divide", vec![int(1), int(0)]));
    assert_eq!(result.unwrap(), Value::Null);
    assert_eq!(notifier.count_at_least(NotificationLevel::Warning), 1);
}

#[test]
fn integer_overflow_is_null() {
    let (result, notifier) = run(
        &Fixture::default(),
        op("sum", vec![int(i32::MAX), int(1)]),
    );
    assert_eq!(result.unwrap(), Value::Null);
    assert!(notifier.notifications()[0].message.contains("overflow"));
}

#[test]
fn integer_divide_floors_and_modulus_follows_dividend() {
    assert_eq!(eval(op("integerDivide", vec![int(-7), int(2)])), Value::integer(-4));
    assert_eq!(eval(op("integerDivide", vec![int(7), int(2)])), Value::integer(3));
    assert_eq!(eval(op("integerModulus", vec![int(-7), int(2)])), Value::integer(-1));
}

#[test]
fn round_sends_halves_up() {
    assert_eq!(eval(op("round", vec![float(2.5)])), Value::integer(3));
    assert_eq!(eval(op("round", vec![float(-6.5)])), Value::integer(-6));
    assert_eq!(eval(op("truncate", vec![float(-6.7)])), Value::integer(-6));
}

#[test]
fn round_to_figures_and_places() {
    let sig = json!({
        "type": "roundTo", "roundingMode": "significantFigures", "figures": 3,
        "children": [float(1234.5678)]
    });
    assert_eq!(eval(sig), Value::float(1230.0));
    let places = json!({
        "type": "roundTo", "roundingMode": "decimalPlaces", "figures": 2,
        "children": [float(2.675)]
    });
    assert_close(eval(places), 2.68);
}

#[test]
fn round_to_with_bad_figures_is_a_runtime_error() {
    let expr = json!({
        "type": "roundTo", "roundingMode": "significantFigures", "figures": 0,
        "children": [float(1.5)]
    });
    let (result, notifier) = run(&Fixture::default(), expr);
    assert_eq!(result.unwrap(), Value::Null);
    assert_eq!(notifier.count_at_least(NotificationLevel::Error), 1);
}

#[test]
fn min_max_and_gcd() {
    assert_eq!(eval(op("max", vec![int(3), int(9), int(4)])), Value::integer(9));
    assert_eq!(eval(op("min", vec![int(3), float(2.5)])), Value::float(2.5));
    assert_eq!(eval(op("gcd", vec![int(12), int(18)])), Value::integer(6));
    assert_eq!(eval(op("lcm", vec![int(4), int(6)])), Value::integer(12));
}

// ──────────────────────────────────────────────
// Logic and comparison
// ──────────────────────────────────────────────

#[test]
fn and_or_decide_without_nulls_when_they_can() {
    assert_eq!(eval(op("and", vec![boolean(false), null()])), Value::boolean(false));
    assert_eq!(eval(op("and", vec![boolean(true), null()])), Value::Null);
    assert_eq!(eval(op("or", vec![boolean(true), null()])), Value::boolean(true));
    assert_eq!(eval(op("or", vec![boolean(false), boolean(false)])), Value::boolean(false));
}

#[test]
fn any_n_counts_nulls_both_ways() {
    let any = |children: Vec<serde_json::Value>| {
        json!({"type": "anyN", "min": 1, "max": 2, "children": children})
    };
    assert_eq!(
        eval(any(vec![boolean(true), null(), boolean(false)])),
        Value::boolean(true)
    );
    assert_eq!(
        eval(any(vec![boolean(true), boolean(true), null()])),
        Value::Null
    );
    assert_eq!(
        eval(any(vec![boolean(true), boolean(true), boolean(true)])),
        Value::boolean(false)
    );
}

#[test]
fn equal_with_absolute_tolerance() {
    let equal = |b: f64, upper: bool| {
        json!({
            "type": "equal", "toleranceMode": "absolute", "tolerance": [0.1],
            "includeUpperBound": upper,
            "children": [float(1.0), float(b)]
        })
    };
    assert_eq!(eval(equal(1.05, true)), Value::boolean(true));
    assert_eq!(eval(equal(1.1, true)), Value::boolean(true));
    assert_eq!(eval(equal(1.1, false)), Value::boolean(false));
    assert_eq!(eval(equal(1.2, true)), Value::boolean(false));
}

#[test]
fn equal_without_tolerance_outside_exact_mode() {
    let expr = json!({
        "type": "equal", "toleranceMode": "relative",
        "children": [float(1.0), float(1.0)]
    });
    let (result, notifier) = run(&Fixture::default(), expr);
    assert_eq!(result.unwrap(), Value::Null);
    assert!(notifier.has_errors());
}

#[test]
fn pattern_match_is_anchored() {
    let pattern = |s: &str| {
        json!({"type": "patternMatch", "pattern": "[A-Z]{3}", "children": [string(s)]})
    };
    assert_eq!(eval(pattern("ABC")), Value::boolean(true));
    assert_eq!(eval(pattern("ABCD")), Value::boolean(false));
}

#[test]
fn string_match_case_and_substring() {
    let expr = json!({
        "type": "stringMatch", "caseSensitive": false,
        "children": [string("Paris"), string("PARIS")]
    });
    assert_eq!(eval(expr), Value::boolean(true));
    let expr = json!({
        "type": "stringMatch", "caseSensitive": true, "substring": true,
        "children": [string("Paris, France"), string("France")]
    });
    assert_eq!(eval(expr), Value::boolean(true));
}

#[test]
fn match_compares_multiple_as_multisets() {
    let expr = op(
        "match",
        vec![
            op("multiple", vec![int(1), int(2), int(2)]),
            op("multiple", vec![int(2), int(1), int(2)]),
        ],
    );
    assert_eq!(eval(expr), Value::boolean(true));
}

#[test]
fn match_with_different_base_types_is_fatal() {
    let (result, _) = run(&Fixture::default(), op("match", vec![int(1), string("1")]));
    assert!(matches!(result, Err(EvalError::BaseTypeMismatch { .. })));
}

// ──────────────────────────────────────────────
// Containers
// ──────────────────────────────────────────────

#[test]
fn multiple_flattens_and_skips_nulls() {
    let expr = op(
        "multiple",
        vec![int(1), null(), op("multiple", vec![int(2), int(3)])],
    );
    assert_eq!(eval(expr), Value::multiple(BaseType::Integer, ints(&[1, 2, 3])));
    assert_eq!(eval(op("multiple", vec![null()])), Value::Null);
}

#[test]
fn container_size_of_null_is_zero() {
    assert_eq!(eval(op("containerSize", vec![null()])), Value::integer(0));
}

#[test]
fn ordered_index_and_contains() {
    let list = op("ordered", vec![int(5), int(6), int(7)]);
    let index = json!({"type": "index", "n": 2, "children": [list.clone()]});
    assert_eq!(eval(index), Value::integer(6));
    let beyond = json!({"type": "index", "n": 9, "children": [list.clone()]});
    assert_eq!(eval(beyond), Value::Null);

    let run_of = op("ordered", vec![int(6), int(7)]);
    assert_eq!(eval(op("contains", vec![list.clone(), run_of])), Value::boolean(true));
    let gap = op("ordered", vec![int(5), int(7)]);
    assert_eq!(eval(op("contains", vec![list, gap])), Value::boolean(false));
}

#[test]
fn delete_removes_every_occurrence() {
    let expr = op(
        "delete",
        vec![int(2), op("multiple", vec![int(1), int(2), int(2), int(3)])],
    );
    assert_eq!(eval(expr), Value::multiple(BaseType::Integer, ints(&[1, 3])));
}

#[test]
fn repeat_concatenates() {
    let expr = json!({"type": "repeat", "numberRepeats": 2, "children": [int(1), int(2)]});
    assert_eq!(eval(expr), Value::ordered(BaseType::Integer, ints(&[1, 2, 1, 2])));
}

// ──────────────────────────────────────────────
// Variables, mappings and randomness
// ──────────────────────────────────────────────

#[test]
fn variable_reads_resolver() {
    let fixture = Fixture::default().with("X", Value::integer(4));
    let expr = op("product", vec![json!({"type": "variable", "identifier": "X"}), int(2)]);
    assert_eq!(run(&fixture, expr).0.unwrap(), Value::integer(8));
}

#[test]
fn unknown_variable_is_fatal() {
    let (result, _) = run(
        &Fixture::default(),
        json!({"type": "variable", "identifier": "MISSING"}),
    );
    assert!(matches!(result, Err(EvalError::UnknownVariable { .. })));
}

#[test]
fn template_variable_as_attribute() {
    let fixture = Fixture::default().with("N", Value::integer(3));
    let expr = json!({
        "type": "roundTo", "roundingMode": "decimalPlaces", "figures": "N",
        "children": [float(1.23456)]
    });
    assert_close(run(&fixture, expr).0.unwrap(), 1.235);
}

#[test]
fn map_response_sums_distinct_keys() {
    let response = json!({
        "identifier": "RESPONSE",
        "cardinality": "multiple",
        "baseType": "identifier",
        "mapping": {
            "defaultValue": -1.0,
            "mapEntries": [
                {"mapKey": "B", "mappedValue": 1.0},
                {"mapKey": "C", "mappedValue": 0.5}
            ]
        }
    });
    let id = |s: &str| SingleValue::Identifier(Identifier::new(s).unwrap());
    let fixture = Fixture::default()
        .with_response(response)
        .with("RESPONSE", Value::multiple(BaseType::Identifier, [id("C"), id("B"), id("B")]));
    let expr = json!({"type": "mapResponse", "identifier": "RESPONSE"});
    assert_eq!(run(&fixture, expr).0.unwrap(), Value::float(1.5));
}

#[test]
fn correct_reads_declared_response() {
    let fixture = Fixture::default().with_response(json!({
        "identifier": "RESPONSE",
        "cardinality": "single",
        "baseType": "integer",
        "correctResponse": ["42"]
    }));
    let expr = json!({"type": "correct", "identifier": "RESPONSE"});
    assert_eq!(run(&fixture, expr).0.unwrap(), Value::integer(42));
}

#[test]
fn random_integer_follows_step_and_seed() {
    let expr = json!({"type": "randomInteger", "min": 2, "max": 12, "step": 5});
    for seed in 0..20 {
        let value = run_seeded(&Fixture::default(), expr.clone(), seed).0.unwrap();
        let picked = value.as_integer().unwrap();
        assert!([2, 7, 12].contains(&picked), "{picked}");
    }
    let first = run_seeded(&Fixture::default(), expr.clone(), 99).0.unwrap();
    let second = run_seeded(&Fixture::default(), expr, 99).0.unwrap();
    assert_eq!(first, second);
}

#[test]
fn random_integer_with_equal_bounds_is_constant() {
    for seed in 0..50 {
        let expr = json!({"type": "randomInteger", "min": 7, "max": 7, "seed": seed});
        let (value, notifier) = run_seeded(&Fixture::default(), expr, seed);
        assert_eq!(value.unwrap(), Value::integer(7));
        assert!(notifier.notifications().is_empty());
    }
}

#[test]
fn random_integer_seed_attribute_ignores_session_rng() {
    let expr = json!({"type": "randomInteger", "min": 0, "max": 1000, "seed": 5});
    let a = run_seeded(&Fixture::default(), expr.clone(), 1).0.unwrap();
    let b = run_seeded(&Fixture::default(), expr, 2).0.unwrap();
    assert_eq!(a, b);
}

#[test]
fn random_float_stays_in_range() {
    let expr = json!({"type": "randomFloat", "min": 1.0, "max": 2.0});
    let value = eval(expr).as_f64().unwrap();
    assert!((1.0..2.0).contains(&value));
}

// ──────────────────────────────────────────────
// Structure
// ──────────────────────────────────────────────

#[test]
fn wrong_child_count_is_a_structure_error() {
    let (result, _) = run(&Fixture::default(), op("not", vec![boolean(true), boolean(false)]));
    match result {
        Err(EvalError::Structure { node, message }) => {
            assert_eq!(node.to_string(), "expression");
            assert!(message.contains("found 2"), "{message}");
        }
        other => panic!("expected structure error, got {other:?}"),
    }
}

#[test]
fn item_subset_outside_test_is_rejected() {
    let (result, _) = run(&Fixture::default(), json!({"type": "numberCorrect"}));
    assert!(matches!(result, Err(EvalError::NotAllowedHere { .. })));
}
