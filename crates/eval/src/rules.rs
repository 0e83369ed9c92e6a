//! Rule execution shared by response processing and test outcome
//! processing, plus the assignment checks every processing phase applies.
//!
//! Response rules and test outcome rules have the same shape (set, lookup,
//! condition, exit), so both run through [`run_outcome_rules`] against an
//! [`OutcomeStore`]. Template rules have their own targets and live with
//! the session controller.

use qti_core::model::{
    Condition, Expression, LookupTable, OutcomeRule, ResponseRule, VariableDeclaration,
};
use qti_core::{BaseType, Cardinality, Identifier, NodePath, SingleValue, Value};

use crate::context::mismatch;
use crate::error::EvalError;

/// What a rule sequence asks its caller to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// `exitResponse`, `exitTest` or `exitTemplate`: stop the whole phase.
    Exit,
    /// A template constraint failed: start template processing again.
    Retry,
}

/// Condition results: Null counts as false.
pub(crate) fn condition_holds(value: &Value, node: &NodePath) -> Result<bool, EvalError> {
    if value.is_null() {
        return Ok(false);
    }
    value
        .as_bool()
        .ok_or_else(|| mismatch(node, "single boolean", value))
}

/// Fit `value` to `declaration`, widening integers where a float is
/// declared.
pub(crate) fn check_assignment(
    declaration: &VariableDeclaration,
    value: Value,
    node: &NodePath,
) -> Result<Value, EvalError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let value = if declaration.base_type == Some(BaseType::Float) {
        value.widen_to_float()
    } else {
        value
    };
    if value.cardinality() != Some(declaration.cardinality) {
        return Err(EvalError::CardinalityMismatch {
            identifier: declaration.identifier.to_string(),
            expected: declaration.cardinality.to_string(),
            actual: value
                .cardinality()
                .map_or_else(|| "NULL".to_string(), |c| c.to_string()),
        });
    }
    if declaration.cardinality != Cardinality::Record && value.base_type() != declaration.base_type
    {
        let expected = declaration
            .base_type
            .map_or_else(String::new, |bt| bt.to_string());
        return Err(mismatch(node, &expected, &value));
    }
    Ok(value)
}

/// Translate a numeric source through a lookup table into a value of the
/// outcome's type. A Null source yields Null.
pub(crate) fn lookup_target(
    declaration: &VariableDeclaration,
    table: Option<&LookupTable>,
    source: &Value,
    node: &NodePath,
) -> Result<Value, EvalError> {
    let table = table.ok_or_else(|| EvalError::MissingMapping {
        identifier: declaration.identifier.to_string(),
        table: "lookupTable",
    })?;
    if source.is_null() {
        return Ok(Value::Null);
    }
    let source = source
        .as_f64()
        .ok_or_else(|| mismatch(node, "single integer or float", source))?;
    let Some(literal) = table.lookup(source) else {
        return Ok(Value::Null);
    };
    let base_type = declaration
        .base_type
        .ok_or_else(|| qti_core::ModelError::MissingBaseType(declaration.identifier.clone()))?;
    let target = Value::Single(SingleValue::parse(base_type, literal)?);
    check_assignment(declaration, target, node)
}

// ──────────────────────────────────────────────
// Outcome rules
// ──────────────────────────────────────────────

/// Where outcome rules read from and write to.
pub(crate) trait OutcomeStore {
    fn evaluate(&mut self, expression: &Expression, node: &NodePath) -> Result<Value, EvalError>;

    /// Check and store a `setOutcomeValue` result.
    fn assign_outcome(
        &mut self,
        identifier: &Identifier,
        value: Value,
        node: &NodePath,
    ) -> Result<(), EvalError>;

    /// Translate `source` through the outcome's lookup table and store it.
    fn lookup_outcome(
        &mut self,
        identifier: &Identifier,
        source: Value,
        node: &NodePath,
    ) -> Result<(), EvalError>;
}

/// Uniform view of [`ResponseRule`] and [`OutcomeRule`].
pub(crate) enum OutcomeStep<'r, R> {
    Set(&'r Identifier, &'r Expression),
    Lookup(&'r Identifier, &'r Expression),
    Condition(&'r Condition<R>),
    Exit,
}

pub(crate) trait OutcomeRuleKind: Sized {
    fn name(&self) -> &'static str;
    fn step(&self) -> OutcomeStep<'_, Self>;
}

impl OutcomeRuleKind for ResponseRule {
    fn name(&self) -> &'static str {
        ResponseRule::name(self)
    }

    fn step(&self) -> OutcomeStep<'_, Self> {
        match self {
            ResponseRule::SetOutcomeValue {
                identifier,
                expression,
            } => OutcomeStep::Set(identifier, expression),
            ResponseRule::LookupOutcomeValue {
                identifier,
                expression,
            } => OutcomeStep::Lookup(identifier, expression),
            ResponseRule::ResponseCondition(c) => OutcomeStep::Condition(c),
            ResponseRule::ExitResponse => OutcomeStep::Exit,
        }
    }
}

impl OutcomeRuleKind for OutcomeRule {
    fn name(&self) -> &'static str {
        OutcomeRule::name(self)
    }

    fn step(&self) -> OutcomeStep<'_, Self> {
        match self {
            OutcomeRule::SetOutcomeValue {
                identifier,
                expression,
            } => OutcomeStep::Set(identifier, expression),
            OutcomeRule::LookupOutcomeValue {
                identifier,
                expression,
            } => OutcomeStep::Lookup(identifier, expression),
            OutcomeRule::OutcomeCondition(c) => OutcomeStep::Condition(c),
            OutcomeRule::ExitTest => OutcomeStep::Exit,
        }
    }
}

/// Run `rules` in order. Returns [`Flow::Exit`] if an exit rule fired.
pub(crate) fn run_outcome_rules<R: OutcomeRuleKind, S: OutcomeStore>(
    rules: &[R],
    store: &mut S,
    node: &NodePath,
) -> Result<Flow, EvalError> {
    for (index, rule) in rules.iter().enumerate() {
        let rule_node = node.indexed(rule.name(), index);
        match rule.step() {
            OutcomeStep::Set(identifier, expression) => {
                let value = store.evaluate(expression, &rule_node.child(expression.name()))?;
                store.assign_outcome(identifier, value, &rule_node)?;
            }
            OutcomeStep::Lookup(identifier, expression) => {
                let source = store.evaluate(expression, &rule_node.child(expression.name()))?;
                store.lookup_outcome(identifier, source, &rule_node)?;
            }
            OutcomeStep::Condition(condition) => {
                if run_condition(condition, store, &rule_node)? == Flow::Exit {
                    return Ok(Flow::Exit);
                }
            }
            OutcomeStep::Exit => {
                tracing::debug!(node = %rule_node, "exit");
                return Ok(Flow::Exit);
            }
        }
    }
    Ok(Flow::Continue)
}

fn run_condition<R: OutcomeRuleKind, S: OutcomeStore>(
    condition: &Condition<R>,
    store: &mut S,
    node: &NodePath,
) -> Result<Flow, EvalError> {
    for (index, branch) in condition.branches().enumerate() {
        let branch_node = if index == 0 {
            node.child("if")
        } else {
            node.indexed("elseIf", index - 1)
        };
        let test_node = branch_node.child(branch.condition.name());
        let value = store.evaluate(&branch.condition, &test_node)?;
        if condition_holds(&value, &test_node)? {
            return run_outcome_rules(&branch.rules, store, &branch_node);
        }
    }
    match &condition.else_rules {
        Some(rules) => run_outcome_rules(rules, store, &node.child("else")),
        None => Ok(Flow::Continue),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qti_core::model::ValueLiteral;

    fn declaration(cardinality: Cardinality, base_type: BaseType) -> VariableDeclaration {
        VariableDeclaration::new(Identifier::new("X").unwrap(), cardinality, Some(base_type))
    }

    #[test]
    fn null_condition_is_false() {
        let node = NodePath::root("if");
        assert!(!condition_holds(&Value::Null, &node).unwrap());
        assert!(condition_holds(&Value::boolean(true), &node).unwrap());
        assert!(condition_holds(&Value::integer(1), &node).is_err());
    }

    #[test]
    fn integer_widens_into_float_outcome() {
        let decl = declaration(Cardinality::Single, BaseType::Float);
        let node = NodePath::root("setOutcomeValue");
        assert_eq!(
            check_assignment(&decl, Value::integer(2), &node).unwrap(),
            Value::float(2.0)
        );
    }

    #[test]
    fn assignment_rejects_wrong_shape() {
        let decl = declaration(Cardinality::Single, BaseType::Integer);
        let node = NodePath::root("setOutcomeValue");
        assert!(matches!(
            check_assignment(&decl, Value::float(1.5), &node),
            Err(EvalError::BaseTypeMismatch { .. })
        ));
        let many = Value::multiple(BaseType::Integer, vec![SingleValue::Integer(1)]);
        assert!(matches!(
            check_assignment(&decl, many, &node),
            Err(EvalError::CardinalityMismatch { .. })
        ));
        assert_eq!(check_assignment(&decl, Value::Null, &node).unwrap(), Value::Null);
    }

    #[test]
    fn lookup_through_match_table() {
        let decl = declaration(Cardinality::Single, BaseType::Identifier)
            .with_default(vec![ValueLiteral::from("none")]);
        let table = LookupTable::MatchTable {
            default_value: Some("other".into()),
            entries: vec![qti_core::model::mapping::MatchTableEntry {
                source_value: 3,
                target_value: "three".into(),
            }],
        };
        let node = NodePath::root("lookupOutcomeValue");
        let hit = lookup_target(&decl, Some(&table), &Value::integer(3), &node).unwrap();
        assert_eq!(hit.as_identifier().map(|i| i.as_str()), Some("three"));
        let miss = lookup_target(&decl, Some(&table), &Value::integer(4), &node).unwrap();
        assert_eq!(miss.as_identifier().map(|i| i.as_str()), Some("other"));
        assert!(matches!(
            lookup_target(&decl, None, &Value::integer(3), &node),
            Err(EvalError::MissingMapping { .. })
        ));
    }
}
