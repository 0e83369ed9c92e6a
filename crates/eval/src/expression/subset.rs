//! Item subset expressions: aggregates over a test's item states.
//!
//! Items are filtered by [`ItemSubset`]. Values that are missing, Null or
//! not single are skipped silently.

use qti_core::model::expression::ItemSubset;
use qti_core::{BaseType, ExpressionKind, Identifier, NodePath, SingleValue, Value};

use crate::context::EvalContext;
use crate::error::EvalError;
use crate::test_outcome::TestItemState;

const CONTEXT: &str = "outcomeProcessing";

fn items<'c>(
    ctx: &EvalContext<'c>,
    node: &NodePath,
    element: &'static str,
) -> Result<&'c [TestItemState], EvalError> {
    ctx.resolver
        .test_items()
        .ok_or_else(|| EvalError::NotAllowedHere {
            node: node.clone(),
            element,
            context: CONTEXT,
        })
}

fn selected<'s>(
    items: &'s [TestItemState],
    subset: &'s ItemSubset,
) -> impl Iterator<Item = &'s TestItemState> {
    items
        .iter()
        .filter(|item| subset.accepts(&item.sections, &item.categories))
}

pub(super) fn test_variables(
    ctx: &mut EvalContext<'_>,
    node: &NodePath,
    variable: &Identifier,
    weight: Option<&Identifier>,
    base_type: Option<BaseType>,
    subset: &ItemSubset,
) -> Result<Value, EvalError> {
    let states = items(ctx, node, "testVariables")?;
    let numeric = base_type.map_or(true, BaseType::is_numeric);
    // weights only apply when the result may be float
    let weighted = base_type.map_or(true, |bt| bt == BaseType::Float);

    let mut values = Vec::new();
    let mut widen = false;
    for item in selected(states, subset) {
        let Some(value) = item.variable(variable.as_str()).and_then(Value::as_single) else {
            continue;
        };
        if let Some(wanted) = base_type {
            if value.base_type() != wanted {
                continue;
            }
        }
        if !numeric {
            values.push(value.clone());
            continue;
        }
        let Some(number) = value.as_f64() else {
            continue;
        };
        match weight.filter(|_| weighted).and_then(|w| item.weights.get(w)) {
            Some(w) => {
                widen = true;
                values.push(SingleValue::Float(number * w));
            }
            None => {
                widen |= matches!(value, SingleValue::Float(_));
                values.push(value.clone());
            }
        }
    }

    if !numeric {
        return Ok(base_type.map_or(Value::Null, |bt| Value::multiple(bt, values)));
    }
    if widen {
        let floats = values.into_iter().map(SingleValue::widen_to_float);
        Ok(Value::multiple(BaseType::Float, floats))
    } else {
        Ok(Value::multiple(BaseType::Integer, values))
    }
}

pub(super) fn count_items(
    ctx: &mut EvalContext<'_>,
    node: &NodePath,
    kind: &ExpressionKind,
    subset: &ItemSubset,
) -> Result<Value, EvalError> {
    let states = items(ctx, node, kind.name())?;
    let predicate: fn(&TestItemState) -> bool = match kind {
        ExpressionKind::NumberCorrect { .. } => |i| i.correct == Some(true),
        ExpressionKind::NumberIncorrect { .. } => |i| i.responded && i.correct != Some(true),
        ExpressionKind::NumberPresented { .. } => |i| i.presented,
        ExpressionKind::NumberResponded { .. } => |i| i.responded,
        ExpressionKind::NumberSelected { .. } => |i| i.selected,
        other => {
            return Err(EvalError::structure(
                node,
                format!("{} is not an item count", other.name()),
            ))
        }
    };
    let count = selected(states, subset).filter(|i| predicate(i)).count();
    Ok(Value::integer(i32::try_from(count).unwrap_or(i32::MAX)))
}

/// Declared normal maximum (or minimum) of an outcome across the selected
/// items. Null when any item declaring the outcome has no such bound.
pub(super) fn outcome_bound(
    ctx: &mut EvalContext<'_>,
    node: &NodePath,
    outcome: &Identifier,
    weight: Option<&Identifier>,
    subset: &ItemSubset,
    maximum: bool,
) -> Result<Value, EvalError> {
    let element = if maximum {
        "outcomeMaximum"
    } else {
        "outcomeMinimum"
    };
    let states = items(ctx, node, element)?;
    let mut bounds = Vec::new();
    for item in selected(states, subset) {
        if !item.outcomes.contains_key(outcome) {
            continue;
        }
        let table = if maximum {
            &item.normal_maximums
        } else {
            &item.normal_minimums
        };
        let Some(bound) = table.get(outcome) else {
            return Ok(Value::Null);
        };
        let w = weight.and_then(|w| item.weights.get(w)).copied().unwrap_or(1.0);
        bounds.push(SingleValue::Float(bound * w));
    }
    Ok(Value::multiple(BaseType::Float, bounds))
}
