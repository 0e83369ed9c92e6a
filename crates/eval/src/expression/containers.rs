//! Container construction and inspection.

use qti_core::model::expression::IntegerOrVariable;
use qti_core::value::Container;
use qti_core::{BaseType, Cardinality, Identifier, NodePath, SingleValue, Value};
use rand::Rng;

use crate::context::{mismatch, EvalContext};
use crate::error::EvalError;

/// `multiple` / `ordered`: flatten children into one container. Null
/// children contribute nothing; all others must share one base type.
pub(super) fn collect(args: &[Value], node: &NodePath, ordered: bool) -> Result<Value, EvalError> {
    let (cardinality, label) = if ordered {
        (Cardinality::Ordered, "single or ordered")
    } else {
        (Cardinality::Multiple, "single or multiple")
    };
    let mut base_type: Option<BaseType> = None;
    let mut items = Vec::new();
    for arg in args.iter().filter(|a| !a.is_null()) {
        match arg.cardinality() {
            Some(Cardinality::Single) => {}
            Some(c) if c == cardinality => {}
            _ => return Err(mismatch(node, label, arg)),
        }
        let bt = arg.base_type();
        match base_type {
            None => base_type = bt,
            Some(expected) if bt != Some(expected) => {
                return Err(mismatch(node, &format!("{} {}", label, expected), arg))
            }
            Some(_) => {}
        }
        items.extend(arg.items().iter().cloned());
    }
    Ok(match base_type {
        Some(bt) => Value::from_items(cardinality, bt, items),
        None => Value::Null,
    })
}

pub(super) fn container_size(value: &Value) -> Value {
    let size = i32::try_from(value.len()).unwrap_or(i32::MAX);
    Value::integer(size)
}

/// 1-based element of an ordered container. Out of range yields Null.
pub(super) fn index(
    ctx: &mut EvalContext<'_>,
    value: &Value,
    n: &IntegerOrVariable,
    node: &NodePath,
) -> Result<Value, EvalError> {
    let Some(n) = ctx.integer_attribute(n, node)? else {
        ctx.notifier
            .fire_runtime_warning(node, "index variable is NULL; result is NULL");
        return Ok(Value::Null);
    };
    if value.is_null() {
        return Ok(Value::Null);
    }
    let Value::Ordered(container) = value else {
        return Err(mismatch(node, "ordered", value));
    };
    if n < 1 {
        ctx.notifier
            .fire_runtime_warning(node, format!("index {} must be at least 1", n));
        return Ok(Value::Null);
    }
    let position = usize::try_from(n - 1).unwrap_or(usize::MAX);
    Ok(container
        .items()
        .get(position)
        .cloned()
        .map_or(Value::Null, Value::Single))
}

pub(super) fn field_value(value: &Value, field: &Identifier) -> Value {
    value
        .as_record()
        .and_then(|r| r.get(field.as_str()))
        .cloned()
        .map_or(Value::Null, Value::Single)
}

pub(super) fn random(ctx: &mut EvalContext<'_>, value: &Value) -> Value {
    let items = value.items();
    if items.is_empty() {
        return Value::Null;
    }
    let pick = ctx.rng.gen_range(0..items.len());
    Value::Single(items[pick].clone())
}

pub(super) fn member(item: &Value, container: &Value, node: &NodePath) -> Result<Value, EvalError> {
    if item.is_null() || container.is_null() {
        return Ok(Value::Null);
    }
    let single = single_operand(item, node)?;
    let bag = container_operand(container, node)?;
    same_base_type(single.base_type(), container, node)?;
    Ok(Value::boolean(bag.contains(single)))
}

/// Remove every occurrence of the first operand from the container.
pub(super) fn delete(item: &Value, container: &Value, node: &NodePath) -> Result<Value, EvalError> {
    if item.is_null() || container.is_null() {
        return Ok(Value::Null);
    }
    let single = single_operand(item, node)?;
    let bag = container_operand(container, node)?;
    same_base_type(single.base_type(), container, node)?;
    let kept = bag.iter().filter(|i| *i != single).cloned();
    Ok(match container {
        Value::Ordered(c) => Value::ordered(c.base_type(), kept),
        _ => Value::multiple(bag.base_type(), kept),
    })
}

/// Multiset containment for multiple; contiguous subsequence for ordered.
pub(super) fn contains(
    haystack: &Value,
    needle: &Value,
    node: &NodePath,
) -> Result<Value, EvalError> {
    if haystack.is_null() || needle.is_null() {
        return Ok(Value::Null);
    }
    if haystack.cardinality() != needle.cardinality() {
        return Err(mismatch(
            node,
            &format!("{} container", haystack.cardinality().map_or("", |c| c.as_str())),
            needle,
        ));
    }
    let outer = container_operand(haystack, node)?;
    same_base_type(outer.base_type(), needle, node)?;
    let outer = outer.items();
    let inner = needle.items();
    let found = match haystack {
        Value::Ordered(_) => {
            inner.len() <= outer.len() && outer.windows(inner.len()).any(|w| w == inner)
        }
        _ => {
            let mut used = vec![false; outer.len()];
            inner.iter().all(|x| {
                match outer.iter().enumerate().position(|(i, y)| !used[i] && x == y) {
                    Some(i) => {
                        used[i] = true;
                        true
                    }
                    None => false,
                }
            })
        }
    };
    Ok(Value::boolean(found))
}

/// Ordered concatenation of the children, `number_repeats` times.
pub(super) fn repeat(
    ctx: &mut EvalContext<'_>,
    args: &[Value],
    number_repeats: &IntegerOrVariable,
    node: &NodePath,
) -> Result<Value, EvalError> {
    let Some(times) = ctx.integer_attribute(number_repeats, node)? else {
        ctx.notifier
            .fire_runtime_warning(node, "numberRepeats variable is NULL; result is NULL");
        return Ok(Value::Null);
    };
    if times < 1 {
        return Ok(Value::Null);
    }
    let once = collect(args, node, true)?;
    let Value::Ordered(container) = &once else {
        return Ok(once);
    };
    let base_type = container.base_type();
    let items = container.items();
    let repeated = (0..times).flat_map(|_| items.iter().cloned());
    Ok(Value::ordered(base_type, repeated))
}

fn single_operand<'v>(value: &'v Value, node: &NodePath) -> Result<&'v SingleValue, EvalError> {
    value
        .as_single()
        .ok_or_else(|| mismatch(node, "single", value))
}

fn container_operand<'v>(
    value: &'v Value,
    node: &NodePath,
) -> Result<&'v Container, EvalError> {
    value
        .as_container()
        .ok_or_else(|| mismatch(node, "multiple or ordered", value))
}

fn same_base_type(
    expected: BaseType,
    value: &Value,
    node: &NodePath,
) -> Result<(), EvalError> {
    if value.base_type() == Some(expected) {
        Ok(())
    } else {
        Err(mismatch(node, &format!("base type {}", expected), value))
    }
}
