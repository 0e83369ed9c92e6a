//! Arithmetic operators.
//!
//! Integer operands stay integer where the operator allows it; a float
//! operand promotes the whole operation to float. Overflow, division by zero
//! and non-finite results yield Null with a runtime warning.

use qti_core::model::expression::{IntegerOrVariable, MathFunction, RoundingMode};
use qti_core::{BaseType, NodePath, SingleValue, Value};

use super::logic::{figures_problem, round_figures};
use super::{any_null, integer, number};
use crate::context::{mismatch, EvalContext};
use crate::error::EvalError;

/// Integer operands, or `None` when any operand is a float.
fn integers(args: &[Value], node: &NodePath) -> Result<Option<Vec<i32>>, EvalError> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        match arg.as_single() {
            Some(SingleValue::Integer(i)) => out.push(*i),
            Some(SingleValue::Float(_)) => return Ok(None),
            _ => return Err(mismatch(node, "single integer or float", arg)),
        }
    }
    Ok(Some(out))
}

fn floats(args: &[Value], node: &NodePath) -> Result<Vec<f64>, EvalError> {
    args.iter().map(|a| number(a, node)).collect()
}

fn overflow(ctx: &mut EvalContext<'_>, node: &NodePath, what: &str) -> Value {
    ctx.notifier
        .fire_runtime_warning(node, format!("integer overflow in {}; result is NULL", what));
    Value::Null
}

fn finite(ctx: &mut EvalContext<'_>, node: &NodePath, result: f64) -> Value {
    if result.is_finite() {
        Value::float(result)
    } else {
        ctx.notifier.fire_runtime_warning(
            node,
            format!("result {} is not a finite number; result is NULL", result),
        );
        Value::Null
    }
}

/// Numeric items of single and container operands, with the integer items
/// kept apart while no float has been seen.
fn flattened(args: &[Value], node: &NodePath) -> Result<(Vec<f64>, Option<Vec<i32>>), EvalError> {
    let mut floats = Vec::new();
    let mut ints = Some(Vec::new());
    for arg in args {
        for item in arg.items() {
            match item {
                SingleValue::Integer(i) => {
                    floats.push(f64::from(*i));
                    if let Some(ints) = ints.as_mut() {
                        ints.push(*i);
                    }
                }
                SingleValue::Float(f) => {
                    floats.push(*f);
                    ints = None;
                }
                _ => return Err(mismatch(node, "integer or float", arg)),
            }
        }
        if arg.as_record().is_some() {
            return Err(mismatch(node, "integer or float", arg));
        }
    }
    Ok((floats, ints))
}

pub(super) fn sum(
    ctx: &mut EvalContext<'_>,
    args: &[Value],
    node: &NodePath,
) -> Result<Value, EvalError> {
    if any_null(args) {
        return Ok(Value::Null);
    }
    match flattened(args, node)? {
        (_, Some(ints)) => Ok(ints
            .iter()
            .try_fold(0i32, |acc, i| acc.checked_add(*i))
            .map_or_else(|| overflow(ctx, node, "sum"), Value::integer)),
        (floats, None) => Ok(finite(ctx, node, floats.iter().sum())),
    }
}

pub(super) fn product(
    ctx: &mut EvalContext<'_>,
    args: &[Value],
    node: &NodePath,
) -> Result<Value, EvalError> {
    if any_null(args) {
        return Ok(Value::Null);
    }
    match flattened(args, node)? {
        (_, Some(ints)) => Ok(ints
            .iter()
            .try_fold(1i32, |acc, i| acc.checked_mul(*i))
            .map_or_else(|| overflow(ctx, node, "product"), Value::integer)),
        (floats, None) => Ok(finite(ctx, node, floats.iter().product())),
    }
}

pub(super) fn subtract(
    ctx: &mut EvalContext<'_>,
    a: &Value,
    b: &Value,
    node: &NodePath,
) -> Result<Value, EvalError> {
    let args = [a.clone(), b.clone()];
    if any_null(&args) {
        return Ok(Value::Null);
    }
    match integers(&args, node)? {
        Some(ints) => Ok(ints[0]
            .checked_sub(ints[1])
            .map_or_else(|| overflow(ctx, node, "subtract"), Value::integer)),
        None => Ok(Value::float(number(a, node)? - number(b, node)?)),
    }
}

pub(super) fn divide(
    ctx: &mut EvalContext<'_>,
    a: &Value,
    b: &Value,
    node: &NodePath,
) -> Result<Value, EvalError> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    let (x, y) = (number(a, node)?, number(b, node)?);
    if y == 0.0 {
        ctx.notifier
            .fire_runtime_warning(node, "division by zero; result is NULL");
        return Ok(Value::Null);
    }
    Ok(finite(ctx, node, x / y))
}

pub(super) fn power(
    ctx: &mut EvalContext<'_>,
    a: &Value,
    b: &Value,
    node: &NodePath,
) -> Result<Value, EvalError> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    let (base, exponent) = (number(a, node)?, number(b, node)?);
    Ok(finite(ctx, node, base.powf(exponent)))
}

/// Quotient rounded toward negative infinity.
pub(super) fn integer_divide(
    ctx: &mut EvalContext<'_>,
    a: &Value,
    b: &Value,
    node: &NodePath,
) -> Result<Value, EvalError> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    let (x, y) = (i64::from(integer(a, node)?), i64::from(integer(b, node)?));
    if y == 0 {
        ctx.notifier
            .fire_runtime_warning(node, "division by zero; result is NULL");
        return Ok(Value::Null);
    }
    let mut quotient = x / y;
    if x % y != 0 && (x < 0) != (y < 0) {
        quotient -= 1;
    }
    Ok(i32::try_from(quotient)
        .map_or_else(|_| overflow(ctx, node, "integerDivide"), Value::integer))
}

/// Remainder with the sign of the dividend.
pub(super) fn integer_modulus(
    ctx: &mut EvalContext<'_>,
    a: &Value,
    b: &Value,
    node: &NodePath,
) -> Result<Value, EvalError> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    let (x, y) = (integer(a, node)?, integer(b, node)?);
    if y == 0 {
        ctx.notifier
            .fire_runtime_warning(node, "modulus by zero; result is NULL");
        return Ok(Value::Null);
    }
    Ok(Value::integer(
        i32::try_from(i64::from(x) % i64::from(y)).unwrap_or(0),
    ))
}

fn to_integer(ctx: &mut EvalContext<'_>, node: &NodePath, value: f64) -> Value {
    if !value.is_finite() {
        ctx.notifier.fire_runtime_warning(
            node,
            format!("cannot convert {} to an integer; result is NULL", value),
        );
        return Value::Null;
    }
    if value < f64::from(i32::MIN) || value > f64::from(i32::MAX) {
        return overflow(ctx, node, "conversion");
    }
    Value::integer(value as i32)
}

pub(super) fn truncate(
    ctx: &mut EvalContext<'_>,
    value: &Value,
    node: &NodePath,
) -> Result<Value, EvalError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let x = number(value, node)?;
    Ok(to_integer(ctx, node, x.trunc()))
}

/// Nearest integer, halves rounded up: `round(-6.5) == -6`.
pub(super) fn round(
    ctx: &mut EvalContext<'_>,
    value: &Value,
    node: &NodePath,
) -> Result<Value, EvalError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let x = number(value, node)?;
    Ok(to_integer(ctx, node, (x + 0.5).floor()))
}

pub(super) fn integer_to_float(value: &Value, node: &NodePath) -> Result<Value, EvalError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::float(f64::from(integer(value, node)?)))
}

pub(super) fn round_to(
    ctx: &mut EvalContext<'_>,
    value: &Value,
    mode: RoundingMode,
    figures: &IntegerOrVariable,
    node: &NodePath,
) -> Result<Value, EvalError> {
    let Some(figures) = ctx.integer_attribute(figures, node)? else {
        ctx.notifier
            .fire_runtime_warning(node, "figures variable is NULL; result is NULL");
        return Ok(Value::Null);
    };
    if value.is_null() {
        return Ok(Value::Null);
    }
    let x = number(value, node)?;
    if let Some(problem) = figures_problem(mode, figures) {
        ctx.notifier.fire_runtime_error(node, problem);
        return Ok(Value::Null);
    }
    if !x.is_finite() {
        return Ok(Value::float(x));
    }
    Ok(round_figures(x, mode, figures).map_or(Value::Null, Value::float))
}

/// `min` / `max` over every element of every operand.
pub(super) fn extreme(args: &[Value], node: &NodePath, largest: bool) -> Result<Value, EvalError> {
    if any_null(args) {
        return Ok(Value::Null);
    }
    let mut all_integer = true;
    let mut best: Option<f64> = None;
    let mut best_int: Option<i32> = None;
    for arg in args {
        match arg.base_type() {
            Some(BaseType::Integer) => {}
            Some(BaseType::Float) => all_integer = false,
            _ => return Err(mismatch(node, "integer or float", arg)),
        }
        for item in arg.items() {
            let v = item.as_f64().unwrap_or(f64::NAN);
            let better = match best {
                None => true,
                Some(b) => (largest && v > b) || (!largest && v < b),
            };
            if better {
                best = Some(v);
                best_int = item.as_integer();
            }
        }
    }
    Ok(match (all_integer, best_int, best) {
        (true, Some(i), _) => Value::integer(i),
        (_, _, Some(f)) => Value::float(f),
        _ => Value::Null,
    })
}

pub(super) fn gcd_lcm(
    ctx: &mut EvalContext<'_>,
    args: &[Value],
    node: &NodePath,
    want_gcd: bool,
) -> Result<Value, EvalError> {
    if any_null(args) {
        return Ok(Value::Null);
    }
    let mut operands = Vec::new();
    for arg in args {
        if arg.base_type() != Some(BaseType::Integer) {
            return Err(mismatch(node, "integer", arg));
        }
        operands.extend(arg.items().iter().filter_map(SingleValue::as_integer));
    }
    let mut operands = operands.into_iter().map(|i| i64::from(i).abs());
    let result = if want_gcd {
        Some(operands.fold(0, gcd))
    } else {
        operands.try_fold(1i64, |acc, v| {
            if acc == 0 || v == 0 {
                Some(0)
            } else {
                (acc / gcd(acc, v)).checked_mul(v)
            }
        })
    };
    let name = if want_gcd { "gcd" } else { "lcm" };
    Ok(result
        .and_then(|r| i32::try_from(r).ok())
        .map_or_else(|| overflow(ctx, node, name), Value::integer))
}

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

pub(super) fn math_operator(
    ctx: &mut EvalContext<'_>,
    function: MathFunction,
    args: &[Value],
    node: &NodePath,
) -> Result<Value, EvalError> {
    if any_null(args) {
        return Ok(Value::Null);
    }
    let x = floats(args, node)?;
    use MathFunction::*;
    let result = match function {
        Sin => x[0].sin(),
        Cos => x[0].cos(),
        Tan => x[0].tan(),
        Sec => 1.0 / x[0].cos(),
        Csc => 1.0 / x[0].sin(),
        Cot => 1.0 / x[0].tan(),
        Asin => x[0].asin(),
        Acos => x[0].acos(),
        Atan => x[0].atan(),
        Atan2 => x[0].atan2(x[1]),
        Asec => (1.0 / x[0]).acos(),
        Acsc => (1.0 / x[0]).asin(),
        Acot => {
            if x[0] == 0.0 {
                std::f64::consts::FRAC_PI_2
            } else {
                (1.0 / x[0]).atan()
            }
        }
        Sinh => x[0].sinh(),
        Cosh => x[0].cosh(),
        Tanh => x[0].tanh(),
        Sech => 1.0 / x[0].cosh(),
        Csch => 1.0 / x[0].sinh(),
        Coth => 1.0 / x[0].tanh(),
        Log => x[0].log10(),
        Ln => x[0].ln(),
        Exp => x[0].exp(),
        Abs => x[0].abs(),
        Signum => {
            if x[0] == 0.0 {
                0.0
            } else {
                x[0].signum()
            }
        }
        Floor => return Ok(to_integer(ctx, node, x[0].floor())),
        Ceil => return Ok(to_integer(ctx, node, x[0].ceil())),
        ToDegrees => x[0].to_degrees(),
        ToRadians => x[0].to_radians(),
    };
    Ok(finite(ctx, node, result))
}
