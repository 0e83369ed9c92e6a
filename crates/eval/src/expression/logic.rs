//! Boolean operators and comparisons.
//!
//! Every comparison is three-valued: a Null operand makes the result Null,
//! except where `and` / `or` / `anyN` can decide without it.

use std::str::FromStr;

use qti_core::model::expression::{FloatOrVariable, IntegerOrVariable, RoundingMode, ToleranceMode};
use qti_core::model::Shape;
use qti_core::{BaseType, NodePath, SingleValue, Value};
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use super::{boolean, number, text};
use crate::context::{mismatch, EvalContext};
use crate::error::EvalError;

/// `substring`: whether the first string occurs within the second.
pub(super) fn substring(
    needle: &Value,
    haystack: &Value,
    case_sensitive: bool,
    node: &NodePath,
) -> Result<Value, EvalError> {
    if needle.is_null() || haystack.is_null() {
        return Ok(Value::Null);
    }
    let (needle, haystack) = (text(needle, node)?, text(haystack, node)?);
    Ok(Value::boolean(if case_sensitive {
        haystack.contains(needle)
    } else {
        haystack.to_lowercase().contains(&needle.to_lowercase())
    }))
}

pub(super) fn not(value: &Value, node: &NodePath) -> Result<Value, EvalError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::boolean(!boolean(value, node)?))
}

/// False as soon as any operand is false; otherwise Null if any is Null.
pub(super) fn and(args: &[Value], node: &NodePath) -> Result<Value, EvalError> {
    let (trues, nulls) = tally(args, node)?;
    Ok(if trues + nulls < args.len() {
        Value::boolean(false)
    } else if nulls > 0 {
        Value::Null
    } else {
        Value::boolean(true)
    })
}

/// True as soon as any operand is true; otherwise Null if any is Null.
pub(super) fn or(args: &[Value], node: &NodePath) -> Result<Value, EvalError> {
    let (trues, nulls) = tally(args, node)?;
    Ok(if trues > 0 {
        Value::boolean(true)
    } else if nulls > 0 {
        Value::Null
    } else {
        Value::boolean(false)
    })
}

/// True when between `min` and `max` operands are true. Null operands may
/// count either way, so the result is Null when they could tip it.
pub(super) fn any_n(
    ctx: &mut EvalContext<'_>,
    args: &[Value],
    min: &IntegerOrVariable,
    max: &IntegerOrVariable,
    node: &NodePath,
) -> Result<Value, EvalError> {
    let mut bound = |attribute: &IntegerOrVariable, name: &str| -> Result<i64, EvalError> {
        match ctx.integer_attribute(attribute, node)? {
            Some(v) => Ok(i64::from(v)),
            None => {
                ctx.notifier
                    .fire_runtime_warning(node, format!("{} variable is NULL; using 0", name));
                Ok(0)
            }
        }
    };
    let min = bound(min, "min")?;
    let max = bound(max, "max")?;
    if min > max {
        ctx.notifier.fire_runtime_warning(
            node,
            format!("min {} exceeds max {}; result is false", min, max),
        );
        return Ok(Value::boolean(false));
    }
    let (trues, nulls) = tally(args, node)?;
    let (trues, nulls) = (trues as i64, nulls as i64);
    Ok(if trues >= min && trues + nulls <= max {
        Value::boolean(true)
    } else if trues + nulls < min || trues > max {
        Value::boolean(false)
    } else {
        Value::Null
    })
}

fn tally(args: &[Value], node: &NodePath) -> Result<(usize, usize), EvalError> {
    let mut trues = 0;
    let mut nulls = 0;
    for arg in args {
        if arg.is_null() {
            nulls += 1;
        } else if boolean(arg, node)? {
            trues += 1;
        }
    }
    Ok((trues, nulls))
}

/// `match`: same cardinality and base type, then value equality.
pub(super) fn match_values(a: &Value, b: &Value, node: &NodePath) -> Result<Value, EvalError> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    if a.cardinality() != b.cardinality() || a.base_type() != b.base_type() {
        let expected = match (a.cardinality(), a.base_type()) {
            (Some(c), Some(bt)) => format!("{} {}", c, bt),
            (Some(c), None) => c.to_string(),
            _ => String::from("matching operand"),
        };
        return Err(mismatch(node, &expected, b));
    }
    Ok(Value::boolean(a == b))
}

/// `stringMatch`: equality, or with `substring` set, whether the first
/// string contains the second.
pub(super) fn string_match(
    a: &Value,
    b: &Value,
    case_sensitive: bool,
    substring: bool,
    node: &NodePath,
) -> Result<Value, EvalError> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    let (a, b) = (text(a, node)?, text(b, node)?);
    let (a, b) = if case_sensitive {
        (a.to_string(), b.to_string())
    } else {
        (a.to_lowercase(), b.to_lowercase())
    };
    Ok(Value::boolean(if substring { a.contains(&b) } else { a == b }))
}

/// Whole-string regular expression match.
pub(super) fn pattern_match(
    ctx: &mut EvalContext<'_>,
    value: &Value,
    pattern: &str,
    node: &NodePath,
) -> Result<Value, EvalError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let subject = text(value, node)?;
    match anchored(pattern) {
        Ok(re) => Ok(Value::boolean(re.is_match(subject))),
        Err(err) => {
            ctx.notifier
                .fire_runtime_error(node, format!("invalid pattern '{}': {}", pattern, err));
            Ok(Value::Null)
        }
    }
}

/// Compile `pattern` so that it must match the entire input.
pub(crate) fn anchored(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{})$", pattern))
}

pub(super) fn equal(
    ctx: &mut EvalContext<'_>,
    a: &Value,
    b: &Value,
    mode: ToleranceMode,
    tolerance: &[FloatOrVariable],
    (include_lower, include_upper): (bool, bool),
    node: &NodePath,
) -> Result<Value, EvalError> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    let (x, y) = (number(a, node)?, number(b, node)?);
    if mode == ToleranceMode::Exact {
        return Ok(Value::boolean(x == y));
    }
    let Some(first) = tolerance.first() else {
        let mode = if mode == ToleranceMode::Absolute {
            "absolute"
        } else {
            "relative"
        };
        ctx.notifier
            .fire_runtime_error(node, format!("tolerance is required in {} mode", mode));
        return Ok(Value::Null);
    };
    let t0 = ctx.float_attribute(first, node)?;
    let t1 = match tolerance.get(1) {
        Some(second) => ctx.float_attribute(second, node)?,
        None => t0,
    };
    let (t0, t1) = match (t0, t1) {
        (Some(t0), Some(t1)) if t0 >= 0.0 && t1 >= 0.0 => (t0, t1),
        _ => {
            ctx.notifier.fire_runtime_warning(
                node,
                "tolerance is NULL or negative; result is NULL",
            );
            return Ok(Value::Null);
        }
    };
    let (low, high) = match mode {
        ToleranceMode::Absolute => (x - t0, x + t1),
        _ => (x * (1.0 - t0 / 100.0), x * (1.0 + t1 / 100.0)),
    };
    let above = if include_lower { y >= low } else { y > low };
    let below = if include_upper { y <= high } else { y < high };
    Ok(Value::boolean(above && below))
}

pub(super) fn equal_rounded(
    ctx: &mut EvalContext<'_>,
    a: &Value,
    b: &Value,
    mode: RoundingMode,
    figures: &IntegerOrVariable,
    node: &NodePath,
) -> Result<Value, EvalError> {
    let Some(figures) = ctx.integer_attribute(figures, node)? else {
        ctx.notifier
            .fire_runtime_warning(node, "figures variable is NULL; result is NULL");
        return Ok(Value::Null);
    };
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    let (x, y) = (number(a, node)?, number(b, node)?);
    if let Some(problem) = figures_problem(mode, figures) {
        ctx.notifier.fire_runtime_error(node, problem);
        return Ok(Value::Null);
    }
    match (round_figures(x, mode, figures), round_figures(y, mode, figures)) {
        (Some(x), Some(y)) => Ok(Value::boolean(x == y)),
        _ => Ok(Value::Null),
    }
}

/// Why `figures` is unusable for `mode`, if it is.
pub(crate) fn figures_problem(mode: RoundingMode, figures: i32) -> Option<String> {
    match mode {
        RoundingMode::SignificantFigures if figures < 1 => Some(format!(
            "significant figures must be at least 1, found {}",
            figures
        )),
        RoundingMode::DecimalPlaces if figures < 0 => Some(format!(
            "decimal places must not be negative, found {}",
            figures
        )),
        _ => None,
    }
}

/// Round half away from zero to `figures` significant figures or decimal
/// places, working on the shortest decimal form of `value`. `None` for NaN,
/// infinities and figures the mode cannot use.
pub fn round_figures(value: f64, mode: RoundingMode, figures: i32) -> Option<f64> {
    if !value.is_finite() || figures_problem(mode, figures).is_some() {
        return None;
    }
    let digits = u32::try_from(figures).ok()?;
    let strategy = RoundingStrategy::MidpointAwayFromZero;
    match Decimal::from_str(&value.to_string()) {
        Ok(decimal) => {
            let rounded = match mode {
                RoundingMode::SignificantFigures => {
                    decimal.round_sf_with_strategy(digits, strategy)?
                }
                RoundingMode::DecimalPlaces => decimal.round_dp_with_strategy(digits, strategy),
            };
            rounded.to_f64()
        }
        // Beyond the decimal range: scale in binary instead.
        Err(_) => {
            let scale = match mode {
                RoundingMode::SignificantFigures => {
                    let magnitude = value.abs().log10().floor() as i32;
                    10f64.powi(figures - 1 - magnitude)
                }
                RoundingMode::DecimalPlaces => 10f64.powi(figures),
            };
            let scaled = value * scale;
            if !scaled.is_finite() {
                return Some(value);
            }
            Some(scaled.round() / scale)
        }
    }
}

/// Whether any of the points in `value` lies inside the shape.
pub(super) fn inside(
    value: &Value,
    shape: Shape,
    coords: &[i32],
    node: &NodePath,
) -> Result<Value, EvalError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    if value.base_type() != Some(BaseType::Point) {
        return Err(mismatch(node, "point", value));
    }
    let hit = value.items().iter().any(|p| match p {
        SingleValue::Point { x, y } => shape.is_inside(coords, *x, *y),
        _ => false,
    });
    Ok(Value::boolean(hit))
}

pub(super) fn compare(
    a: &Value,
    b: &Value,
    node: &NodePath,
    op: impl Fn(f64, f64) -> bool,
) -> Result<Value, EvalError> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::boolean(op(number(a, node)?, number(b, node)?)))
}

pub(super) fn compare_durations(
    a: &Value,
    b: &Value,
    node: &NodePath,
    op: impl Fn(f64, f64) -> bool,
) -> Result<Value, EvalError> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    let seconds = |v: &Value| {
        v.as_single()
            .and_then(SingleValue::as_duration)
            .ok_or_else(|| mismatch(node, "single duration", v))
    };
    Ok(Value::boolean(op(seconds(a)?, seconds(b)?)))
}
