//! Recursive expression interpreter.
//!
//! Children are evaluated first, in document order; the node's own kind then
//! combines their values. Every node is logged at `trace` with its depth and
//! result; root expressions are logged at `debug`.
//!
//! Data problems (Null operands, division by zero, overflow) yield Null,
//! usually with a runtime warning. Type problems that static validation
//! would have caught are fatal [`EvalError`]s.

mod containers;
mod general;
mod logic;
mod numeric;
mod subset;

use qti_core::model::{Expression, ExpressionKind};
use qti_core::{NodePath, SingleValue, Value};

use crate::context::{mismatch, EvalContext};
use crate::error::EvalError;
use crate::signature::arity;

pub use logic::round_figures;
pub(crate) use logic::{anchored, figures_problem};

/// Evaluate `expr`, located at `node`, at the given tree depth.
pub fn evaluate(
    expr: &Expression,
    ctx: &mut EvalContext<'_>,
    node: &NodePath,
    depth: usize,
) -> Result<Value, EvalError> {
    let expected = arity(&expr.kind);
    if !expected.accepts(expr.children.len()) {
        return Err(EvalError::structure(
            node,
            format!(
                "{} takes {} children, found {}",
                expr.name(),
                expected,
                expr.children.len()
            ),
        ));
    }

    let mut args = Vec::with_capacity(expr.children.len());
    for (index, child) in expr.children.iter().enumerate() {
        let child_node = node.indexed(child.name(), index);
        args.push(evaluate(child, ctx, &child_node, depth + 1)?);
    }

    let value = dispatch(&expr.kind, &args, ctx, node)?;

    if depth == 0 {
        tracing::debug!(node = %node, result = %value, "evaluated {}", expr.name());
    } else {
        tracing::trace!(
            "{:indent$}{} -> {}",
            "",
            expr.name(),
            value,
            indent = depth * 2
        );
    }
    Ok(value)
}

/// Evaluate a root expression located at `node`.
pub fn evaluate_root(
    expr: &Expression,
    ctx: &mut EvalContext<'_>,
    node: &NodePath,
) -> Result<Value, EvalError> {
    evaluate(expr, ctx, node, 0)
}

fn dispatch(
    kind: &ExpressionKind,
    args: &[Value],
    ctx: &mut EvalContext<'_>,
    node: &NodePath,
) -> Result<Value, EvalError> {
    use ExpressionKind as K;
    match kind {
        K::BaseValue { base_type, value } => general::base_value(*base_type, value),
        K::Variable {
            identifier,
            weight_identifier,
        } => general::variable(ctx, identifier, weight_identifier.as_ref()),
        K::Default { identifier } => ctx.resolver.default_value(identifier),
        K::Correct { identifier } => ctx.resolver.correct_value(identifier),
        K::MapResponse { identifier } => general::map_response(ctx, identifier, node),
        K::MapResponsePoint { identifier } => general::map_response_point(ctx, identifier, node),
        K::Null => Ok(Value::Null),
        K::RandomInteger {
            min,
            max,
            step,
            seed,
        } => general::random_integer(ctx, *min, *max, *step, *seed, node),
        K::RandomFloat { min, max, seed } => general::random_float(ctx, *min, *max, *seed, node),
        K::MathConstant { name } => Ok(general::math_constant(*name)),

        K::TestVariables {
            variable_identifier,
            weight_identifier,
            base_type,
            subset,
        } => subset::test_variables(
            ctx,
            node,
            variable_identifier,
            weight_identifier.as_ref(),
            *base_type,
            subset,
        ),
        K::NumberCorrect { subset } => subset::count_items(ctx, node, kind, subset),
        K::NumberIncorrect { subset } => subset::count_items(ctx, node, kind, subset),
        K::NumberPresented { subset } => subset::count_items(ctx, node, kind, subset),
        K::NumberResponded { subset } => subset::count_items(ctx, node, kind, subset),
        K::NumberSelected { subset } => subset::count_items(ctx, node, kind, subset),
        K::OutcomeMaximum {
            outcome_identifier,
            weight_identifier,
            subset,
        } => subset::outcome_bound(
            ctx,
            node,
            outcome_identifier,
            weight_identifier.as_ref(),
            subset,
            true,
        ),
        K::OutcomeMinimum {
            outcome_identifier,
            weight_identifier,
            subset,
        } => subset::outcome_bound(
            ctx,
            node,
            outcome_identifier,
            weight_identifier.as_ref(),
            subset,
            false,
        ),

        K::Multiple => containers::collect(args, node, false),
        K::Ordered => containers::collect(args, node, true),
        K::ContainerSize => Ok(containers::container_size(&args[0])),
        K::IsNull => Ok(Value::boolean(args[0].is_null())),
        K::Index { n } => containers::index(ctx, &args[0], n, node),
        K::FieldValue { field_identifier } => {
            Ok(containers::field_value(&args[0], field_identifier))
        }
        K::Random => Ok(containers::random(ctx, &args[0])),
        K::Member => containers::member(&args[0], &args[1], node),
        K::Delete => containers::delete(&args[0], &args[1], node),
        K::Contains => containers::contains(&args[0], &args[1], node),
        K::Substring { case_sensitive } => {
            logic::substring(&args[0], &args[1], *case_sensitive, node)
        }
        K::Repeat { number_repeats } => containers::repeat(ctx, args, number_repeats, node),

        K::Not => logic::not(&args[0], node),
        K::And => logic::and(args, node),
        K::Or => logic::or(args, node),
        K::AnyN { min, max } => logic::any_n(ctx, args, min, max, node),
        K::Match => logic::match_values(&args[0], &args[1], node),
        K::StringMatch {
            case_sensitive,
            substring,
        } => logic::string_match(&args[0], &args[1], *case_sensitive, *substring, node),
        K::PatternMatch { pattern } => logic::pattern_match(ctx, &args[0], pattern, node),
        K::Equal {
            tolerance_mode,
            tolerance,
            include_lower_bound,
            include_upper_bound,
        } => logic::equal(
            ctx,
            &args[0],
            &args[1],
            *tolerance_mode,
            tolerance,
            (*include_lower_bound, *include_upper_bound),
            node,
        ),
        K::EqualRounded {
            rounding_mode,
            figures,
        } => logic::equal_rounded(ctx, &args[0], &args[1], *rounding_mode, figures, node),
        K::Inside { shape, coords } => logic::inside(&args[0], *shape, coords, node),
        K::Lt => logic::compare(&args[0], &args[1], node, |a, b| a < b),
        K::Gt => logic::compare(&args[0], &args[1], node, |a, b| a > b),
        K::Lte => logic::compare(&args[0], &args[1], node, |a, b| a <= b),
        K::Gte => logic::compare(&args[0], &args[1], node, |a, b| a >= b),
        K::DurationLt => logic::compare_durations(&args[0], &args[1], node, |a, b| a < b),
        K::DurationGte => logic::compare_durations(&args[0], &args[1], node, |a, b| a >= b),

        K::Sum => numeric::sum(ctx, args, node),
        K::Product => numeric::product(ctx, args, node),
        K::Subtract => numeric::subtract(ctx, &args[0], &args[1], node),
        K::Divide => numeric::divide(ctx, &args[0], &args[1], node),
        K::Power => numeric::power(ctx, &args[0], &args[1], node),
        K::IntegerDivide => numeric::integer_divide(ctx, &args[0], &args[1], node),
        K::IntegerModulus => numeric::integer_modulus(ctx, &args[0], &args[1], node),
        K::Truncate => numeric::truncate(ctx, &args[0], node),
        K::Round => numeric::round(ctx, &args[0], node),
        K::IntegerToFloat => numeric::integer_to_float(&args[0], node),
        K::RoundTo {
            rounding_mode,
            figures,
        } => numeric::round_to(ctx, &args[0], *rounding_mode, figures, node),
        K::Min => numeric::extreme(args, node, false),
        K::Max => numeric::extreme(args, node, true),
        K::Gcd => numeric::gcd_lcm(ctx, args, node, true),
        K::Lcm => numeric::gcd_lcm(ctx, args, node, false),
        K::MathOperator { name } => numeric::math_operator(ctx, *name, args, node),
    }
}

// ──────────────────────────────────────────────
// Operand helpers
// ──────────────────────────────────────────────

fn any_null(args: &[Value]) -> bool {
    args.iter().any(Value::is_null)
}

/// Single numeric operand as f64. Callers handle Null first.
fn number(value: &Value, node: &NodePath) -> Result<f64, EvalError> {
    value
        .as_f64()
        .ok_or_else(|| mismatch(node, "single integer or float", value))
}

fn integer(value: &Value, node: &NodePath) -> Result<i32, EvalError> {
    value
        .as_integer()
        .ok_or_else(|| mismatch(node, "single integer", value))
}

fn boolean(value: &Value, node: &NodePath) -> Result<bool, EvalError> {
    value
        .as_bool()
        .ok_or_else(|| mismatch(node, "single boolean", value))
}

fn text<'v>(value: &'v Value, node: &NodePath) -> Result<&'v str, EvalError> {
    match value.as_single() {
        Some(SingleValue::String(s)) => Ok(s),
        _ => Err(mismatch(node, "single string", value)),
    }
}

#[cfg(test)]
mod tests;
