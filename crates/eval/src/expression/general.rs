//! Leaf expressions: literals, variable reads, mappings and random values.

use qti_core::model::expression::MathConstant;
use qti_core::{BaseType, Cardinality, Identifier, ModelError, NodePath, SingleValue, Value};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::context::EvalContext;
use crate::error::EvalError;
use crate::mapping;

pub(super) fn base_value(base_type: BaseType, literal: &str) -> Result<Value, EvalError> {
    Ok(Value::Single(SingleValue::parse(base_type, literal)?))
}

pub(super) fn variable(
    ctx: &EvalContext<'_>,
    identifier: &Identifier,
    weight: Option<&Identifier>,
) -> Result<Value, EvalError> {
    let value = ctx.resolver.lookup(identifier)?;
    let Some(weight) = weight else {
        return Ok(value);
    };
    match (ctx.resolver.weight(identifier, weight), value.as_f64()) {
        (Some(w), Some(v)) => Ok(Value::float(v * w)),
        _ => Ok(value),
    }
}

pub(super) fn map_response(
    ctx: &EvalContext<'_>,
    identifier: &Identifier,
    node: &NodePath,
) -> Result<Value, EvalError> {
    let declaration = ctx.resolver.response_declaration(identifier)?;
    let mapping = declaration
        .mapping
        .as_ref()
        .ok_or_else(|| EvalError::MissingMapping {
            identifier: identifier.to_string(),
            table: "mapping",
        })?;
    if declaration.variable.cardinality == Cardinality::Record {
        return Err(EvalError::structure(
            node,
            format!("cannot map record response '{}'", identifier),
        ));
    }
    let base_type = declaration
        .variable
        .base_type
        .ok_or_else(|| ModelError::MissingBaseType(identifier.clone()))?;
    let response = ctx.resolver.lookup(identifier)?;
    Ok(Value::float(mapping::map_response(
        mapping, base_type, &response,
    )))
}

pub(super) fn map_response_point(
    ctx: &EvalContext<'_>,
    identifier: &Identifier,
    node: &NodePath,
) -> Result<Value, EvalError> {
    let declaration = ctx.resolver.response_declaration(identifier)?;
    let mapping = declaration
        .area_mapping
        .as_ref()
        .ok_or_else(|| EvalError::MissingMapping {
            identifier: identifier.to_string(),
            table: "areaMapping",
        })?;
    if declaration.variable.base_type != Some(BaseType::Point) {
        return Err(EvalError::structure(
            node,
            format!("response '{}' is not a point response", identifier),
        ));
    }
    let response = ctx.resolver.lookup(identifier)?;
    Ok(Value::float(mapping::map_response_point(mapping, &response)))
}

/// Uniform choice from `min, min + step, ...` up to `max`.
pub(super) fn random_integer(
    ctx: &mut EvalContext<'_>,
    min: i32,
    max: i32,
    step: i32,
    seed: Option<u64>,
    node: &NodePath,
) -> Result<Value, EvalError> {
    if step < 1 {
        ctx.notifier
            .fire_runtime_error(node, format!("step must be at least 1, found {}", step));
        return Ok(Value::Null);
    }
    if max <= min {
        if max < min {
            ctx.notifier.fire_runtime_warning(
                node,
                format!("max {} is below min {}; using min", max, min),
            );
        }
        return Ok(Value::integer(min));
    }
    let steps = (i64::from(max) - i64::from(min)) / i64::from(step);
    let k = match seed {
        Some(seed) => StdRng::seed_from_u64(seed).gen_range(0..=steps),
        None => ctx.rng.gen_range(0..=steps),
    };
    let picked = i64::from(min) + k * i64::from(step);
    // min <= picked <= max, so the conversion cannot fail
    Ok(i32::try_from(picked).map_or(Value::Null, Value::integer))
}

pub(super) fn random_float(
    ctx: &mut EvalContext<'_>,
    min: f64,
    max: f64,
    seed: Option<u64>,
    node: &NodePath,
) -> Result<Value, EvalError> {
    if max <= min {
        if max < min {
            ctx.notifier.fire_runtime_warning(
                node,
                format!("max {} is below min {}; using min", max, min),
            );
        }
        return Ok(Value::float(min));
    }
    let unit: f64 = match seed {
        Some(seed) => StdRng::seed_from_u64(seed).gen(),
        None => ctx.rng.gen(),
    };
    Ok(Value::float(min + unit * (max - min)))
}

pub(super) fn math_constant(name: MathConstant) -> Value {
    match name {
        MathConstant::Pi => Value::float(std::f64::consts::PI),
        MathConstant::E => Value::float(std::f64::consts::E),
    }
}
