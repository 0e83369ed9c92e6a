//! Evaluation context: where expressions read variables from, and the
//! session-owned services (notifier, random source) they may use.

use qti_core::model::expression::{FloatOrVariable, IntegerOrVariable};
use qti_core::model::ResponseDeclaration;
use qti_core::{Identifier, NodePath, Notifier, SingleValue, Value};
use rand::rngs::StdRng;

use crate::error::EvalError;
use crate::test_outcome::TestItemState;

/// Read access to variables for one processing phase.
///
/// Implementations decide which namespaces a plain `variable` lookup may
/// see: template processing reads template variables only, response
/// processing reads all three, test outcome processing reads the test's
/// outcomes plus dotted `ITEM.VARIABLE` references.
pub trait VariableResolver {
    /// Current value for a `variable` expression.
    fn lookup(&self, identifier: &Identifier) -> Result<Value, EvalError>;

    /// Current value of a template variable named by an attribute.
    fn template_value(&self, identifier: &Identifier) -> Result<Value, EvalError>;

    /// Default value, honouring `setDefaultValue` overrides.
    fn default_value(&self, identifier: &Identifier) -> Result<Value, EvalError>;

    /// Correct response, honouring `setCorrectResponse` overrides.
    fn correct_value(&self, identifier: &Identifier) -> Result<Value, EvalError>;

    fn response_declaration(
        &self,
        identifier: &Identifier,
    ) -> Result<&ResponseDeclaration, EvalError>;

    /// Item states for item subset expressions. `None` outside test outcome
    /// processing.
    fn test_items(&self) -> Option<&[TestItemState]> {
        None
    }

    /// Weight applied to a dotted variable reference, if any.
    fn weight(&self, _reference: &Identifier, _weight: &Identifier) -> Option<f64> {
        None
    }
}

pub struct EvalContext<'a> {
    pub resolver: &'a dyn VariableResolver,
    pub notifier: &'a mut Notifier,
    pub rng: &'a mut StdRng,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        resolver: &'a dyn VariableResolver,
        notifier: &'a mut Notifier,
        rng: &'a mut StdRng,
    ) -> Self {
        EvalContext {
            resolver,
            notifier,
            rng,
        }
    }

    /// Resolve an integer attribute. `None` when it names a Null variable.
    pub(crate) fn integer_attribute(
        &self,
        attribute: &IntegerOrVariable,
        node: &NodePath,
    ) -> Result<Option<i32>, EvalError> {
        match attribute {
            IntegerOrVariable::Literal(i) => Ok(Some(*i)),
            IntegerOrVariable::Variable(id) => match self.resolver.template_value(id)? {
                Value::Null => Ok(None),
                Value::Single(SingleValue::Integer(i)) => Ok(Some(i)),
                other => Err(mismatch(node, "single integer", &other)),
            },
        }
    }

    /// Resolve a float attribute, widening integer variables.
    pub(crate) fn float_attribute(
        &self,
        attribute: &FloatOrVariable,
        node: &NodePath,
    ) -> Result<Option<f64>, EvalError> {
        match attribute {
            FloatOrVariable::Literal(f) => Ok(Some(*f)),
            FloatOrVariable::Variable(id) => {
                let value = self.resolver.template_value(id)?;
                if value.is_null() {
                    return Ok(None);
                }
                value
                    .as_f64()
                    .map(Some)
                    .ok_or_else(|| mismatch(node, "single numeric", &value))
            }
        }
    }
}

/// Runtime type mismatch for a value that static validation would reject.
pub(crate) fn mismatch(node: &NodePath, expected: &str, actual: &Value) -> EvalError {
    let actual = match (actual.cardinality(), actual.base_type()) {
        (None, _) => "NULL".to_string(),
        (Some(c), Some(b)) => format!("{} {}", c, b),
        (Some(c), None) => c.to_string(),
    };
    EvalError::BaseTypeMismatch {
        node: node.clone(),
        expected: expected.to_string(),
        actual,
    }
}
