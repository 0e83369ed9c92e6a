//! Variable resolution for expressions evaluated inside an item session.

use qti_core::model::ResponseDeclaration;
use qti_core::{AssessmentItem, Identifier, Value, VariableType};

use super::{builtin_declaration, ItemSessionState};
use crate::context::VariableResolver;
use crate::error::EvalError;

pub(crate) const TEMPLATE_PHASE: &[VariableType] = &[VariableType::Template];
pub(crate) const RESPONSE_PHASE: &[VariableType] = &[
    VariableType::Response,
    VariableType::Outcome,
    VariableType::Template,
];

/// Read-only view of one session for one processing phase.
pub(crate) struct ItemScope<'a> {
    item: &'a AssessmentItem,
    state: &'a ItemSessionState,
    allowed: &'static [VariableType],
}

impl<'a> ItemScope<'a> {
    pub(crate) fn new(
        item: &'a AssessmentItem,
        state: &'a ItemSessionState,
        allowed: &'static [VariableType],
    ) -> Self {
        ItemScope {
            item,
            state,
            allowed,
        }
    }
}

/// Default value honouring `setDefaultValue` overrides. Built-ins default to
/// their initial values.
pub(crate) fn effective_default(
    item: &AssessmentItem,
    state: &ItemSessionState,
    identifier: &str,
) -> Result<Value, EvalError> {
    if let Some(value) = state.overridden_default(identifier) {
        return Ok(value.clone());
    }
    if let Some((_, declaration)) = item.declaration(identifier) {
        return Ok(declaration.default_value()?);
    }
    match builtin_declaration(identifier) {
        Some(_) => Ok(super::controller::builtin_initial_value(identifier)),
        None => Err(EvalError::UnknownVariable {
            identifier: identifier.to_string(),
        }),
    }
}

/// Correct response honouring `setCorrectResponse` overrides.
pub(crate) fn effective_correct(
    item: &AssessmentItem,
    state: &ItemSessionState,
    identifier: &str,
) -> Result<Value, EvalError> {
    let declaration = response_declaration(item, identifier)?;
    match state.overridden_correct_response(identifier) {
        Some(value) => Ok(value.clone()),
        None => Ok(declaration.correct_value()?),
    }
}

fn response_declaration<'i>(
    item: &'i AssessmentItem,
    identifier: &str,
) -> Result<&'i ResponseDeclaration, EvalError> {
    if let Some(declaration) = item.response_declaration(identifier) {
        return Ok(declaration);
    }
    if item.declaration(identifier).is_some() {
        Err(EvalError::undeclared(identifier, &[VariableType::Response]))
    } else {
        Err(EvalError::UnknownVariable {
            identifier: identifier.to_string(),
        })
    }
}

impl VariableResolver for ItemScope<'_> {
    fn lookup(&self, identifier: &Identifier) -> Result<Value, EvalError> {
        self.state.lookup(identifier.as_str(), self.allowed)
    }

    fn template_value(&self, identifier: &Identifier) -> Result<Value, EvalError> {
        self.state.lookup(identifier.as_str(), TEMPLATE_PHASE)
    }

    fn default_value(&self, identifier: &Identifier) -> Result<Value, EvalError> {
        effective_default(self.item, self.state, identifier.as_str())
    }

    fn correct_value(&self, identifier: &Identifier) -> Result<Value, EvalError> {
        effective_correct(self.item, self.state, identifier.as_str())
    }

    fn response_declaration(
        &self,
        identifier: &Identifier,
    ) -> Result<&ResponseDeclaration, EvalError> {
        response_declaration(self.item, identifier.as_str())
    }
}
