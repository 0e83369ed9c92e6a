//! Processing rules for the three processing phases.

use serde::{Deserialize, Serialize};

use super::expression::Expression;
use crate::identifier::Identifier;

/// One guarded branch of a condition rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "R: Deserialize<'de>"))]
pub struct Branch<R> {
    pub condition: Expression,
    #[serde(default)]
    pub rules: Vec<R>,
}

/// `if` / `else if`* / `else`? chain shared by the three condition rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "R: Deserialize<'de>"))]
pub struct Condition<R> {
    #[serde(rename = "if")]
    pub if_branch: Branch<R>,
    #[serde(rename = "elseIf", default, skip_serializing_if = "Vec::is_empty")]
    pub else_if: Vec<Branch<R>>,
    #[serde(rename = "else", default, skip_serializing_if = "Option::is_none")]
    pub else_rules: Option<Vec<R>>,
}

impl<R> Condition<R> {
    /// Branches in evaluation order, excluding the final `else`.
    pub fn branches(&self) -> impl Iterator<Item = &Branch<R>> {
        std::iter::once(&self.if_branch).chain(self.else_if.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TemplateRule {
    SetTemplateValue {
        identifier: Identifier,
        expression: Expression,
    },
    /// Override a response or outcome declaration's default for this session.
    SetDefaultValue {
        identifier: Identifier,
        expression: Expression,
    },
    /// Override a response declaration's correct response for this session.
    SetCorrectResponse {
        identifier: Identifier,
        expression: Expression,
    },
    TemplateCondition(Condition<TemplateRule>),
    /// A false or Null constraint abandons the pass and template processing
    /// starts again.
    TemplateConstraint {
        expression: Expression,
    },
    ExitTemplate,
}

impl TemplateRule {
    pub fn name(&self) -> &'static str {
        match self {
            TemplateRule::SetTemplateValue { .. } => "setTemplateValue",
            TemplateRule::SetDefaultValue { .. } => "setDefaultValue",
            TemplateRule::SetCorrectResponse { .. } => "setCorrectResponse",
            TemplateRule::TemplateCondition(_) => "templateCondition",
            TemplateRule::TemplateConstraint { .. } => "templateConstraint",
            TemplateRule::ExitTemplate => "exitTemplate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ResponseRule {
    SetOutcomeValue {
        identifier: Identifier,
        expression: Expression,
    },
    LookupOutcomeValue {
        identifier: Identifier,
        expression: Expression,
    },
    ResponseCondition(Condition<ResponseRule>),
    ExitResponse,
}

impl ResponseRule {
    pub fn name(&self) -> &'static str {
        match self {
            ResponseRule::SetOutcomeValue { .. } => "setOutcomeValue",
            ResponseRule::LookupOutcomeValue { .. } => "lookupOutcomeValue",
            ResponseRule::ResponseCondition(_) => "responseCondition",
            ResponseRule::ExitResponse => "exitResponse",
        }
    }
}

/// Test-level outcome processing rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OutcomeRule {
    SetOutcomeValue {
        identifier: Identifier,
        expression: Expression,
    },
    LookupOutcomeValue {
        identifier: Identifier,
        expression: Expression,
    },
    OutcomeCondition(Condition<OutcomeRule>),
    ExitTest,
}

impl OutcomeRule {
    pub fn name(&self) -> &'static str {
        match self {
            OutcomeRule::SetOutcomeValue { .. } => "setOutcomeValue",
            OutcomeRule::LookupOutcomeValue { .. } => "lookupOutcomeValue",
            OutcomeRule::OutcomeCondition(_) => "outcomeCondition",
            OutcomeRule::ExitTest => "exitTest",
        }
    }
}
