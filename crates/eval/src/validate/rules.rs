//! Rule checks: assignment targets exist in the right namespace and can
//! hold what their expression produces.

use qti_core::model::{
    Condition, Expression, LookupTable, TemplateRule, VariableDeclaration,
};
use qti_core::{
    AssessmentItem, AssessmentTest, BaseType, Identifier, NodePath, VariableType,
};

use super::{Scope, Validator};
use crate::rules::{OutcomeRuleKind, OutcomeStep};
use crate::session::builtin_declaration;
use crate::signature::{BaseTypeSet, CardinalitySet, TypeContract};

const TEMPLATE_READABLE: &[VariableType] = &[VariableType::Template];
const RESPONSE_READABLE: &[VariableType] = &[
    VariableType::Response,
    VariableType::Outcome,
    VariableType::Template,
];

/// Declaration and lookup table of an outcome rule target.
fn outcome_target<'a>(
    scope: Scope<'a>,
    identifier: &Identifier,
) -> Option<(VariableDeclaration, Option<&'a LookupTable>)> {
    match scope {
        Scope::Item { item, .. } => match item.outcome_declaration(identifier.as_str()) {
            Some(d) => Some((d.variable.clone(), d.lookup_table.as_ref())),
            None => builtin_declaration(identifier.as_str())
                .filter(|(ns, _)| *ns == VariableType::Outcome)
                .map(|(_, d)| (d, None)),
        },
        Scope::Test(test) => test
            .outcome_declaration(identifier.as_str())
            .map(|d| (d.variable.clone(), d.lookup_table.as_ref())),
    }
}

impl Validator<'_> {
    pub(super) fn template_processing(&mut self, item: &AssessmentItem) {
        let scope = Scope::Item {
            item,
            readable: TEMPLATE_READABLE,
        };
        self.template_rules(&item.template_processing, scope, &NodePath::root("templateProcessing"));
    }

    pub(super) fn response_processing(&mut self, item: &AssessmentItem) {
        let scope = Scope::Item {
            item,
            readable: RESPONSE_READABLE,
        };
        self.outcome_rules(&item.response_processing, scope, &NodePath::root("responseProcessing"));
    }

    pub(super) fn outcome_processing(&mut self, test: &AssessmentTest) {
        self.outcome_rules(
            &test.outcome_processing,
            Scope::Test(test),
            &NodePath::root("outcomeProcessing"),
        );
    }

    /// Report an assignment whose value can never fit `declaration`.
    fn assignment(&mut self, declaration: &VariableDeclaration, produced: TypeContract, node: &NodePath) {
        if !produced.cardinalities.contains(declaration.cardinality) {
            self.error(
                node,
                Some("identifier"),
                format!(
                    "'{}' is {} but the expression produces {}",
                    declaration.identifier, declaration.cardinality, produced.cardinalities
                ),
            );
            return;
        }
        let Some(base_type) = declaration.base_type else {
            return;
        };
        let mut accepted = BaseTypeSet::of(base_type);
        if base_type == BaseType::Float {
            accepted = accepted.union(BaseTypeSet::INTEGER);
        }
        if produced.cardinalities != CardinalitySet::RECORD
            && produced.base_types.intersection(accepted).is_empty()
        {
            self.error(
                node,
                Some("identifier"),
                format!(
                    "'{}' is {} but the expression produces {}",
                    declaration.identifier, base_type, produced.base_types
                ),
            );
        }
    }

    fn condition_test(&mut self, expression: &Expression, scope: Scope<'_>, node: &NodePath) {
        let test_node = node.child(expression.name());
        let produced = self.expression(expression, scope, &test_node);
        self.require(produced, TypeContract::single(BaseTypeSet::BOOLEAN), &test_node);
    }

    // ──────────────────────────────────────────────
    // Template rules
    // ──────────────────────────────────────────────

    fn template_rules(&mut self, rules: &[TemplateRule], scope: Scope<'_>, node: &NodePath) {
        let Some(item) = scope.item() else {
            return;
        };
        for (index, rule) in rules.iter().enumerate() {
            let rule_node = node.indexed(rule.name(), index);
            match rule {
                TemplateRule::SetTemplateValue {
                    identifier,
                    expression,
                } => {
                    let produced =
                        self.expression(expression, scope, &rule_node.child(expression.name()));
                    match item.template_declaration(identifier.as_str()) {
                        Some(d) => self.assignment(&d.variable, produced, &rule_node),
                        None => self.missing_target(&rule_node, identifier, "template"),
                    }
                }
                TemplateRule::SetDefaultValue {
                    identifier,
                    expression,
                } => {
                    let produced =
                        self.expression(expression, scope, &rule_node.child(expression.name()));
                    match item.declaration(identifier.as_str()) {
                        Some((VariableType::Response | VariableType::Outcome, d)) => {
                            self.assignment(d, produced, &rule_node)
                        }
                        _ => self.missing_target(&rule_node, identifier, "response or outcome"),
                    }
                }
                TemplateRule::SetCorrectResponse {
                    identifier,
                    expression,
                } => {
                    let produced =
                        self.expression(expression, scope, &rule_node.child(expression.name()));
                    match item.response_declaration(identifier.as_str()) {
                        Some(d) => self.assignment(&d.variable, produced, &rule_node),
                        None => self.missing_target(&rule_node, identifier, "response"),
                    }
                }
                TemplateRule::TemplateCondition(condition) => {
                    self.template_condition(condition, scope, &rule_node)
                }
                TemplateRule::TemplateConstraint { expression } => {
                    self.condition_test(expression, scope, &rule_node)
                }
                TemplateRule::ExitTemplate => {}
            }
        }
    }

    fn template_condition(
        &mut self,
        condition: &Condition<TemplateRule>,
        scope: Scope<'_>,
        node: &NodePath,
    ) {
        for (index, branch) in condition.branches().enumerate() {
            let branch_node = if index == 0 {
                node.child("if")
            } else {
                node.indexed("elseIf", index - 1)
            };
            self.condition_test(&branch.condition, scope, &branch_node);
            self.template_rules(&branch.rules, scope, &branch_node);
        }
        if let Some(rules) = &condition.else_rules {
            self.template_rules(rules, scope, &node.child("else"));
        }
    }

    fn missing_target(&mut self, node: &NodePath, identifier: &Identifier, kind: &str) {
        self.error(
            node,
            Some("identifier"),
            format!("'{}' is not a declared {} variable", identifier, kind),
        );
    }

    // ──────────────────────────────────────────────
    // Outcome rules
    // ──────────────────────────────────────────────

    fn outcome_rules<R: OutcomeRuleKind>(&mut self, rules: &[R], scope: Scope<'_>, node: &NodePath) {
        for (index, rule) in rules.iter().enumerate() {
            let rule_node = node.indexed(rule.name(), index);
            match rule.step() {
                OutcomeStep::Set(identifier, expression) => {
                    let produced =
                        self.expression(expression, scope, &rule_node.child(expression.name()));
                    match outcome_target(scope, identifier) {
                        Some((declaration, _)) => self.assignment(&declaration, produced, &rule_node),
                        None => self.missing_target(&rule_node, identifier, "outcome"),
                    }
                }
                OutcomeStep::Lookup(identifier, expression) => {
                    let expr_node = rule_node.child(expression.name());
                    let produced = self.expression(expression, scope, &expr_node);
                    self.require(produced, TypeContract::single(BaseTypeSet::NUMERIC), &expr_node);
                    match outcome_target(scope, identifier) {
                        Some((_, Some(_))) => {}
                        Some((_, None)) => self.error(
                            &rule_node,
                            Some("identifier"),
                            format!("outcome '{}' has no lookup table", identifier),
                        ),
                        None => self.missing_target(&rule_node, identifier, "outcome"),
                    }
                }
                OutcomeStep::Condition(condition) => {
                    for (index, branch) in condition.branches().enumerate() {
                        let branch_node = if index == 0 {
                            rule_node.child("if")
                        } else {
                            rule_node.indexed("elseIf", index - 1)
                        };
                        self.condition_test(&branch.condition, scope, &branch_node);
                        self.outcome_rules(&branch.rules, scope, &branch_node);
                    }
                    if let Some(rules) = &condition.else_rules {
                        self.outcome_rules(rules, scope, &rule_node.child("else"));
                    }
                }
                OutcomeStep::Exit => {}
            }
        }
    }
}
