//! The item session controller.
//!
//! Drives one candidate's session through template processing, response
//! binding and validation, response processing and feedback selection. Each
//! phase checks the current [`SessionStatus`] first; calling a phase out of
//! order is a fatal [`SessionError::InvalidState`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use qti_core::model::{
    Condition, FeedbackElement, ResponseConstraint, TemplateRule, COMPLETION_COMPLETED,
    COMPLETION_NOT_ATTEMPTED, COMPLETION_STATUS, COMPLETION_UNKNOWN, DURATION, NUM_ATTEMPTS,
};
use qti_core::{
    AssessmentItem, Expression, Identifier, NodePath, Notification, Notifier, Value,
    VariableType,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use time::OffsetDateTime;

use super::binding::{parse_response, ResponseData};
use super::scope::{effective_correct, effective_default, ItemScope, RESPONSE_PHASE, TEMPLATE_PHASE};
use super::{builtin_declaration, ItemSessionState, SessionConfig, SessionStatus};
use crate::context::EvalContext;
use crate::error::{EvalError, SessionError};
use crate::expression::{anchored, evaluate_root};
use crate::feedback;
use crate::rules::{
    check_assignment, condition_holds, lookup_target, run_outcome_rules, Flow, OutcomeStore,
};

/// Result of [`ItemSessionController::bind_responses`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    /// Responses were bound. Holds the identifiers whose data could not be
    /// read; those keep their previous values.
    Bound(BTreeSet<Identifier>),
    /// The attempt limit has been reached; nothing was bound.
    NoMoreAttempts,
}

/// Value a built-in variable starts with.
pub(crate) fn builtin_initial_value(identifier: &str) -> Value {
    match identifier {
        NUM_ATTEMPTS => Value::integer(0),
        DURATION => Value::float(0.0),
        COMPLETION_STATUS => completion(COMPLETION_NOT_ATTEMPTED),
        _ => Value::Null,
    }
}

fn completion(status: &str) -> Value {
    Identifier::new(status).map_or(Value::Null, Value::identifier)
}

fn response_node(identifier: &Identifier) -> NodePath {
    NodePath::root("responseDeclaration").child(identifier.as_str())
}

/// Error for a rule target that is not a variable of the `allowed` kinds.
fn target_error(item: &AssessmentItem, identifier: &Identifier, allowed: &[VariableType]) -> EvalError {
    if item.declaration(identifier.as_str()).is_some()
        || builtin_declaration(identifier.as_str()).is_some()
    {
        EvalError::undeclared(identifier.as_str(), allowed)
    } else {
        EvalError::UnknownVariable {
            identifier: identifier.to_string(),
        }
    }
}

pub struct ItemSessionController {
    item: Arc<AssessmentItem>,
    config: SessionConfig,
    state: ItemSessionState,
    notifier: Notifier,
    rng: StdRng,
}

impl ItemSessionController {
    pub fn new(item: Arc<AssessmentItem>, config: SessionConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        ItemSessionController {
            item,
            config,
            state: ItemSessionState::default(),
            notifier: Notifier::new(),
            rng,
        }
    }

    /// Continue a session from a saved state snapshot.
    pub fn restore(item: Arc<AssessmentItem>, config: SessionConfig, state: ItemSessionState) -> Self {
        let mut controller = Self::new(item, config);
        controller.state = state;
        controller
    }

    pub fn item(&self) -> &AssessmentItem {
        &self.item
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &ItemSessionState {
        &self.state
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut Notifier {
        &mut self.notifier
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.notifier.take_notifications()
    }

    /// Statically validate the item. Returns the number of errors found.
    pub fn validate(&mut self) -> usize {
        crate::validate::validate_item(&self.item, &mut self.notifier)
    }

    // ──────────────────────────────────────────────
    // Lifecycle
    // ──────────────────────────────────────────────

    fn require(&self, operation: &'static str, allowed: &[SessionStatus]) -> Result<(), SessionError> {
        if allowed.contains(&self.state.status) {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                operation,
                state: self.state.status,
            })
        }
    }

    fn transition(&mut self, to: SessionStatus) {
        tracing::debug!(
            item = %self.item.identifier,
            from = %self.state.status,
            to = %to,
            "session transition"
        );
        self.state.status = to;
    }

    /// Give every declared and built-in variable its initial value.
    pub fn initialize(&mut self) -> Result<(), SessionError> {
        if self.state.status != SessionStatus::NotInitialized {
            return Err(SessionError::AlreadyInitialized);
        }
        self.item.check_declarations()?;
        for (namespace, declaration) in self.item.all_declarations() {
            let value = declaration.default_value()?;
            self.state
                .values_mut(namespace)
                .insert(declaration.identifier.clone(), value);
        }
        for name in [NUM_ATTEMPTS, DURATION, COMPLETION_STATUS] {
            if let Some((namespace, declaration)) = builtin_declaration(name) {
                self.state
                    .values_mut(namespace)
                    .insert(declaration.identifier, builtin_initial_value(name));
            }
        }
        self.transition(SessionStatus::Initialized);
        Ok(())
    }

    /// Run template processing until every template constraint holds, up to
    /// the configured number of passes, then reset responses and outcomes to
    /// their (possibly overridden) defaults.
    pub fn perform_template_processing(&mut self) -> Result<(), SessionError> {
        self.require("perform template processing", &[SessionStatus::Initialized])?;
        let item = Arc::clone(&self.item);
        let root = NodePath::root("templateProcessing");
        let passes = self.config.max_template_processing_tries.max(1);

        let mut settled = false;
        for pass in 1..=passes {
            self.state.overridden_defaults.clear();
            self.state.overridden_correct_responses.clear();
            if self.run_template_rules(&item.template_processing, &root)? == Flow::Retry {
                tracing::debug!(pass, "template constraint failed");
                continue;
            }
            settled = true;
            break;
        }
        if !settled {
            self.notifier.fire_runtime_warning(
                &root,
                format!(
                    "template constraints still failing after {} passes; \
                     template variables reset to their defaults",
                    passes
                ),
            );
            self.state.overridden_defaults.clear();
            self.state.overridden_correct_responses.clear();
            self.reset_namespace(VariableType::Template)?;
        }
        self.reset_namespace(VariableType::Response)?;
        self.reset_namespace(VariableType::Outcome)?;
        self.transition(SessionStatus::TemplateProcessed);
        Ok(())
    }

    /// Present the item to the candidate and start the clock.
    pub fn enter_item(&mut self, now: OffsetDateTime) -> Result<(), SessionError> {
        self.require("enter item", &[SessionStatus::TemplateProcessed])?;
        self.state.time.start(now);
        if !self.item.adaptive || self.state.completion_status() == Some(COMPLETION_NOT_ATTEMPTED) {
            self.set_builtin(COMPLETION_STATUS, completion(COMPLETION_UNKNOWN));
        }
        self.transition(SessionStatus::Entered);
        Ok(())
    }

    /// Bind raw candidate responses. Unreadable data is reported back and
    /// leaves the variable unchanged; an identifier that is not a declared
    /// response aborts the whole binding.
    pub fn bind_responses(
        &mut self,
        responses: &BTreeMap<Identifier, ResponseData>,
        now: OffsetDateTime,
    ) -> Result<BindOutcome, SessionError> {
        self.require(
            "bind responses",
            &[
                SessionStatus::Entered,
                SessionStatus::ResponseBound,
                SessionStatus::Attempted,
            ],
        )?;
        if !self.is_attempt_allowed() {
            self.notifier.fire_runtime_warning(
                &NodePath::root("itemSession"),
                format!(
                    "no more attempts allowed ({} used)",
                    self.state.num_attempts()
                ),
            );
            return Ok(BindOutcome::NoMoreAttempts);
        }
        let item = Arc::clone(&self.item);
        if let Some(unknown) = responses
            .keys()
            .find(|id| item.response_declaration(id.as_str()).is_none())
        {
            return Err(SessionError::UnknownResponse(unknown.to_string()));
        }

        let mut bad = BTreeSet::new();
        for (identifier, data) in responses {
            let Some(declaration) = item.response_declaration(identifier.as_str()) else {
                continue;
            };
            match parse_response(&declaration.variable, data) {
                Ok(value) => {
                    self.state
                        .response_values
                        .insert(identifier.clone(), value);
                }
                Err(reason) => {
                    self.notifier
                        .fire_runtime_warning(&response_node(identifier), reason);
                    bad.insert(identifier.clone());
                }
            }
        }
        self.update_duration(now);
        self.state.bad_responses = bad.clone();
        self.state.invalid_responses.clear();
        self.transition(SessionStatus::ResponseBound);
        Ok(BindOutcome::Bound(bad))
    }

    /// Check bound responses against the item's response constraints.
    /// Returns every response that is bad or violates its constraint.
    pub fn validate_responses(&mut self) -> Result<BTreeSet<Identifier>, SessionError> {
        self.require(
            "validate responses",
            &[SessionStatus::ResponseBound, SessionStatus::Attempted],
        )?;
        let item = Arc::clone(&self.item);
        let mut invalid = self.state.bad_responses.clone();
        for constraint in &item.response_constraints {
            let identifier = &constraint.response_identifier;
            let value = self
                .state
                .response_values
                .get(identifier)
                .cloned()
                .unwrap_or_default();
            if let Some(problem) = self.constraint_problem(constraint, &value) {
                self.notifier
                    .fire_runtime_info(&response_node(identifier), problem);
                invalid.insert(identifier.clone());
            }
        }
        self.state.invalid_responses = invalid.clone();
        Ok(invalid)
    }

    fn constraint_problem(&mut self, constraint: &ResponseConstraint, value: &Value) -> Option<String> {
        let count = value.len();
        if constraint.min_choices > 0 && count < constraint.min_choices {
            return Some(format!(
                "at least {} choices required, {} given",
                constraint.min_choices, count
            ));
        }
        if constraint.max_choices > 0 && count > constraint.max_choices {
            return Some(format!(
                "at most {} choices allowed, {} given",
                constraint.max_choices, count
            ));
        }
        let strings: Vec<&str> = value.items().iter().filter_map(|i| i.as_text()).collect();
        let filled = strings.iter().filter(|s| !s.trim().is_empty()).count();
        if constraint.min_strings > 0 && filled < constraint.min_strings {
            return Some(format!(
                "at least {} strings required, {} given",
                constraint.min_strings, filled
            ));
        }
        let pattern = constraint.pattern_mask.as_deref()?;
        match anchored(pattern) {
            Ok(mask) => strings
                .iter()
                .find(|s| !mask.is_match(s))
                .map(|s| format!("'{}' does not match pattern '{}'", s, pattern)),
            Err(err) => {
                self.notifier.fire_runtime_error(
                    &response_node(&constraint.response_identifier),
                    format!("invalid pattern mask '{}': {}", pattern, err),
                );
                Some(format!("pattern mask '{}' cannot be applied", pattern))
            }
        }
    }

    /// Count an attempt and run response processing.
    pub fn perform_response_processing(&mut self, now: OffsetDateTime) -> Result<(), SessionError> {
        self.require(
            "perform response processing",
            &[
                SessionStatus::Entered,
                SessionStatus::ResponseBound,
                SessionStatus::Attempted,
            ],
        )?;
        let item = Arc::clone(&self.item);
        let attempts = self.state.num_attempts().saturating_add(1);
        self.set_builtin(NUM_ATTEMPTS, Value::integer(attempts));
        self.update_duration(now);
        if !item.adaptive {
            self.reset_namespace(VariableType::Outcome)?;
        }

        let root = NodePath::root("responseProcessing");
        if run_outcome_rules(&item.response_processing, self, &root)? == Flow::Exit {
            tracing::debug!(item = %item.identifier, "response processing exited early");
        }

        if !item.adaptive {
            self.set_builtin(COMPLETION_STATUS, completion(COMPLETION_COMPLETED));
        }
        self.transition(SessionStatus::Attempted);
        Ok(())
    }

    pub fn suspend(&mut self, now: OffsetDateTime) -> Result<(), SessionError> {
        self.require(
            "suspend",
            &[
                SessionStatus::Entered,
                SessionStatus::ResponseBound,
                SessionStatus::Attempted,
            ],
        )?;
        self.state.time.stop(now);
        self.update_duration(now);
        self.state.resume_status = Some(self.state.status);
        self.transition(SessionStatus::Suspended);
        Ok(())
    }

    pub fn resume(&mut self, now: OffsetDateTime) -> Result<(), SessionError> {
        self.require("resume", &[SessionStatus::Suspended])?;
        self.state.time.start(now);
        let to = self
            .state
            .resume_status
            .take()
            .unwrap_or(SessionStatus::Entered);
        self.transition(to);
        Ok(())
    }

    /// Close the session and stop the clock.
    pub fn end_item(&mut self, now: OffsetDateTime) -> Result<(), SessionError> {
        self.require(
            "end item",
            &[
                SessionStatus::Entered,
                SessionStatus::ResponseBound,
                SessionStatus::Attempted,
                SessionStatus::Suspended,
            ],
        )?;
        self.state.time.stop(now);
        self.update_duration(now);
        self.state.resume_status = None;
        self.transition(SessionStatus::Closed);
        Ok(())
    }

    // ──────────────────────────────────────────────
    // Queries
    // ──────────────────────────────────────────────

    /// Adaptive items decide for themselves through `completionStatus`;
    /// other items are limited by `max_attempts` (0 means unlimited).
    pub fn is_attempt_allowed(&self) -> bool {
        if self.item.adaptive {
            return self.state.completion_status() != Some(COMPLETION_COMPLETED);
        }
        let max = self.config.max_attempts;
        max == 0 || u32::try_from(self.state.num_attempts()).unwrap_or(0) < max
    }

    /// Whether every response equals its correct response. `None` when any
    /// response has no correct response.
    pub fn is_correct(&self) -> Option<bool> {
        let mut all = true;
        for declaration in &self.item.response_declarations {
            all &= self.response_matches(&declaration.variable.identifier)?;
        }
        Some(all)
    }

    pub fn is_incorrect(&self) -> Option<bool> {
        self.is_correct().map(|correct| !correct)
    }

    /// Responses equal to their correct response.
    pub fn count_correct(&self) -> usize {
        self.response_tally(true)
    }

    /// Responses with a correct response that they do not equal.
    pub fn count_incorrect(&self) -> usize {
        self.response_tally(false)
    }

    fn response_tally(&self, wanted: bool) -> usize {
        self.item
            .response_declarations
            .iter()
            .filter(|d| self.response_matches(&d.variable.identifier) == Some(wanted))
            .count()
    }

    fn response_matches(&self, identifier: &Identifier) -> Option<bool> {
        let correct = effective_correct(&self.item, &self.state, identifier.as_str()).ok()?;
        if correct.is_null() {
            return None;
        }
        let response = self
            .state
            .response_values
            .get(identifier)
            .cloned()
            .unwrap_or_default();
        Some(response == correct)
    }

    /// The candidate has seen the item.
    pub fn is_presented(&self) -> bool {
        !matches!(
            self.state.status,
            SessionStatus::NotInitialized
                | SessionStatus::Initialized
                | SessionStatus::TemplateProcessed
        )
    }

    /// At least one attempt has been processed.
    pub fn is_responded(&self) -> bool {
        self.state.num_attempts() > 0
    }

    pub fn is_feedback_visible(&self, element: &FeedbackElement) -> bool {
        let outcome = self
            .state
            .outcome_values
            .get(&element.outcome_identifier)
            .cloned()
            .unwrap_or_default();
        feedback::is_visible(element, &outcome)
    }

    pub fn visible_feedback(&self) -> Vec<&FeedbackElement> {
        self.item
            .feedback
            .iter()
            .filter(|f| self.is_feedback_visible(f))
            .collect()
    }

    // ──────────────────────────────────────────────
    // Internals
    // ──────────────────────────────────────────────

    fn evaluate(
        &mut self,
        expression: &Expression,
        node: &NodePath,
        allowed: &'static [VariableType],
    ) -> Result<Value, EvalError> {
        let scope = ItemScope::new(&self.item, &self.state, allowed);
        let mut ctx = EvalContext::new(&scope, &mut self.notifier, &mut self.rng);
        evaluate_root(expression, &mut ctx, node)
    }

    fn set_builtin(&mut self, identifier: &str, value: Value) {
        if let Some((namespace, declaration)) = builtin_declaration(identifier) {
            self.state
                .values_mut(namespace)
                .insert(declaration.identifier, value);
        }
    }

    fn update_duration(&mut self, now: OffsetDateTime) {
        let elapsed = self.state.time.elapsed(now);
        self.set_builtin(DURATION, Value::float(elapsed));
    }

    /// Reset every declared variable of `namespace` to its effective default.
    fn reset_namespace(&mut self, namespace: VariableType) -> Result<(), EvalError> {
        let item = Arc::clone(&self.item);
        for (ns, declaration) in item.all_declarations() {
            if ns != namespace {
                continue;
            }
            let value = effective_default(&item, &self.state, declaration.identifier.as_str())?;
            self.state
                .values_mut(namespace)
                .insert(declaration.identifier.clone(), value);
        }
        Ok(())
    }

    fn run_template_rules(
        &mut self,
        rules: &[TemplateRule],
        node: &NodePath,
    ) -> Result<Flow, EvalError> {
        let item = Arc::clone(&self.item);
        for (index, rule) in rules.iter().enumerate() {
            let rule_node = node.indexed(rule.name(), index);
            match rule {
                TemplateRule::SetTemplateValue {
                    identifier,
                    expression,
                } => {
                    let value = self.evaluate(
                        expression,
                        &rule_node.child(expression.name()),
                        TEMPLATE_PHASE,
                    )?;
                    let declaration = item
                        .template_declaration(identifier.as_str())
                        .ok_or_else(|| target_error(&item, identifier, TEMPLATE_PHASE))?;
                    let value = check_assignment(&declaration.variable, value, &rule_node)?;
                    self.state
                        .template_values
                        .insert(identifier.clone(), value);
                }
                TemplateRule::SetDefaultValue {
                    identifier,
                    expression,
                } => {
                    let value = self.evaluate(
                        expression,
                        &rule_node.child(expression.name()),
                        TEMPLATE_PHASE,
                    )?;
                    let declaration = match item.declaration(identifier.as_str()) {
                        Some((VariableType::Response | VariableType::Outcome, d)) => d,
                        _ => {
                            return Err(target_error(
                                &item,
                                identifier,
                                &[VariableType::Response, VariableType::Outcome],
                            ))
                        }
                    };
                    let value = check_assignment(declaration, value, &rule_node)?;
                    self.state
                        .overridden_defaults
                        .insert(identifier.clone(), value);
                }
                TemplateRule::SetCorrectResponse {
                    identifier,
                    expression,
                } => {
                    let value = self.evaluate(
                        expression,
                        &rule_node.child(expression.name()),
                        TEMPLATE_PHASE,
                    )?;
                    let declaration = item
                        .response_declaration(identifier.as_str())
                        .ok_or_else(|| target_error(&item, identifier, &[VariableType::Response]))?;
                    let value = check_assignment(&declaration.variable, value, &rule_node)?;
                    self.state
                        .overridden_correct_responses
                        .insert(identifier.clone(), value);
                }
                TemplateRule::TemplateCondition(condition) => {
                    let flow = self.run_template_condition(condition, &rule_node)?;
                    if flow != Flow::Continue {
                        return Ok(flow);
                    }
                }
                TemplateRule::TemplateConstraint { expression } => {
                    let test_node = rule_node.child(expression.name());
                    let value = self.evaluate(expression, &test_node, TEMPLATE_PHASE)?;
                    if !condition_holds(&value, &test_node)? {
                        return Ok(Flow::Retry);
                    }
                }
                TemplateRule::ExitTemplate => return Ok(Flow::Exit),
            }
        }
        Ok(Flow::Continue)
    }

    fn run_template_condition(
        &mut self,
        condition: &Condition<TemplateRule>,
        node: &NodePath,
    ) -> Result<Flow, EvalError> {
        for (index, branch) in condition.branches().enumerate() {
            let branch_node = if index == 0 {
                node.child("if")
            } else {
                node.indexed("elseIf", index - 1)
            };
            let test_node = branch_node.child(branch.condition.name());
            let value = self.evaluate(&branch.condition, &test_node, TEMPLATE_PHASE)?;
            if condition_holds(&value, &test_node)? {
                return self.run_template_rules(&branch.rules, &branch_node);
            }
        }
        match &condition.else_rules {
            Some(rules) => self.run_template_rules(rules, &node.child("else")),
            None => Ok(Flow::Continue),
        }
    }
}

impl OutcomeStore for ItemSessionController {
    fn evaluate(&mut self, expression: &Expression, node: &NodePath) -> Result<Value, EvalError> {
        ItemSessionController::evaluate(self, expression, node, RESPONSE_PHASE)
    }

    fn assign_outcome(
        &mut self,
        identifier: &Identifier,
        value: Value,
        node: &NodePath,
    ) -> Result<(), EvalError> {
        let declaration = match self.item.outcome_declaration(identifier.as_str()) {
            Some(d) => d.variable.clone(),
            None => match builtin_declaration(identifier.as_str()) {
                Some((VariableType::Outcome, d)) => d,
                _ => return Err(target_error(&self.item, identifier, &[VariableType::Outcome])),
            },
        };
        let value = check_assignment(&declaration, value, node)?;
        self.state.outcome_values.insert(identifier.clone(), value);
        Ok(())
    }

    fn lookup_outcome(
        &mut self,
        identifier: &Identifier,
        source: Value,
        node: &NodePath,
    ) -> Result<(), EvalError> {
        let item = Arc::clone(&self.item);
        let declaration = item
            .outcome_declaration(identifier.as_str())
            .ok_or_else(|| target_error(&item, identifier, &[VariableType::Outcome]))?;
        let value = lookup_target(
            &declaration.variable,
            declaration.lookup_table.as_ref(),
            &source,
            node,
        )?;
        self.state.outcome_values.insert(identifier.clone(), value);
        Ok(())
    }
}
