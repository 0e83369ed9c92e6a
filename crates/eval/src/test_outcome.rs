//! Test-level outcome processing.
//!
//! A [`TestOutcomeProcessor`] aggregates finished item sessions into the
//! test's outcome variables. Its rules may read the test's own outcomes,
//! dotted `ITEM.VARIABLE` references into individual items, and item subset
//! expressions such as `numberCorrect` or `testVariables`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use qti_core::model::{Expression, ResponseDeclaration};
use qti_core::{
    AssessmentTest, Identifier, ModelError, NodePath, Notification, Notifier, Value,
    VariableType,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::context::{EvalContext, VariableResolver};
use crate::error::EvalError;
use crate::expression::evaluate_root;
use crate::rules::{check_assignment, lookup_target, run_outcome_rules, OutcomeStore};
use crate::session::ItemSessionController;

// ──────────────────────────────────────────────
// Item states
// ──────────────────────────────────────────────

/// What test outcome processing knows about one item of the test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestItemState {
    /// Identifier of the item reference within the test.
    pub identifier: Identifier,
    /// Enclosing sections, outermost first.
    #[serde(default)]
    pub sections: Vec<Identifier>,
    #[serde(default)]
    pub categories: Vec<Identifier>,
    #[serde(default)]
    pub weights: BTreeMap<Identifier, f64>,
    #[serde(default)]
    pub presented: bool,
    #[serde(default)]
    pub responded: bool,
    #[serde(default = "selected_by_default")]
    pub selected: bool,
    /// `None` when some response has no correct response.
    #[serde(default)]
    pub correct: Option<bool>,
    #[serde(default)]
    pub outcomes: BTreeMap<Identifier, Value>,
    #[serde(default)]
    pub responses: BTreeMap<Identifier, Value>,
    #[serde(default)]
    pub normal_maximums: BTreeMap<Identifier, f64>,
    #[serde(default)]
    pub normal_minimums: BTreeMap<Identifier, f64>,
}

fn selected_by_default() -> bool {
    true
}

impl TestItemState {
    pub fn new(identifier: Identifier) -> Self {
        TestItemState {
            identifier,
            sections: Vec::new(),
            categories: Vec::new(),
            weights: BTreeMap::new(),
            presented: false,
            responded: false,
            selected: true,
            correct: None,
            outcomes: BTreeMap::new(),
            responses: BTreeMap::new(),
            normal_maximums: BTreeMap::new(),
            normal_minimums: BTreeMap::new(),
        }
    }

    /// Snapshot a session under the item reference `identifier`.
    pub fn from_session(identifier: Identifier, session: &ItemSessionController) -> Self {
        let mut state = Self::new(identifier);
        state.presented = session.is_presented();
        state.responded = session.is_responded();
        state.correct = session.is_correct();
        state.outcomes = session.state().values(VariableType::Outcome).clone();
        state.responses = session.state().values(VariableType::Response).clone();
        for declaration in &session.item().outcome_declarations {
            let id = &declaration.variable.identifier;
            if let Some(max) = declaration.normal_maximum {
                state.normal_maximums.insert(id.clone(), max);
            }
            if let Some(min) = declaration.normal_minimum {
                state.normal_minimums.insert(id.clone(), min);
            }
        }
        state
    }

    pub fn with_sections(mut self, sections: Vec<Identifier>) -> Self {
        self.sections = sections;
        self
    }

    pub fn with_categories(mut self, categories: Vec<Identifier>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_weight(mut self, weight: Identifier, value: f64) -> Self {
        self.weights.insert(weight, value);
        self
    }

    /// An outcome or response variable of the item.
    pub fn variable(&self, identifier: &str) -> Option<&Value> {
        self.outcomes
            .get(identifier)
            .or_else(|| self.responses.get(identifier))
    }
}

// ──────────────────────────────────────────────
// Resolution
// ──────────────────────────────────────────────

struct TestScope<'a> {
    test: &'a AssessmentTest,
    outcomes: &'a BTreeMap<Identifier, Value>,
    items: &'a [TestItemState],
}

impl TestScope<'_> {
    fn item(&self, identifier: &str) -> Option<&TestItemState> {
        self.items.iter().find(|i| i.identifier.as_str() == identifier)
    }
}

fn unknown(identifier: &Identifier) -> EvalError {
    EvalError::UnknownVariable {
        identifier: identifier.to_string(),
    }
}

impl VariableResolver for TestScope<'_> {
    fn lookup(&self, identifier: &Identifier) -> Result<Value, EvalError> {
        if let Some(value) = self.outcomes.get(identifier) {
            return Ok(value.clone());
        }
        let (item, variable) = identifier
            .split_dotted()
            .ok_or_else(|| unknown(identifier))?;
        self.item(item)
            .and_then(|i| i.variable(variable))
            .cloned()
            .ok_or_else(|| unknown(identifier))
    }

    fn template_value(&self, identifier: &Identifier) -> Result<Value, EvalError> {
        Err(EvalError::undeclared(
            identifier.as_str(),
            &[VariableType::Template],
        ))
    }

    fn default_value(&self, identifier: &Identifier) -> Result<Value, EvalError> {
        match self.test.outcome_declaration(identifier.as_str()) {
            Some(declaration) => Ok(declaration.variable.default_value()?),
            None => Err(unknown(identifier)),
        }
    }

    fn correct_value(&self, identifier: &Identifier) -> Result<Value, EvalError> {
        Err(EvalError::undeclared(
            identifier.as_str(),
            &[VariableType::Response],
        ))
    }

    fn response_declaration(
        &self,
        identifier: &Identifier,
    ) -> Result<&ResponseDeclaration, EvalError> {
        Err(EvalError::undeclared(
            identifier.as_str(),
            &[VariableType::Response],
        ))
    }

    fn test_items(&self) -> Option<&[TestItemState]> {
        Some(self.items)
    }

    fn weight(&self, reference: &Identifier, weight: &Identifier) -> Option<f64> {
        let (item, _) = reference.split_dotted()?;
        self.item(item)?.weights.get(weight).copied()
    }
}

// ──────────────────────────────────────────────
// Processor
// ──────────────────────────────────────────────

pub struct TestOutcomeProcessor {
    test: Arc<AssessmentTest>,
    outcomes: BTreeMap<Identifier, Value>,
    notifier: Notifier,
    rng: StdRng,
}

impl TestOutcomeProcessor {
    pub fn new(test: Arc<AssessmentTest>, seed: u64) -> Self {
        TestOutcomeProcessor {
            test,
            outcomes: BTreeMap::new(),
            notifier: Notifier::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn test(&self) -> &AssessmentTest {
        &self.test
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

    /// Statically validate the test. Returns the number of errors found.
    pub fn validate(&mut self) -> usize {
        crate::validate::validate_test(&self.test, &mut self.notifier)
    }

    pub fn outcomes(&self) -> &BTreeMap<Identifier, Value> {
        &self.outcomes
    }

    pub fn outcome_value(&self, identifier: &str) -> Option<&Value> {
        self.outcomes.get(identifier)
    }

    /// Reset every test outcome to its default.
    pub fn initialize(&mut self) -> Result<(), EvalError> {
        let mut seen = BTreeSet::new();
        let mut outcomes = BTreeMap::new();
        for declaration in &self.test.outcome_declarations {
            let id = &declaration.variable.identifier;
            if !seen.insert(id.as_str()) {
                return Err(ModelError::DuplicateDeclaration(id.clone()).into());
            }
            outcomes.insert(id.clone(), declaration.variable.default_value()?);
        }
        self.outcomes = outcomes;
        Ok(())
    }

    /// Reset outcomes and run outcome processing over `items`.
    pub fn process(&mut self, items: &[TestItemState]) -> Result<(), EvalError> {
        self.initialize()?;
        let test = Arc::clone(&self.test);
        let root = NodePath::root("outcomeProcessing");
        let mut run = TestRun {
            processor: self,
            items,
        };
        run_outcome_rules(&test.outcome_processing, &mut run, &root)?;
        tracing::debug!(
            test = %test.identifier,
            items = items.len(),
            "test outcome processing finished"
        );
        Ok(())
    }
}

struct TestRun<'p> {
    processor: &'p mut TestOutcomeProcessor,
    items: &'p [TestItemState],
}

impl TestRun<'_> {
    fn outcome_declaration(
        &self,
        identifier: &Identifier,
    ) -> Result<qti_core::model::VariableDeclaration, EvalError> {
        self.processor
            .test
            .outcome_declaration(identifier.as_str())
            .map(|d| d.variable.clone())
            .ok_or_else(|| unknown(identifier))
    }
}

impl OutcomeStore for TestRun<'_> {
    fn evaluate(&mut self, expression: &Expression, node: &NodePath) -> Result<Value, EvalError> {
        let processor = &mut *self.processor;
        let scope = TestScope {
            test: &processor.test,
            outcomes: &processor.outcomes,
            items: self.items,
        };
        let mut ctx = EvalContext::new(&scope, &mut processor.notifier, &mut processor.rng);
        evaluate_root(expression, &mut ctx, node)
    }

    fn assign_outcome(
        &mut self,
        identifier: &Identifier,
        value: Value,
        node: &NodePath,
    ) -> Result<(), EvalError> {
        let declaration = self.outcome_declaration(identifier)?;
        let value = check_assignment(&declaration, value, node)?;
        self.processor.outcomes.insert(identifier.clone(), value);
        Ok(())
    }

    fn lookup_outcome(
        &mut self,
        identifier: &Identifier,
        source: Value,
        node: &NodePath,
    ) -> Result<(), EvalError> {
        let test = Arc::clone(&self.processor.test);
        let declaration = test
            .outcome_declaration(identifier.as_str())
            .ok_or_else(|| unknown(identifier))?;
        let value = lookup_target(
            &declaration.variable,
            declaration.lookup_table.as_ref(),
            &source,
            node,
        )?;
        self.processor.outcomes.insert(identifier.clone(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    fn item(name: &str, score: f64, correct: bool) -> TestItemState {
        let mut state = TestItemState::new(id(name));
        state.presented = true;
        state.responded = true;
        state.correct = Some(correct);
        state.outcomes.insert(id("SCORE"), Value::float(score));
        state.normal_maximums.insert(id("SCORE"), 1.0);
        state
    }

    fn test_with(rules: serde_json::Value) -> AssessmentTest {
        serde_json::from_value(json!({
            "identifier": "T",
            "outcomeDeclarations": [
                {"identifier": "TOTAL", "cardinality": "single", "baseType": "float", "defaultValue": ["0"]},
                {"identifier": "CORRECT", "cardinality": "single", "baseType": "integer"}
            ],
            "outcomeProcessing": rules
        }))
        .unwrap()
    }

    #[test]
    fn dotted_lookup_and_weights() {
        let items = vec![item("Q1", 0.5, false).with_weight(id("W"), 2.0)];
        let test = test_with(json!([]));
        let outcomes = BTreeMap::new();
        let scope = TestScope {
            test: &test,
            outcomes: &outcomes,
            items: &items,
        };
        assert_eq!(scope.lookup(&id("Q1.SCORE")).unwrap(), Value::float(0.5));
        assert!(matches!(
            scope.lookup(&id("Q2.SCORE")),
            Err(EvalError::UnknownVariable { .. })
        ));
        assert_eq!(scope.weight(&id("Q1.SCORE"), &id("W")), Some(2.0));
        assert_eq!(scope.weight(&id("Q1.SCORE"), &id("X")), None);
    }

    #[test]
    fn processes_totals_and_counts() {
        let test = test_with(json!([
            {"type": "setOutcomeValue", "identifier": "TOTAL", "expression": {
                "type": "sum",
                "children": [{"type": "testVariables", "variableIdentifier": "SCORE"}]
            }},
            {"type": "setOutcomeValue", "identifier": "CORRECT",
             "expression": {"type": "numberCorrect"}}
        ]));
        let mut processor = TestOutcomeProcessor::new(Arc::new(test), 0);
        let items = vec![item("Q1", 1.0, true), item("Q2", 0.5, false)];
        processor.process(&items).unwrap();
        assert_eq!(processor.outcome_value("TOTAL"), Some(&Value::float(1.5)));
        assert_eq!(processor.outcome_value("CORRECT"), Some(&Value::integer(1)));
    }

    #[test]
    fn rejects_assignment_to_undeclared_outcome() {
        let test = test_with(json!([
            {"type": "setOutcomeValue", "identifier": "MISSING",
             "expression": {"type": "baseValue", "baseType": "float", "value": "1"}}
        ]));
        let mut processor = TestOutcomeProcessor::new(Arc::new(test), 0);
        assert!(matches!(
            processor.process(&[]),
            Err(EvalError::UnknownVariable { .. })
        ));
    }
}
