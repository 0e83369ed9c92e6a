//! Static validation of items and tests.
//!
//! Runs once, before any session uses the model, and reports every problem
//! it finds through the [`Notifier`] instead of stopping at the first one.
//! The return value is the number of errors reported; warnings do not
//! count.
//!
//! Checks are split by construct:
//! - declarations, mappings, lookup tables, constraints and feedback (here)
//! - processing rules and their targets ([`rules`])
//! - expression trees: child counts, cardinality and base-type contracts,
//!   variable visibility and attribute ranges ([`expression`])

mod expression;
mod rules;

use std::collections::BTreeSet;

use qti_core::model::{
    is_builtin, AreaMapping, LookupTable, Mapping, OutcomeDeclaration, ResponseDeclaration,
    VariableDeclaration,
};
use qti_core::{
    AssessmentItem, AssessmentTest, BaseType, Cardinality, NodePath, NotificationLevel, Notifier,
    SingleValue, VariableType,
};

use crate::expression::anchored;
use crate::session::builtin_declaration;

/// Where expressions being validated live, which decides the variables
/// they may read.
#[derive(Clone, Copy)]
pub(crate) enum Scope<'a> {
    Item {
        item: &'a AssessmentItem,
        readable: &'static [VariableType],
    },
    Test(&'a AssessmentTest),
}

impl<'a> Scope<'a> {
    /// Declaration of `identifier` if this scope may read it.
    pub(crate) fn readable(&self, identifier: &str) -> Result<Option<VariableDeclaration>, String> {
        match self {
            Scope::Item { item, readable } => {
                let found = item
                    .declaration(identifier)
                    .map(|(ns, d)| (ns, d.clone()))
                    .or_else(|| builtin_declaration(identifier));
                match found {
                    Some((ns, declaration)) if readable.contains(&ns) => Ok(Some(declaration)),
                    Some((ns, _)) => Err(format!(
                        "{} variable '{}' cannot be read here",
                        ns.as_str(),
                        identifier
                    )),
                    None => Err(format!("variable '{}' is not declared", identifier)),
                }
            }
            Scope::Test(test) => match test.outcome_declaration(identifier) {
                Some(d) => Ok(Some(d.variable.clone())),
                // ITEM.VARIABLE references are resolved at run time
                None if identifier.contains('.') => Ok(None),
                None => Err(format!("variable '{}' is not declared", identifier)),
            },
        }
    }

    pub(crate) fn item(&self) -> Option<&'a AssessmentItem> {
        match self {
            Scope::Item { item, .. } => Some(item),
            Scope::Test(_) => None,
        }
    }
}

pub(crate) struct Validator<'n> {
    notifier: &'n mut Notifier,
}

impl<'n> Validator<'n> {
    pub(crate) fn error(&mut self, node: &NodePath, attribute: Option<&str>, message: impl Into<String>) {
        self.notifier.fire_validation_error(node, attribute, message);
    }

    pub(crate) fn warning(&mut self, node: &NodePath, attribute: Option<&str>, message: impl Into<String>) {
        self.notifier.fire_validation_warning(node, attribute, message);
    }

    /// Run `checks` and count the errors they report.
    fn counting(notifier: &'n mut Notifier, checks: impl FnOnce(&mut Validator<'_>)) -> usize {
        let own_checkpoint = !notifier.has_checkpoint();
        let before = notifier.count_at_least(NotificationLevel::Error);
        if own_checkpoint {
            notifier.set_checkpoint(NotificationLevel::Error);
        }
        let mut validator = Validator { notifier };
        checks(&mut validator);
        if own_checkpoint {
            validator.notifier.clear_checkpoint()
        } else {
            validator.notifier.count_at_least(NotificationLevel::Error) - before
        }
    }
}

/// Validate an item. Returns the number of errors reported.
pub fn validate_item(item: &AssessmentItem, notifier: &mut Notifier) -> usize {
    let errors = Validator::counting(notifier, |v| {
        v.declarations(item);
        for response in &item.response_declarations {
            v.response(response);
        }
        for outcome in &item.outcome_declarations {
            v.outcome(outcome);
        }
        v.constraints(item);
        v.feedback(item);
        v.template_processing(item);
        v.response_processing(item);
    });
    tracing::debug!(item = %item.identifier, errors, "validated item");
    errors
}

/// Validate a test's outcome declarations and outcome processing. Returns
/// the number of errors reported.
pub fn validate_test(test: &AssessmentTest, notifier: &mut Notifier) -> usize {
    let errors = Validator::counting(notifier, |v| {
        let mut seen = BTreeSet::new();
        for outcome in &test.outcome_declarations {
            let id = &outcome.variable.identifier;
            if !seen.insert(id.as_str()) {
                v.error(
                    &declaration_node("outcomeDeclaration", id.as_str()),
                    Some("identifier"),
                    format!("'{}' is declared more than once", id),
                );
            }
            v.variable(&outcome.variable, "outcomeDeclaration");
            v.outcome(outcome);
        }
        v.outcome_processing(test);
    });
    tracing::debug!(test = %test.identifier, errors, "validated test");
    errors
}

fn declaration_node(element: &str, identifier: &str) -> NodePath {
    NodePath::root(element).child(identifier)
}

// ──────────────────────────────────────────────
// Declarations
// ──────────────────────────────────────────────

impl Validator<'_> {
    fn declarations(&mut self, item: &AssessmentItem) {
        let mut seen = BTreeSet::new();
        for (namespace, declaration) in item.all_declarations() {
            let element = match namespace {
                VariableType::Template => "templateDeclaration",
                VariableType::Response => "responseDeclaration",
                VariableType::Outcome => "outcomeDeclaration",
            };
            let id = declaration.identifier.as_str();
            let node = declaration_node(element, id);
            if is_builtin(id) {
                self.error(
                    &node,
                    Some("identifier"),
                    format!("'{}' is a reserved built-in variable", id),
                );
            } else if !seen.insert(id) {
                self.error(
                    &node,
                    Some("identifier"),
                    format!("'{}' is declared more than once", id),
                );
            }
            self.variable(declaration, element);
        }
    }

    fn variable(&mut self, declaration: &VariableDeclaration, element: &str) {
        let node = declaration_node(element, declaration.identifier.as_str());
        if declaration.cardinality != Cardinality::Record && declaration.base_type.is_none() {
            self.error(&node, Some("baseType"), "baseType is required");
            return;
        }
        if let Err(err) = declaration.default_value() {
            self.error(&node.child("defaultValue"), None, err.to_string());
        }
    }

    fn response(&mut self, response: &ResponseDeclaration) {
        let declaration = &response.variable;
        let node = declaration_node("responseDeclaration", declaration.identifier.as_str());
        if let Err(err) = response.correct_value() {
            self.error(&node.child("correctResponse"), None, err.to_string());
        }
        if let Some(mapping) = &response.mapping {
            self.mapping(declaration, mapping, &node.child("mapping"));
        }
        if let Some(mapping) = &response.area_mapping {
            self.area_mapping(declaration, mapping, &node.child("areaMapping"));
        }
    }

    fn bounds(&mut self, node: &NodePath, lower: Option<f64>, upper: Option<f64>) {
        if let (Some(lower), Some(upper)) = (lower, upper) {
            if lower > upper {
                self.error(
                    node,
                    Some("lowerBound"),
                    format!("lower bound {} is greater than upper bound {}", lower, upper),
                );
            }
        }
    }

    fn mapping(&mut self, declaration: &VariableDeclaration, mapping: &Mapping, node: &NodePath) {
        self.bounds(node, mapping.lower_bound, mapping.upper_bound);
        let base_type = match declaration.base_type {
            Some(BaseType::File | BaseType::Duration) | None => {
                self.error(
                    node,
                    None,
                    format!(
                        "a mapping cannot be used with a {} response",
                        declaration
                            .base_type
                            .map_or_else(|| "record".to_string(), |bt| bt.to_string())
                    ),
                );
                return;
            }
            Some(bt) => bt,
        };
        for (index, entry) in mapping.map_entries.iter().enumerate() {
            if let Err(err) = SingleValue::parse(base_type, entry.map_key.trim()) {
                self.error(&node.indexed("mapEntry", index), Some("mapKey"), err.to_string());
            }
        }
    }

    fn area_mapping(&mut self, declaration: &VariableDeclaration, mapping: &AreaMapping, node: &NodePath) {
        self.bounds(node, mapping.lower_bound, mapping.upper_bound);
        if declaration.base_type != Some(BaseType::Point) {
            self.error(node, None, "an area mapping requires a point response");
        }
        for (index, entry) in mapping.area_map_entries.iter().enumerate() {
            let entry_node = node.indexed("areaMapEntry", index);
            for problem in entry.shape.coord_problems(&entry.coords) {
                self.error(&entry_node, Some("coords"), problem);
            }
        }
    }

    fn outcome(&mut self, outcome: &OutcomeDeclaration) {
        let declaration = &outcome.variable;
        let node = declaration_node("outcomeDeclaration", declaration.identifier.as_str());
        if let (Some(min), Some(max)) = (outcome.normal_minimum, outcome.normal_maximum) {
            if min > max {
                self.error(
                    &node,
                    Some("normalMinimum"),
                    format!("normal minimum {} is greater than normal maximum {}", min, max),
                );
            }
        }
        let Some(table) = &outcome.lookup_table else {
            return;
        };
        let table_node = node.child(match table {
            LookupTable::MatchTable { .. } => "matchTable",
            LookupTable::InterpolationTable { .. } => "interpolationTable",
        });
        let Some(base_type) = declaration.base_type else {
            self.error(&table_node, None, "a lookup table needs an outcome with a baseType");
            return;
        };
        if declaration.cardinality != Cardinality::Single {
            self.error(&table_node, None, "a lookup table needs a single outcome");
        }
        let targets: Vec<&str> = match table {
            LookupTable::MatchTable { entries, .. } => {
                let mut sources = BTreeSet::new();
                for (index, entry) in entries.iter().enumerate() {
                    if !sources.insert(entry.source_value) {
                        self.warning(
                            &table_node.indexed("matchTableEntry", index),
                            Some("sourceValue"),
                            format!("duplicate source value {}", entry.source_value),
                        );
                    }
                }
                entries.iter().map(|e| e.target_value.as_str()).collect()
            }
            LookupTable::InterpolationTable { entries, .. } => {
                entries.iter().map(|e| e.target_value.as_str()).collect()
            }
        };
        for literal in targets.into_iter().chain(table.default_value()) {
            if let Err(err) = SingleValue::parse(base_type, literal) {
                self.error(&table_node, Some("targetValue"), err.to_string());
            }
        }
    }

    fn constraints(&mut self, item: &AssessmentItem) {
        for constraint in &item.response_constraints {
            let id = constraint.response_identifier.as_str();
            let node = NodePath::root("responseConstraint").child(id);
            let Some(response) = item.response_declaration(id) else {
                self.error(
                    &node,
                    Some("responseIdentifier"),
                    format!("response '{}' is not declared", id),
                );
                continue;
            };
            if constraint.max_choices > 0 && constraint.min_choices > constraint.max_choices {
                self.error(
                    &node,
                    Some("minChoices"),
                    format!(
                        "minChoices {} is greater than maxChoices {}",
                        constraint.min_choices, constraint.max_choices
                    ),
                );
            }
            if response.variable.cardinality == Cardinality::Single && constraint.min_choices > 1 {
                self.warning(
                    &node,
                    Some("minChoices"),
                    "a single response cannot hold more than one choice",
                );
            }
            if let Some(pattern) = &constraint.pattern_mask {
                if let Err(err) = anchored(pattern) {
                    self.error(&node, Some("patternMask"), err.to_string());
                }
            }
        }
    }

    fn feedback(&mut self, item: &AssessmentItem) {
        for element in &item.feedback {
            let node = NodePath::root("feedback").child(element.identifier.as_str());
            let outcome = element.outcome_identifier.as_str();
            let declared = match item.declaration(outcome) {
                Some((VariableType::Outcome, d)) => Some(d.clone()),
                _ => builtin_declaration(outcome)
                    .filter(|(ns, _)| *ns == VariableType::Outcome)
                    .map(|(_, d)| d),
            };
            match declared {
                None => self.error(
                    &node,
                    Some("outcomeIdentifier"),
                    format!("outcome '{}' is not declared", outcome),
                ),
                Some(d) if d.base_type != Some(BaseType::Identifier) => self.error(
                    &node,
                    Some("outcomeIdentifier"),
                    format!("outcome '{}' must have identifier base type", outcome),
                ),
                Some(_) => {}
            }
        }
    }
}
