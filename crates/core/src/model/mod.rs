//! The item document tree.
//!
//! These types are the in-memory form of an assessment item after it has
//! been read and attribute-validated by an external loader. They are plain
//! data: immutable during a session and shared read-only between sessions.
//! Static checks that need the whole tree (expression typing, occurrence
//! counts, outcome-processing-only expressions) live in `qti-eval`.

pub mod expression;
pub mod mapping;
pub mod rules;
pub mod shape;
pub mod test;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::identifier::Identifier;
use crate::value::{BaseType, Cardinality, SingleValue, Value};

pub use expression::{Expression, ExpressionKind};
pub use mapping::{AreaMapping, LookupTable, Mapping};
pub use rules::{Condition, OutcomeRule, ResponseRule, TemplateRule};
pub use shape::Shape;
pub use test::AssessmentTest;

// ──────────────────────────────────────────────
// Built-in variables
// ──────────────────────────────────────────────

/// Response variable: attempts counted so far.
pub const NUM_ATTEMPTS: &str = "numAttempts";
/// Response variable: seconds spent in the item.
pub const DURATION: &str = "duration";
/// Outcome variable: `not_attempted`, `unknown`, `incomplete` or `completed`.
pub const COMPLETION_STATUS: &str = "completionStatus";

pub const COMPLETION_NOT_ATTEMPTED: &str = "not_attempted";
pub const COMPLETION_UNKNOWN: &str = "unknown";
pub const COMPLETION_INCOMPLETE: &str = "incomplete";
pub const COMPLETION_COMPLETED: &str = "completed";

pub fn is_builtin(identifier: &str) -> bool {
    matches!(identifier, NUM_ATTEMPTS | DURATION | COMPLETION_STATUS)
}

// ──────────────────────────────────────────────
// Declarations
// ──────────────────────────────────────────────

/// The three session namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VariableType {
    Template,
    Response,
    Outcome,
}

impl VariableType {
    pub fn as_str(self) -> &'static str {
        match self {
            VariableType::Template => "template",
            VariableType::Response => "response",
            VariableType::Outcome => "outcome",
        }
    }
}

impl std::fmt::Display for VariableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value literal inside a declaration: plain text, or a record field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueLiteral {
    Plain(String),
    #[serde(rename_all = "camelCase")]
    Field {
        field_identifier: Identifier,
        base_type: BaseType,
        value: String,
    },
}

impl ValueLiteral {
    pub fn text(&self) -> &str {
        match self {
            ValueLiteral::Plain(text) => text,
            ValueLiteral::Field { value, .. } => value,
        }
    }
}

impl From<&str> for ValueLiteral {
    fn from(text: &str) -> Self {
        ValueLiteral::Plain(text.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDeclaration {
    pub identifier: Identifier,
    pub cardinality: Cardinality,
    /// Absent only for record cardinality.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_type: Option<BaseType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_value: Vec<ValueLiteral>,
}

impl VariableDeclaration {
    pub fn new(identifier: Identifier, cardinality: Cardinality, base_type: Option<BaseType>) -> Self {
        VariableDeclaration {
            identifier,
            cardinality,
            base_type,
            default_value: Vec::new(),
        }
    }

    pub fn with_default(mut self, literals: Vec<ValueLiteral>) -> Self {
        self.default_value = literals;
        self
    }

    /// The declared default, or Null when none is declared.
    pub fn default_value(&self) -> Result<Value, ModelError> {
        self.literal_value(&self.default_value)
    }

    /// Read literals as a value of this declaration's cardinality and type.
    pub fn literal_value(&self, literals: &[ValueLiteral]) -> Result<Value, ModelError> {
        if literals.is_empty() {
            return Ok(Value::Null);
        }
        if self.cardinality == Cardinality::Record {
            let mut fields = Vec::with_capacity(literals.len());
            for literal in literals {
                match literal {
                    ValueLiteral::Field {
                        field_identifier,
                        base_type,
                        value,
                    } => {
                        let parsed = SingleValue::parse(*base_type, value).map_err(|source| {
                            ModelError::Value {
                                identifier: self.identifier.clone(),
                                source,
                            }
                        })?;
                        fields.push((field_identifier.clone(), parsed));
                    }
                    ValueLiteral::Plain(_) => {
                        return Err(ModelError::RecordFieldMissing(self.identifier.clone()))
                    }
                }
            }
            return Ok(Value::record(fields));
        }
        let base_type = self
            .base_type
            .ok_or_else(|| ModelError::MissingBaseType(self.identifier.clone()))?;
        if self.cardinality == Cardinality::Single && literals.len() > 1 {
            return Err(ModelError::TooManyValues {
                identifier: self.identifier.clone(),
                count: literals.len(),
            });
        }
        let items = literals
            .iter()
            .map(|literal| {
                SingleValue::parse(base_type, literal.text()).map_err(|source| ModelError::Value {
                    identifier: self.identifier.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::from_items(self.cardinality, base_type, items))
    }

    pub fn is_single_numeric(&self) -> bool {
        self.cardinality == Cardinality::Single && self.base_type.is_some_and(BaseType::is_numeric)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDeclaration {
    #[serde(flatten)]
    pub variable: VariableDeclaration,
    #[serde(default)]
    pub param_variable: bool,
    #[serde(default)]
    pub math_variable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDeclaration {
    #[serde(flatten)]
    pub variable: VariableDeclaration,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub correct_response: Vec<ValueLiteral>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<Mapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_mapping: Option<AreaMapping>,
}

impl ResponseDeclaration {
    /// The declared correct response, or Null when none is declared.
    pub fn correct_value(&self) -> Result<Value, ModelError> {
        self.variable.literal_value(&self.correct_response)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeDeclaration {
    #[serde(flatten)]
    pub variable: VariableDeclaration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal_maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal_minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_table: Option<LookupTable>,
}

// ──────────────────────────────────────────────
// Feedback and response constraints
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VisibilityMode {
    #[default]
    ShowIfMatch,
    HideIfMatch,
}

/// Feedback content gated on an outcome variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackElement {
    pub outcome_identifier: Identifier,
    pub identifier: Identifier,
    #[serde(default)]
    pub show_hide: VisibilityMode,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
}

/// Interaction-level limits on a bound response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseConstraint {
    pub response_identifier: Identifier,
    #[serde(default)]
    pub min_choices: usize,
    /// 0 means unlimited.
    #[serde(default)]
    pub max_choices: usize,
    #[serde(default)]
    pub min_strings: usize,
    /// Regular expression the whole string response must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_mask: Option<String>,
}

// ──────────────────────────────────────────────
// Item
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentItem {
    pub identifier: Identifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub adaptive: bool,
    #[serde(default)]
    pub time_dependent: bool,
    #[serde(default)]
    pub template_declarations: Vec<TemplateDeclaration>,
    #[serde(default)]
    pub response_declarations: Vec<ResponseDeclaration>,
    #[serde(default)]
    pub outcome_declarations: Vec<OutcomeDeclaration>,
    #[serde(default)]
    pub template_processing: Vec<TemplateRule>,
    #[serde(default)]
    pub response_processing: Vec<ResponseRule>,
    #[serde(default)]
    pub feedback: Vec<FeedbackElement>,
    #[serde(default)]
    pub response_constraints: Vec<ResponseConstraint>,
}

impl AssessmentItem {
    pub fn new(identifier: Identifier) -> Self {
        AssessmentItem {
            identifier,
            title: None,
            adaptive: false,
            time_dependent: false,
            template_declarations: Vec::new(),
            response_declarations: Vec::new(),
            outcome_declarations: Vec::new(),
            template_processing: Vec::new(),
            response_processing: Vec::new(),
            feedback: Vec::new(),
            response_constraints: Vec::new(),
        }
    }

    pub fn template_declaration(&self, identifier: &str) -> Option<&TemplateDeclaration> {
        self.template_declarations
            .iter()
            .find(|d| d.variable.identifier.as_str() == identifier)
    }

    pub fn response_declaration(&self, identifier: &str) -> Option<&ResponseDeclaration> {
        self.response_declarations
            .iter()
            .find(|d| d.variable.identifier.as_str() == identifier)
    }

    pub fn outcome_declaration(&self, identifier: &str) -> Option<&OutcomeDeclaration> {
        self.outcome_declarations
            .iter()
            .find(|d| d.variable.identifier.as_str() == identifier)
    }

    /// Find a declaration in any namespace.
    pub fn declaration(&self, identifier: &str) -> Option<(VariableType, &VariableDeclaration)> {
        if let Some(d) = self.template_declaration(identifier) {
            return Some((VariableType::Template, &d.variable));
        }
        if let Some(d) = self.response_declaration(identifier) {
            return Some((VariableType::Response, &d.variable));
        }
        self.outcome_declaration(identifier)
            .map(|d| (VariableType::Outcome, &d.variable))
    }

    pub fn response_constraint(&self, identifier: &str) -> Option<&ResponseConstraint> {
        self.response_constraints
            .iter()
            .find(|c| c.response_identifier.as_str() == identifier)
    }

    pub fn all_declarations(&self) -> impl Iterator<Item = (VariableType, &VariableDeclaration)> {
        self.template_declarations
            .iter()
            .map(|d| (VariableType::Template, &d.variable))
            .chain(
                self.response_declarations
                    .iter()
                    .map(|d| (VariableType::Response, &d.variable)),
            )
            .chain(
                self.outcome_declarations
                    .iter()
                    .map(|d| (VariableType::Outcome, &d.variable)),
            )
    }

    /// Structural checks on declarations: unique identifiers across all
    /// namespaces, no shadowed built-ins, and readable default and correct
    /// values.
    pub fn check_declarations(&self) -> Result<(), ModelError> {
        let mut seen = BTreeSet::new();
        for (_, declaration) in self.all_declarations() {
            if is_builtin(declaration.identifier.as_str()) {
                return Err(ModelError::ReservedIdentifier(declaration.identifier.clone()));
            }
            if !seen.insert(declaration.identifier.as_str()) {
                return Err(ModelError::DuplicateDeclaration(declaration.identifier.clone()));
            }
            declaration.default_value()?;
        }
        for response in &self.response_declarations {
            response.correct_value()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> AssessmentItem {
        serde_json::from_value(json!({
            "identifier": "choice",
            "responseDeclarations": [{
                "identifier": "RESPONSE",
                "cardinality": "multiple",
                "baseType": "identifier",
                "correctResponse": ["A", "C"]
            }],
            "outcomeDeclarations": [{
                "identifier": "SCORE",
                "cardinality": "single",
                "baseType": "float",
                "defaultValue": ["0"]
            }, {
                "identifier": "POS",
                "cardinality": "record",
                "defaultValue": [{"fieldIdentifier": "x", "baseType": "integer", "value": "3"}]
            }]
        }))
        .unwrap()
    }

    #[test]
    fn finds_declarations_by_namespace() {
        let item = sample();
        assert!(matches!(
            item.declaration("RESPONSE"),
            Some((VariableType::Response, _))
        ));
        assert!(matches!(
            item.declaration("SCORE"),
            Some((VariableType::Outcome, _))
        ));
        assert!(item.declaration("MISSING").is_none());
        assert!(item.check_declarations().is_ok());
    }

    #[test]
    fn reads_defaults_and_correct_responses() {
        let item = sample();
        let score = item.outcome_declaration("SCORE").unwrap();
        assert_eq!(score.variable.default_value().unwrap(), Value::float(0.0));
        let correct = item.response_declaration("RESPONSE").unwrap().correct_value().unwrap();
        assert_eq!(correct.len(), 2);
        let pos = item.outcome_declaration("POS").unwrap().variable.default_value().unwrap();
        assert_eq!(
            pos.as_record().and_then(|r| r.get("x")),
            Some(&SingleValue::Integer(3))
        );
    }

    #[test]
    fn rejects_duplicates_and_builtins() {
        let mut item = sample();
        item.outcome_declarations.push(item.outcome_declarations[0].clone());
        assert!(matches!(
            item.check_declarations(),
            Err(ModelError::DuplicateDeclaration(_))
        ));

        let mut item = sample();
        item.outcome_declarations[0].variable.identifier = Identifier::new(DURATION).unwrap();
        assert!(matches!(
            item.check_declarations(),
            Err(ModelError::ReservedIdentifier(_))
        ));
    }

    #[test]
    fn single_cardinality_takes_one_literal() {
        let decl = VariableDeclaration::new(
            Identifier::new("X").unwrap(),
            Cardinality::Single,
            Some(BaseType::Integer),
        )
        .with_default(vec!["1".into(), "2".into()]);
        assert!(matches!(
            decl.default_value(),
            Err(ModelError::TooManyValues { count: 2, .. })
        ));
    }
}
