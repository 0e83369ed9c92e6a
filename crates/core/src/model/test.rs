//! Test-level outcome processing model.

use serde::{Deserialize, Serialize};

use super::rules::OutcomeRule;
use super::OutcomeDeclaration;
use crate::identifier::Identifier;

/// The part of an assessment test needed to aggregate item results: its
/// outcome variables and the rules that compute them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentTest {
    pub identifier: Identifier,
    #[serde(default)]
    pub outcome_declarations: Vec<OutcomeDeclaration>,
    #[serde(default)]
    pub outcome_processing: Vec<OutcomeRule>,
}

impl AssessmentTest {
    pub fn outcome_declaration(&self, identifier: &str) -> Option<&OutcomeDeclaration> {
        self.outcome_declarations
            .iter()
            .find(|d| d.variable.identifier.as_str() == identifier)
    }
}
