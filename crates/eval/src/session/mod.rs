//! Item sessions: the lifecycle state machine and its serializable state.
//!
//! ```text
//! NotInitialized → Initialized → TemplateProcessed → Entered
//!     → (ResponseBound ⇄ Attempted) → Closed
//! ```
//!
//! Any entered state may be suspended and resumed. See
//! [`ItemSessionController`] for the operations.

mod binding;
mod controller;
mod scope;
mod timing;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use qti_core::model::{
    VariableDeclaration, COMPLETION_STATUS, DURATION, NUM_ATTEMPTS,
};
use qti_core::{BaseType, Cardinality, Identifier, Value, VariableType};
use serde::{Deserialize, Serialize};

use crate::error::EvalError;

pub use binding::ResponseData;
pub use controller::{BindOutcome, ItemSessionController};
pub use timing::TimeRecord;

// ──────────────────────────────────────────────
// Configuration
// ──────────────────────────────────────────────

fn default_max_template_processing_tries() -> u32 {
    100
}

/// Per-session settings supplied by the delivery layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct SessionConfig {
    /// Attempts allowed for non-adaptive items; 0 means unlimited.
    pub max_attempts: u32,
    /// Template processing passes before constraints are abandoned.
    #[serde(default = "default_max_template_processing_tries")]
    pub max_template_processing_tries: u32,
    /// Seed for the session's random source.
    pub seed: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            max_attempts: 0,
            max_template_processing_tries: default_max_template_processing_tries(),
            seed: 0,
        }
    }
}

// ──────────────────────────────────────────────
// Status
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    NotInitialized,
    Initialized,
    TemplateProcessed,
    Entered,
    ResponseBound,
    Attempted,
    Suspended,
    Closed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::NotInitialized => "not initialized",
            SessionStatus::Initialized => "initialized",
            SessionStatus::TemplateProcessed => "template processed",
            SessionStatus::Entered => "entered",
            SessionStatus::ResponseBound => "response bound",
            SessionStatus::Attempted => "attempted",
            SessionStatus::Suspended => "suspended",
            SessionStatus::Closed => "closed",
        }
    }

    /// The candidate is interacting with the item.
    pub fn is_open(self) -> bool {
        matches!(
            self,
            SessionStatus::Entered | SessionStatus::ResponseBound | SessionStatus::Attempted
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Built-in variables
// ──────────────────────────────────────────────

/// Declaration of a built-in variable, with its namespace.
pub fn builtin_declaration(identifier: &str) -> Option<(VariableType, VariableDeclaration)> {
    let (namespace, base_type) = match identifier {
        NUM_ATTEMPTS => (VariableType::Response, BaseType::Integer),
        DURATION => (VariableType::Response, BaseType::Float),
        COMPLETION_STATUS => (VariableType::Outcome, BaseType::Identifier),
        _ => return None,
    };
    let identifier = Identifier::new(identifier).ok()?;
    Some((
        namespace,
        VariableDeclaration::new(identifier, Cardinality::Single, Some(base_type)),
    ))
}

// ──────────────────────────────────────────────
// State
// ──────────────────────────────────────────────

/// Everything a session knows about one candidate's progress through an
/// item. Serializable so a delivery layer can snapshot and restore it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSessionState {
    status: SessionStatus,
    /// Status to return to on resume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resume_status: Option<SessionStatus>,
    #[serde(default)]
    template_values: BTreeMap<Identifier, Value>,
    #[serde(default)]
    response_values: BTreeMap<Identifier, Value>,
    #[serde(default)]
    outcome_values: BTreeMap<Identifier, Value>,
    /// `setDefaultValue` results for this session.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    overridden_defaults: BTreeMap<Identifier, Value>,
    /// `setCorrectResponse` results for this session.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    overridden_correct_responses: BTreeMap<Identifier, Value>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    bad_responses: BTreeSet<Identifier>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    invalid_responses: BTreeSet<Identifier>,
    #[serde(default)]
    time: TimeRecord,
}

impl Default for ItemSessionState {
    fn default() -> Self {
        ItemSessionState {
            status: SessionStatus::NotInitialized,
            resume_status: None,
            template_values: BTreeMap::new(),
            response_values: BTreeMap::new(),
            outcome_values: BTreeMap::new(),
            overridden_defaults: BTreeMap::new(),
            overridden_correct_responses: BTreeMap::new(),
            bad_responses: BTreeSet::new(),
            invalid_responses: BTreeSet::new(),
            time: TimeRecord::default(),
        }
    }
}

impl ItemSessionState {
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn values(&self, namespace: VariableType) -> &BTreeMap<Identifier, Value> {
        match namespace {
            VariableType::Template => &self.template_values,
            VariableType::Response => &self.response_values,
            VariableType::Outcome => &self.outcome_values,
        }
    }

    fn values_mut(&mut self, namespace: VariableType) -> &mut BTreeMap<Identifier, Value> {
        match namespace {
            VariableType::Template => &mut self.template_values,
            VariableType::Response => &mut self.response_values,
            VariableType::Outcome => &mut self.outcome_values,
        }
    }

    pub fn template_value(&self, identifier: &str) -> Option<&Value> {
        self.template_values.get(identifier)
    }

    pub fn response_value(&self, identifier: &str) -> Option<&Value> {
        self.response_values.get(identifier)
    }

    pub fn outcome_value(&self, identifier: &str) -> Option<&Value> {
        self.outcome_values.get(identifier)
    }

    /// Which namespace holds `identifier`, if any.
    pub fn namespace_of(&self, identifier: &str) -> Option<VariableType> {
        [
            VariableType::Template,
            VariableType::Response,
            VariableType::Outcome,
        ]
        .into_iter()
        .find(|ns| self.values(*ns).contains_key(identifier))
    }

    /// Value of `identifier`, searching only the `allowed` namespaces.
    pub fn lookup(&self, identifier: &str, allowed: &[VariableType]) -> Result<Value, EvalError> {
        for namespace in allowed {
            if let Some(value) = self.values(*namespace).get(identifier) {
                return Ok(value.clone());
            }
        }
        match self.namespace_of(identifier) {
            Some(_) => Err(EvalError::undeclared(identifier, allowed)),
            None => Err(EvalError::UnknownVariable {
                identifier: identifier.to_string(),
            }),
        }
    }

    pub fn num_attempts(&self) -> i32 {
        self.response_values
            .get(NUM_ATTEMPTS)
            .and_then(Value::as_integer)
            .unwrap_or(0)
    }

    /// Seconds recorded in the `duration` variable.
    pub fn duration(&self) -> f64 {
        self.response_values
            .get(DURATION)
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    }

    pub fn completion_status(&self) -> Option<&str> {
        self.outcome_values
            .get(COMPLETION_STATUS)
            .and_then(Value::as_identifier)
            .map(Identifier::as_str)
    }

    pub fn overridden_default(&self, identifier: &str) -> Option<&Value> {
        self.overridden_defaults.get(identifier)
    }

    pub fn overridden_correct_response(&self, identifier: &str) -> Option<&Value> {
        self.overridden_correct_responses.get(identifier)
    }

    /// Responses whose raw data could not be read at the last binding.
    pub fn bad_responses(&self) -> &BTreeSet<Identifier> {
        &self.bad_responses
    }

    /// Responses that failed their constraints at the last validation.
    pub fn invalid_responses(&self) -> &BTreeSet<Identifier> {
        &self.invalid_responses
    }

    pub fn time(&self) -> &TimeRecord {
        &self.time
    }
}
