//! Fatal evaluation and session errors.
//!
//! Everything here aborts the current operation. Recoverable data problems
//! (bad response syntax, unmet constraints, exhausted attempts, arithmetic
//! failures) are reported through the notifier or returned as sets instead.

use qti_core::{ModelError, NodePath, ParseError, VariableType};

use crate::session::SessionStatus;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// No variable with this identifier exists in any namespace.
    #[error("unknown variable '{identifier}'")]
    UnknownVariable { identifier: String },
    /// A value had a different cardinality than the consumer requires.
    #[error("'{identifier}' has cardinality {actual}, expected {expected}")]
    CardinalityMismatch {
        identifier: String,
        expected: String,
        actual: String,
    },
    /// A value had a different base type than the consumer requires.
    #[error("{node}: expected {expected}, got {actual}")]
    BaseTypeMismatch {
        node: NodePath,
        expected: String,
        actual: String,
    },
    /// The variable exists, but not in a namespace this lookup may read.
    #[error("'{identifier}' is not a {allowed} variable here")]
    UndeclaredVariable { identifier: String, allowed: String },
    /// mapResponse / mapResponsePoint on a response without the table.
    #[error("response '{identifier}' has no {table}")]
    MissingMapping {
        identifier: String,
        table: &'static str,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Model(#[from] ModelError),
    /// An expression was used outside the processing context it needs.
    #[error("{node}: {element} is only allowed in {context}")]
    NotAllowedHere {
        node: NodePath,
        element: &'static str,
        context: &'static str,
    },
    /// Malformed tree: wrong child count, missing operands and the like.
    #[error("{node}: {message}")]
    Structure { node: NodePath, message: String },
}

impl EvalError {
    pub(crate) fn structure(node: &NodePath, message: impl Into<String>) -> Self {
        EvalError::Structure {
            node: node.clone(),
            message: message.into(),
        }
    }

    pub(crate) fn undeclared(identifier: &str, allowed: &[VariableType]) -> Self {
        let allowed: Vec<&str> = allowed.iter().map(|t| t.as_str()).collect();
        EvalError::UndeclaredVariable {
            identifier: identifier.to_string(),
            allowed: allowed.join("/"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    /// A lifecycle method was called in the wrong state.
    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionStatus,
    },
    /// Responses were supplied for an identifier the item does not declare.
    #[error("no response variable '{0}' is declared")]
    UnknownResponse(String),
    #[error("session has already been initialized")]
    AlreadyInitialized,
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl From<ModelError> for SessionError {
    fn from(err: ModelError) -> Self {
        SessionError::Eval(EvalError::Model(err))
    }
}
