//! qti-core: value model, diagnostics and item document tree for the QTI
//! item runtime.
//!
//! # Public API
//!
//! Key types are re-exported at the crate root for convenience:
//!
//! - [`Identifier`] -- validated name token
//! - [`Value`], [`SingleValue`], [`Cardinality`], [`BaseType`] -- runtime
//!   values with Null collapse and QTI equality
//! - [`Notifier`], [`Notification`] -- validation and runtime diagnostics
//! - [`NodePath`] -- location of a node in the item tree
//! - [`AssessmentItem`] and the rest of [`model`] -- the item document tree
//!
//! Evaluation and the session lifecycle live in `qti-eval`.

pub mod error;
pub mod identifier;
pub mod model;
pub mod node;
pub mod notification;
pub mod value;

// ── Convenience re-exports ───────────────────────────────────────────

pub use error::{ModelError, ParseError, ValueFormatError};
pub use identifier::{Identifier, IdentifierError};
pub use model::{AssessmentItem, AssessmentTest, Expression, ExpressionKind, VariableType};
pub use node::NodePath;
pub use notification::{
    Notification, NotificationLevel, NotificationListener, NotificationType, Notifier,
};
pub use value::{BaseType, Cardinality, FileValue, SingleValue, Value};
