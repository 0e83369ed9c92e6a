//! QTI item runtime -- evaluates expressions and processing rules, and
//! drives an item session from template processing through response
//! processing.
//!
//! The runtime consumes the item document tree from `qti-core` (usually
//! deserialized from JSON) and keeps all mutable state in an
//! [`ItemSessionState`], so a session can be persisted between requests and
//! resumed with [`ItemSessionController::restore`].
//!
//! # Entry points
//!
//! - [`validate_item`] / [`validate_test`] -- static checks reported
//!   through a [`qti_core::Notifier`]
//! - [`ItemSessionController`] -- template processing, response binding,
//!   response processing, suspension and feedback queries
//! - [`TestOutcomeProcessor`] -- test-level outcome processing over the
//!   states of finished item sessions

pub mod context;
pub mod error;
pub mod expression;
pub mod feedback;
pub mod mapping;
mod rules;
pub mod session;
pub mod signature;
pub mod test_outcome;
pub mod validate;

pub use error::{EvalError, SessionError};
pub use expression::round_figures;
pub use session::{
    BindOutcome, ItemSessionController, ItemSessionState, ResponseData, SessionConfig,
    SessionStatus, TimeRecord,
};
pub use test_outcome::{TestItemState, TestOutcomeProcessor};
pub use validate::{validate_item, validate_test};
