//! Validation and runtime diagnostics.
//!
//! A [`Notifier`] is passed explicitly through every validation walk and
//! evaluation. Firing a notification appends it to the notifier's log,
//! forwards it to registered listeners and mirrors it as a `tracing` event.
//! Firing never aborts the caller.
//!
//! The notifier supports a single checkpoint: between
//! [`Notifier::set_checkpoint`] and [`Notifier::clear_checkpoint`] it counts
//! notifications at or above a threshold level, which lets a caller ask
//! "did this sub-walk report any errors?" without diffing logs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node::NodePath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NotificationLevel::Info => "info",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationType {
    /// Static problems in the item model found before evaluation.
    ModelValidation,
    /// Problems found while processing a session.
    Runtime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub node: NodePath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    pub notification_type: NotificationType,
    pub level: NotificationLevel,
    pub message: String,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.level, self.node)?;
        if let Some(attribute) = &self.attribute {
            write!(f, " (@{})", attribute)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Receives every notification fired through a [`Notifier`].
pub trait NotificationListener: Send {
    fn on_notification(&mut self, notification: &Notification);
}

impl<F> NotificationListener for F
where
    F: FnMut(&Notification) + Send,
{
    fn on_notification(&mut self, notification: &Notification) {
        self(notification)
    }
}

#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    level: NotificationLevel,
    count: usize,
}

#[derive(Default)]
pub struct Notifier {
    log: Vec<Notification>,
    listeners: Vec<Box<dyn NotificationListener>>,
    checkpoint: Option<Checkpoint>,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("log", &self.log)
            .field("listeners", &self.listeners.len())
            .field("checkpoint", &self.checkpoint)
            .finish()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&mut self, listener: impl NotificationListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn fire(&mut self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => tracing::error!(
                node = %notification.node,
                attribute = notification.attribute.as_deref(),
                kind = ?notification.notification_type,
                "{}",
                notification.message
            ),
            NotificationLevel::Warning => tracing::warn!(
                node = %notification.node,
                attribute = notification.attribute.as_deref(),
                kind = ?notification.notification_type,
                "{}",
                notification.message
            ),
            NotificationLevel::Info => tracing::info!(
                node = %notification.node,
                attribute = notification.attribute.as_deref(),
                kind = ?notification.notification_type,
                "{}",
                notification.message
            ),
        }
        if let Some(checkpoint) = self.checkpoint.as_mut() {
            if notification.level >= checkpoint.level {
                checkpoint.count += 1;
            }
        }
        for listener in &mut self.listeners {
            listener.on_notification(&notification);
        }
        self.log.push(notification);
    }

    fn fire_with(
        &mut self,
        notification_type: NotificationType,
        level: NotificationLevel,
        node: &NodePath,
        attribute: Option<&str>,
        message: impl Into<String>,
    ) {
        self.fire(Notification {
            node: node.clone(),
            attribute: attribute.map(str::to_string),
            notification_type,
            level,
            message: message.into(),
        });
    }

    pub fn fire_validation_error(
        &mut self,
        node: &NodePath,
        attribute: Option<&str>,
        message: impl Into<String>,
    ) {
        self.fire_with(
            NotificationType::ModelValidation,
            NotificationLevel::Error,
            node,
            attribute,
            message,
        );
    }

    pub fn fire_validation_warning(
        &mut self,
        node: &NodePath,
        attribute: Option<&str>,
        message: impl Into<String>,
    ) {
        self.fire_with(
            NotificationType::ModelValidation,
            NotificationLevel::Warning,
            node,
            attribute,
            message,
        );
    }

    pub fn fire_runtime_error(&mut self, node: &NodePath, message: impl Into<String>) {
        self.fire_with(
            NotificationType::Runtime,
            NotificationLevel::Error,
            node,
            None,
            message,
        );
    }

    pub fn fire_runtime_warning(&mut self, node: &NodePath, message: impl Into<String>) {
        self.fire_with(
            NotificationType::Runtime,
            NotificationLevel::Warning,
            node,
            None,
            message,
        );
    }

    pub fn fire_runtime_info(&mut self, node: &NodePath, message: impl Into<String>) {
        self.fire_with(
            NotificationType::Runtime,
            NotificationLevel::Info,
            node,
            None,
            message,
        );
    }

    /// Start counting notifications at or above `level`.
    ///
    /// # Panics
    ///
    /// Panics if a checkpoint is already active. Checkpoints do not nest.
    pub fn set_checkpoint(&mut self, level: NotificationLevel) {
        assert!(
            self.checkpoint.is_none(),
            "notification checkpoint already active"
        );
        self.checkpoint = Some(Checkpoint { level, count: 0 });
    }

    /// Stop counting and return the number of notifications counted since
    /// [`Notifier::set_checkpoint`].
    ///
    /// # Panics
    ///
    /// Panics if no checkpoint is active.
    pub fn clear_checkpoint(&mut self) -> usize {
        match self.checkpoint.take() {
            Some(checkpoint) => checkpoint.count,
            None => panic!("no notification checkpoint is active"),
        }
    }

    pub fn has_checkpoint(&self) -> bool {
        self.checkpoint.is_some()
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.log
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.log)
    }

    pub fn count_at_least(&self, level: NotificationLevel) -> usize {
        self.log.iter().filter(|n| n.level >= level).count()
    }

    pub fn has_errors(&self) -> bool {
        self.count_at_least(NotificationLevel::Error) > 0
    }
}
