//! Load/save diagnostics.
//!
//! Non-fatal issues met while converting between a file format and the
//! canonical pattern (a layer boundary a format cannot store, a stop that has
//! to be written as a color change, a thread color that was snapped to the
//! nearest catalog entry) are collected as [`Notification`]s instead of
//! being dropped silently. Each one is also emitted as a `tracing` event.

use std::fmt;

/// Category of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationType {
    /// Part of the pattern has no representation in the format and was left out.
    FeatureDropped,
    /// Something was written or read in an approximated form.
    Degraded,
    /// Header field or value was unusual but loading continued.
    Warning,
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FeatureDropped => write!(f, "FeatureDropped"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Warning => write!(f, "Warning"),
        }
    }
}

/// A single notification produced during a load or save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub notification_type: NotificationType,
    /// Identifier of the format adapter that raised it.
    pub format: &'static str,
    pub message: String,
}

impl Notification {
    pub fn new(
        notification_type: NotificationType,
        format: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            notification_type,
            format,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.notification_type, self.format, self.message)
    }
}

/// Collects notifications during one load/save call.
#[derive(Debug, Clone, Default)]
pub struct NotificationCollection {
    items: Vec<Notification>,
}

impl NotificationCollection {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Record a notification and mirror it to `tracing`.
    pub fn notify(
        &mut self,
        notification_type: NotificationType,
        format: &'static str,
        message: impl Into<String>,
    ) {
        let n = Notification::new(notification_type, format, message);
        match n.notification_type {
            NotificationType::Warning => tracing::warn!(format = n.format, "{}", n.message),
            _ => tracing::debug!(format = n.format, kind = %n.notification_type, "{}", n.message),
        }
        self.items.push(n);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Notification> {
        self.items.iter()
    }

    /// All notifications of a specific type.
    pub fn of_type(&self, nt: NotificationType) -> Vec<&Notification> {
        self.items.iter().filter(|n| n.notification_type == nt).collect()
    }

    pub fn has_type(&self, nt: NotificationType) -> bool {
        self.items.iter().any(|n| n.notification_type == nt)
    }

    pub fn into_vec(self) -> Vec<Notification> {
        self.items
    }
}

impl IntoIterator for NotificationCollection {
    type Item = Notification;
    type IntoIter = std::vec::IntoIter<Notification>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a NotificationCollection {
    type Item = &'a Notification;
    type IntoIter = std::slice::Iter<'a, Notification>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
