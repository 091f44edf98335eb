//! Where delivered notifications end up on this machine.

use super::presenter::{DeliveredNotification, PermissionState, PresentError};

/// Shows a notification to the user. Implementations must not block for long.
pub trait DeliverySink: Send + Sync {
    fn deliver(&self, notification: &DeliveredNotification) -> Result<(), PresentError>;

    fn request_permission(&self) -> PermissionState {
        PermissionState::Granted
    }
}

/// Writes notifications to the log. Used on headless hosts.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

impl DeliverySink for LogSink {
    fn deliver(&self, notification: &DeliveredNotification) -> Result<(), PresentError> {
        tracing::info!(
            id = %notification.id,
            sound = notification.content.sound,
            "[notification] {}: {}",
            notification.content.title,
            notification.content.body
        );
        Ok(())
    }
}

/// Native desktop notifications.
#[cfg(feature = "desktop")]
#[derive(Debug, Clone)]
pub struct DesktopSink {
    app_name: String,
}

#[cfg(feature = "desktop")]
impl DesktopSink {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

#[cfg(feature = "desktop")]
impl DeliverySink for DesktopSink {
    fn deliver(&self, notification: &DeliveredNotification) -> Result<(), PresentError> {
        let mut builder = notify_rust::Notification::new();
        builder
            .appname(&self.app_name)
            .summary(&notification.content.title)
            .body(&notification.content.body);

        if notification.content.sound {
            builder.sound_name("message-new-instant");
        }

        builder
            .show()
            .map(|_| ())
            .map_err(|e| PresentError::Delivery(e.to_string()))
    }
}
