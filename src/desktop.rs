use std::sync::Mutex;

use async_trait::async_trait;
use notify_rust::Notification;
use tokio::task;
use waterping_scheduler::delivery::{NotificationSink, PermissionStatus};

use crate::appsettings::NotificationSettings;

/// Delivers reminders through the desktop notification server.
///
/// Desktop servers never prompt, so permission only depends on `notification.allowed`.
pub struct DesktopNotificationSink {
    app_name: String,
    icon: Option<String>,
    allowed: bool,
    permission: Mutex<PermissionStatus>,
}

impl DesktopNotificationSink {
    pub fn new(settings: &NotificationSettings) -> Self {
        let permission = if settings.allowed {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        };

        Self {
            app_name: settings.app_name.clone(),
            icon: settings.icon.clone(),
            allowed: settings.allowed,
            permission: Mutex::new(permission),
        }
    }

    fn set_permission(&self, status: PermissionStatus) {
        match self.permission.lock() {
            Ok(mut permission) => *permission = status,
            Err(poisoned) => *poisoned.into_inner() = status,
        }
    }

    fn notification(&self, title: &str, body: &str) -> Notification {
        let mut notification = Notification::new();
        notification.appname(&self.app_name).summary(title).body(body);
        if let Some(icon) = &self.icon {
            notification.icon(icon);
        }
        notification
    }
}

#[async_trait]
impl NotificationSink for DesktopNotificationSink {
    async fn request_permission(&self) -> bool {
        let status = if self.allowed {
            PermissionStatus::Granted
        } else {
            log::warn!("Desktop notifications are blocked by configuration");
            PermissionStatus::Denied
        };

        self.set_permission(status);
        status == PermissionStatus::Granted
    }

    fn permission_status(&self) -> PermissionStatus {
        match self.permission.lock() {
            Ok(permission) => *permission,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    async fn send(&self, title: &str, body: &str) {
        if self.permission_status() != PermissionStatus::Granted {
            log::debug!("Notification permission not granted, dropping reminder");
            return;
        }

        let notification = self.notification(title, body);
        let shown = task::spawn_blocking(move || {
            notification
                .show()
                .map(|_| ())
                .map_err(|error| error.to_string())
        })
        .await;

        match shown {
            Ok(Ok(())) => log::info!("Reminder notification shown"),
            Ok(Err(error)) => log::error!("Unable to show notification. error = {error}"),
            Err(error) => log::error!("Notification task failed. error = {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification_settings(allowed: bool) -> NotificationSettings {
        NotificationSettings {
            app_name: "Daily Water Ping".to_owned(),
            title: "Drink water".to_owned(),
            body: "Ping".to_owned(),
            icon: None,
            allowed,
        }
    }

    #[tokio::test]
    pub async fn when_allowed_permission_should_be_granted() {
        let sink = DesktopNotificationSink::new(&notification_settings(true));

        assert_eq!(sink.permission_status(), PermissionStatus::Granted);
        assert!(sink.request_permission().await);
        assert_eq!(sink.permission_status(), PermissionStatus::Granted);
    }

    #[tokio::test]
    pub async fn when_blocked_permission_should_be_denied() {
        let sink = DesktopNotificationSink::new(&notification_settings(false));

        assert_eq!(sink.permission_status(), PermissionStatus::Denied);
        assert!(!sink.request_permission().await);
        assert_eq!(sink.permission_status(), PermissionStatus::Denied);

        // Never reaches the notification server.
        sink.send("Drink water", "Ping").await;
    }
}
