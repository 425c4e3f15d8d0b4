use async_trait::async_trait;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum PermissionStatus {
    /// Never asked.
    #[default]
    Default,
    Granted,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderMessage {
    pub title: String,
    pub body: String,
}

impl Default for ReminderMessage {
    fn default() -> Self {
        Self {
            title: "Drink water 💧".to_owned(),
            body: "Time for your scheduled hydration ping.".to_owned(),
        }
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync + 'static {
    /// Resolves to `true` iff notifications are granted, including when they already were.
    /// Unsupported facilities resolve to `false`.
    async fn request_permission(&self) -> bool;

    fn permission_status(&self) -> PermissionStatus;

    /// Fire and forget. Must be a no-op unless permission is granted at call time.
    async fn send(&self, title: &str, body: &str);
}
