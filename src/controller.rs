use std::sync::Arc;

use waterping_models::settings::{ReminderInterval, Settings, SettingsPatch, TimeOfDay};
use waterping_scheduler::{
    EnableOutcome, ReminderScheduler, SchedulerStatus, ToggleOutcome,
    clock::Clock,
    delivery::{NotificationSink, ReminderMessage},
};
use waterping_storage::SettingsStore;

/// Turns user intent into scheduler calls and persists every resulting snapshot.
pub struct HydrationController {
    scheduler: ReminderScheduler,
    store: Arc<dyn SettingsStore>,
}

impl HydrationController {
    pub async fn start(
        store: Arc<dyn SettingsStore>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        message: ReminderMessage,
    ) -> Self {
        let settings = store.load().await;
        let scheduler = ReminderScheduler::start(settings, sink, clock, message);

        Self { scheduler, store }
    }

    pub fn status(&self) -> SchedulerStatus {
        self.scheduler.status()
    }

    pub async fn toggle(&self) -> anyhow::Result<SchedulerStatus> {
        match self.scheduler.toggle().await? {
            ToggleOutcome::Disabled(settings) => self.persist(settings).await,
            ToggleOutcome::Enable(outcome) => self.record_enable(outcome).await,
        }

        Ok(self.status())
    }

    pub async fn enable(&self) -> anyhow::Result<EnableOutcome> {
        let outcome = self.scheduler.request_enable().await?;
        self.record_enable(outcome).await;
        Ok(outcome)
    }

    pub async fn disable(&self) -> anyhow::Result<Settings> {
        let settings = self.scheduler.disable().await?;
        self.persist(settings).await;
        Ok(settings)
    }

    pub async fn set_wake_time(&self, value: &str) -> anyhow::Result<Settings> {
        let wake_time: TimeOfDay = value.parse()?;
        self.update(SettingsPatch::wake_time(wake_time)).await
    }

    pub async fn set_sleep_time(&self, value: &str) -> anyhow::Result<Settings> {
        let sleep_time: TimeOfDay = value.parse()?;
        self.update(SettingsPatch::sleep_time(sleep_time)).await
    }

    pub async fn set_interval(&self, minutes: u32) -> anyhow::Result<Settings> {
        let interval = ReminderInterval::try_from(minutes)?;
        self.update(SettingsPatch::interval(interval)).await
    }

    /// Checks the window right away, the same way a timer tick does.
    pub async fn check_now(&self) -> anyhow::Result<()> {
        self.scheduler.tick().await
    }

    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.scheduler.shutdown().await
    }

    async fn update(&self, patch: SettingsPatch) -> anyhow::Result<Settings> {
        let settings = self.scheduler.update_settings(patch).await?;
        self.persist(settings).await;
        Ok(settings)
    }

    async fn record_enable(&self, outcome: EnableOutcome) {
        match outcome {
            EnableOutcome::Enabled => self.persist(self.status().settings).await,
            EnableOutcome::Denied => log::warn!("Reminders stay off, notifications are blocked"),
            EnableOutcome::Cancelled => log::info!("Enable request was superseded"),
        }
    }

    async fn persist(&self, settings: Settings) {
        self.store.save(&settings).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use waterping_models::chrono::NaiveTime;
    use waterping_scheduler::{clock::Clock, delivery::PermissionStatus};
    use waterping_storage::{InMemorySettingsStore, JsonFileSettingsStore};

    use super::*;

    struct FixedClock(NaiveTime);

    impl Clock for FixedClock {
        fn now(&self) -> NaiveTime {
            self.0
        }
    }

    struct TestNotificationSink {
        grant: bool,
        permission: Mutex<PermissionStatus>,
        sent: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl NotificationSink for TestNotificationSink {
        async fn request_permission(&self) -> bool {
            *self.permission.lock().unwrap() = if self.grant {
                PermissionStatus::Granted
            } else {
                PermissionStatus::Denied
            };
            self.grant
        }

        fn permission_status(&self) -> PermissionStatus {
            *self.permission.lock().unwrap()
        }

        async fn send(&self, _title: &str, _body: &str) {
            if self.permission_status() == PermissionStatus::Granted {
                self.sent.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    struct TestContext {
        controller: HydrationController,
        store: Arc<InMemorySettingsStore>,
        sent: Arc<AtomicUsize>,
    }

    async fn context(store: InMemorySettingsStore, grant: bool) -> TestContext {
        let store = Arc::new(store);
        let sent = Arc::new(AtomicUsize::new(0));
        let sink = TestNotificationSink {
            grant,
            permission: Mutex::new(PermissionStatus::Default),
            sent: Arc::clone(&sent),
        };
        let clock = FixedClock(NaiveTime::from_hms_opt(12, 0, 0).unwrap());

        let controller = HydrationController::start(
            store.clone(),
            Arc::new(sink),
            Arc::new(clock),
            ReminderMessage::default(),
        )
        .await;

        TestContext {
            controller,
            store,
            sent,
        }
    }

    #[tokio::test(start_paused = true)]
    pub async fn toggling_on_should_persist_enabled_settings_and_notify() {
        let ctx = context(InMemorySettingsStore::new(), true).await;

        let status = ctx.controller.toggle().await.unwrap();

        assert!(status.settings.is_enabled);
        assert!(status.armed);
        assert_eq!(ctx.sent.load(Ordering::SeqCst), 1);
        assert!(ctx.store.load().await.is_enabled);
    }

    #[tokio::test(start_paused = true)]
    pub async fn toggling_twice_should_persist_disabled_settings() {
        let ctx = context(InMemorySettingsStore::new(), true).await;

        ctx.controller.toggle().await.unwrap();
        let status = ctx.controller.toggle().await.unwrap();

        assert!(!status.settings.is_enabled);
        assert!(!status.armed);
        assert!(!ctx.store.load().await.is_enabled);
    }

    #[tokio::test(start_paused = true)]
    pub async fn when_permission_is_denied_nothing_should_be_enabled() {
        let ctx = context(InMemorySettingsStore::new(), false).await;

        let outcome = ctx.controller.enable().await.unwrap();

        assert_eq!(outcome, EnableOutcome::Denied);
        assert_eq!(ctx.controller.status().permission, PermissionStatus::Denied);
        assert!(!ctx.controller.status().settings.is_enabled);
        assert!(ctx.store.record().await.is_none());
        assert_eq!(ctx.sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    pub async fn edits_should_be_persisted() {
        let ctx = context(InMemorySettingsStore::new(), true).await;

        ctx.controller.set_wake_time("07:15").await.unwrap();
        ctx.controller.set_sleep_time("23:45").await.unwrap();
        let settings = ctx.controller.set_interval(45).await.unwrap();

        assert_eq!(settings.wake_time.to_string(), "07:15");
        assert_eq!(settings.sleep_time.to_string(), "23:45");
        assert_eq!(settings.interval, ReminderInterval::FortyFiveMinutes);
        assert_eq!(ctx.store.load().await, settings);
    }

    #[tokio::test(start_paused = true)]
    pub async fn malformed_edits_should_be_rejected_before_reaching_scheduler() {
        let ctx = context(InMemorySettingsStore::new(), true).await;

        assert!(ctx.controller.set_wake_time("7").await.is_err());
        assert!(ctx.controller.set_sleep_time("25:00").await.is_err());
        assert!(ctx.controller.set_interval(20).await.is_err());

        assert_eq!(ctx.controller.status().settings, Settings::default());
        assert!(ctx.store.record().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    pub async fn corrupt_storage_should_start_with_defaults() {
        let ctx = context(InMemorySettingsStore::with_record("{\"wakeTime\":"), true).await;

        assert_eq!(ctx.controller.status().settings, Settings::default());
        assert!(!ctx.controller.status().armed);
    }

    #[tokio::test]
    pub async fn settings_should_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let sent = Arc::new(AtomicUsize::new(0));
        let start = |sent: Arc<AtomicUsize>| {
            HydrationController::start(
                Arc::new(JsonFileSettingsStore::new(&path)),
                Arc::new(TestNotificationSink {
                    grant: true,
                    permission: Mutex::new(PermissionStatus::Granted),
                    sent,
                }),
                Arc::new(FixedClock(NaiveTime::from_hms_opt(12, 0, 0).unwrap())),
                ReminderMessage::default(),
            )
        };

        let controller = start(Arc::clone(&sent)).await;
        controller.set_interval(90).await.unwrap();
        controller.toggle().await.unwrap();
        controller.shutdown().await.unwrap();

        let restarted = start(Arc::clone(&sent)).await;

        let status = restarted.status();
        assert!(status.settings.is_enabled);
        assert!(status.armed);
        assert_eq!(status.settings.interval, ReminderInterval::NinetyMinutes);

        // Queued behind the startup check.
        restarted.check_now().await.unwrap();
        assert_eq!(sent.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    pub async fn toggle_right_after_start_should_turn_persisted_reminders_off() {
        let record = r#"{"wakeTime":"08:00","sleepTime":"22:00","interval":60,"isEnabled":true}"#;
        let ctx = context(InMemorySettingsStore::with_record(record), true).await;

        let status = ctx.controller.toggle().await.unwrap();

        assert!(!status.settings.is_enabled);
        assert!(!status.armed);
        assert!(!ctx.store.load().await.is_enabled);
    }
}
