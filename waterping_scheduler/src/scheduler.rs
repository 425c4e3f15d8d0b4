use std::{ops::ControlFlow, sync::Arc, time::Duration};

use anyhow::anyhow;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::{self, JoinHandle},
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use waterping_models::settings::{Settings, SettingsPatch};

use crate::{
    clock::Clock,
    delivery::{NotificationSink, PermissionStatus, ReminderMessage},
    window::is_within_window,
};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

type AttemptId = u64;
type TimerGeneration = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableOutcome {
    Enabled,
    /// Permission was denied or notifications are unsupported.
    Denied,
    /// Reminders were disabled, or enabling was requested again, before permission resolved.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Disabled(Settings),
    Enable(EnableOutcome),
}

/// What the presentation layer observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub settings: Settings,
    pub permission: PermissionStatus,
    pub armed: bool,
}

#[derive(Debug)]
enum SchedulerEvent {
    SettingsChanged(Settings, oneshot::Sender<Settings>),
    UpdateSettings(SettingsPatch, oneshot::Sender<Settings>),
    RequestEnable(oneshot::Sender<EnableOutcome>),
    PermissionResolved {
        attempt: AttemptId,
        granted: bool,
    },
    Disable(oneshot::Sender<Settings>),
    Toggle(oneshot::Sender<Toggled>),
    TimerFired(TimerGeneration),
    Tick(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

#[derive(Debug)]
enum Toggled {
    Disabled(Settings),
    Enabling(oneshot::Receiver<EnableOutcome>),
}

struct ArmedTimer {
    generation: TimerGeneration,
    cancellation_token: CancellationToken,
}

impl ArmedTimer {
    fn disarm(self) {
        self.cancellation_token.cancel();
    }
}

struct PendingEnable {
    attempt: AttemptId,
    reply: oneshot::Sender<EnableOutcome>,
}

/// Handle to the reminder scheduler task.
///
/// All timing state lives in a single task; every operation on the handle is a
/// message to it, so settings changes and timer ticks are handled strictly in order.
pub struct ReminderScheduler {
    tx: mpsc::Sender<SchedulerEvent>,
    status_rx: watch::Receiver<SchedulerStatus>,
    shutdown_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ReminderScheduler {
    pub fn start(
        initial: Settings,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        message: ReminderMessage,
    ) -> Self {
        let (tx, rx) = mpsc::channel(32);
        let shutdown_token = CancellationToken::new();

        let disarmed = initial.with_enabled(false);
        let permission = sink.permission_status();
        // The actor applies `initial` before any queued event.
        let (status_tx, status_rx) = watch::channel(SchedulerStatus {
            settings: initial,
            permission,
            armed: initial.is_enabled,
        });

        let actor = SchedulerActor {
            settings: disarmed,
            permission,
            timer: None,
            last_generation: 0,
            pending_enable: None,
            last_attempt: 0,
            sink,
            clock,
            message,
            tx: tx.clone(),
            status_tx,
            shutdown_token: shutdown_token.clone(),
        };

        let task = task::spawn(actor.run(initial, rx));

        Self {
            tx,
            status_rx,
            shutdown_token,
            task: Some(task),
        }
    }

    /// Replaces the settings snapshot. The timer is always cancelled and, when the
    /// new settings are enabled, armed again with the new period.
    pub async fn on_settings_changed(&self, settings: Settings) -> anyhow::Result<Settings> {
        self.call(|reply| SchedulerEvent::SettingsChanged(settings, reply))
            .await
    }

    pub async fn update_settings(&self, patch: SettingsPatch) -> anyhow::Result<Settings> {
        self.call(|reply| SchedulerEvent::UpdateSettings(patch, reply))
            .await
    }

    /// Asks the sink for permission and enables reminders once it is granted.
    ///
    /// A [`ReminderScheduler::disable`] issued while the request is pending wins.
    pub async fn request_enable(&self) -> anyhow::Result<EnableOutcome> {
        self.call(SchedulerEvent::RequestEnable).await
    }

    pub async fn disable(&self) -> anyhow::Result<Settings> {
        self.call(SchedulerEvent::Disable).await
    }

    /// Disables reminders when they are on, otherwise requests enabling them.
    /// The decision is taken against the scheduler's current settings.
    pub async fn toggle(&self) -> anyhow::Result<ToggleOutcome> {
        match self.call(SchedulerEvent::Toggle).await? {
            Toggled::Disabled(settings) => Ok(ToggleOutcome::Disabled(settings)),
            Toggled::Enabling(outcome) => {
                let outcome = outcome
                    .await
                    .map_err(|_| anyhow!("Scheduler stopped before replying"))?;
                Ok(ToggleOutcome::Enable(outcome))
            }
        }
    }

    /// Runs one window check right away.
    pub async fn tick(&self) -> anyhow::Result<()> {
        self.call(SchedulerEvent::Tick).await
    }

    pub fn status(&self) -> SchedulerStatus {
        *self.status_rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        self.status_rx.clone()
    }

    /// Stops the timer and the scheduler task. No notification fires afterwards.
    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        let result = self.call(SchedulerEvent::Shutdown).await;

        if let Some(task) = self.task.take() {
            if time::timeout(SHUTDOWN_TIMEOUT, task).await.is_err() {
                log::warn!("Scheduler task did not stop within {SHUTDOWN_TIMEOUT:?}");
            }
        }

        result
    }

    async fn call<T>(
        &self,
        event: impl FnOnce(oneshot::Sender<T>) -> SchedulerEvent,
    ) -> anyhow::Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(event(reply_tx))
            .await
            .map_err(|_| anyhow!("Scheduler is not running"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("Scheduler stopped before replying"))
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}

struct SchedulerActor {
    settings: Settings,
    permission: PermissionStatus,
    timer: Option<ArmedTimer>,
    last_generation: TimerGeneration,
    pending_enable: Option<PendingEnable>,
    last_attempt: AttemptId,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    message: ReminderMessage,
    tx: mpsc::Sender<SchedulerEvent>,
    status_tx: watch::Sender<SchedulerStatus>,
    shutdown_token: CancellationToken,
}

impl SchedulerActor {
    async fn run(mut self, initial: Settings, mut rx: mpsc::Receiver<SchedulerEvent>) {
        log::info!("Starting reminder scheduler with {initial:?}");
        self.apply_settings(initial).await;

        loop {
            let event = tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    log::info!("Scheduler handle dropped, shutting down");
                    break;
                }
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            if self.handle_event(event).await.is_break() {
                return;
            }
        }

        self.teardown();
    }

    async fn handle_event(&mut self, event: SchedulerEvent) -> ControlFlow<()> {
        match event {
            SchedulerEvent::SettingsChanged(settings, reply) => {
                if !settings.is_enabled {
                    self.abandon_pending_enable();
                }
                let applied = self.apply_settings(settings).await;
                let _ = reply.send(applied);
            }
            SchedulerEvent::UpdateSettings(patch, reply) => {
                let applied = if patch.is_empty() {
                    self.settings
                } else {
                    self.apply_settings(self.settings.apply(&patch)).await
                };
                let _ = reply.send(applied);
            }
            SchedulerEvent::RequestEnable(reply) => self.request_enable(reply),
            SchedulerEvent::PermissionResolved { attempt, granted } => {
                self.complete_enable(attempt, granted).await
            }
            SchedulerEvent::Disable(reply) => {
                let applied = self.disable().await;
                let _ = reply.send(applied);
            }
            SchedulerEvent::Toggle(reply) => {
                if self.settings.is_enabled {
                    let applied = self.disable().await;
                    let _ = reply.send(Toggled::Disabled(applied));
                } else {
                    let (outcome_tx, outcome_rx) = oneshot::channel();
                    self.request_enable(outcome_tx);
                    let _ = reply.send(Toggled::Enabling(outcome_rx));
                }
            }
            SchedulerEvent::TimerFired(generation) => {
                if self
                    .timer
                    .as_ref()
                    .is_some_and(|timer| timer.generation == generation)
                {
                    self.tick().await;
                } else {
                    log::debug!("Discarding tick from disarmed timer {generation}");
                }
            }
            SchedulerEvent::Tick(reply) => {
                self.tick().await;
                let _ = reply.send(());
            }
            SchedulerEvent::Shutdown(reply) => {
                self.teardown();
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    async fn apply_settings(&mut self, settings: Settings) -> Settings {
        let was_enabled = self.settings.is_enabled;
        self.settings = settings;

        if let Some(timer) = self.timer.take() {
            timer.disarm();
        }

        if settings.is_enabled {
            self.arm();
        }

        self.publish_status();

        // Only the disabled -> enabled transition checks right away.
        if settings.is_enabled && !was_enabled {
            self.tick().await;
        }

        settings
    }

    async fn disable(&mut self) -> Settings {
        self.abandon_pending_enable();
        self.apply_settings(self.settings.with_enabled(false)).await
    }

    fn abandon_pending_enable(&mut self) {
        if let Some(pending) = self.pending_enable.take() {
            log::info!("Abandoning enable attempt {}", pending.attempt);
            let _ = pending.reply.send(EnableOutcome::Cancelled);
        }
    }

    fn arm(&mut self) {
        self.last_generation += 1;
        let generation = self.last_generation;
        let period = self.settings.interval.period();
        let cancellation_token = self.shutdown_token.child_token();

        log::info!("[ARM] Checking every {period:?}. Timer {generation}");

        task::spawn(run_timer(
            generation,
            period,
            self.tx.clone(),
            cancellation_token.clone(),
        ));

        self.timer = Some(ArmedTimer {
            generation,
            cancellation_token,
        });
    }

    fn request_enable(&mut self, reply: oneshot::Sender<EnableOutcome>) {
        if self.settings.is_enabled {
            let _ = reply.send(EnableOutcome::Enabled);
            return;
        }

        if let Some(previous) = self.pending_enable.take() {
            let _ = previous.reply.send(EnableOutcome::Cancelled);
        }

        self.last_attempt += 1;
        let attempt = self.last_attempt;
        self.pending_enable = Some(PendingEnable { attempt, reply });

        log::info!("Requesting notification permission. Attempt {attempt}");

        let sink = Arc::clone(&self.sink);
        let tx = self.tx.clone();
        task::spawn(async move {
            let granted = sink.request_permission().await;
            let _ = tx
                .send(SchedulerEvent::PermissionResolved { attempt, granted })
                .await;
        });
    }

    async fn complete_enable(&mut self, attempt: AttemptId, granted: bool) {
        self.permission = if granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        };

        let Some(pending) = self
            .pending_enable
            .take_if(|pending| pending.attempt == attempt)
        else {
            log::info!("Ignoring permission result of abandoned attempt {attempt}");
            self.publish_status();
            return;
        };

        if !granted {
            log::warn!("Notification permission denied, reminders stay off");
            self.publish_status();
            let _ = pending.reply.send(EnableOutcome::Denied);
            return;
        }

        if !self.settings.is_enabled {
            self.apply_settings(self.settings.with_enabled(true)).await;
        } else {
            self.publish_status();
        }
        let _ = pending.reply.send(EnableOutcome::Enabled);
    }

    async fn tick(&self) {
        if !self.settings.is_enabled {
            log::debug!("[TICK] Reminders disabled, skipping");
            return;
        }

        let now = self.clock.now();
        if is_within_window(&self.settings, now) {
            log::info!("[TICK] {now} is inside the window, sending reminder");
            self.sink
                .send(&self.message.title, &self.message.body)
                .await;
        } else {
            log::debug!(
                "[TICK] {now} is outside the window {}-{}",
                self.settings.wake_time,
                self.settings.sleep_time
            );
        }
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(SchedulerStatus {
            settings: self.settings,
            permission: self.permission,
            armed: self.timer.is_some(),
        });
    }

    fn teardown(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.disarm();
        }

        self.abandon_pending_enable();
        self.publish_status();
        log::info!("Reminder scheduler stopped");
    }
}

async fn run_timer(
    generation: TimerGeneration,
    period: Duration,
    tx: mpsc::Sender<SchedulerEvent>,
    cancellation_token: CancellationToken,
) {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => break,
            _ = interval.tick() => {
                tokio::select! {
                    _ = cancellation_token.cancelled() => break,
                    sent = tx.send(SchedulerEvent::TimerFired(generation)) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }

    log::debug!("Timer {generation} released");
}
