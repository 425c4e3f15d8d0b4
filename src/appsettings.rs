use std::path::PathBuf;

use config::{Config, ConfigBuilder, ConfigError, Environment, File, builder::DefaultState};
use directories::ProjectDirs;
use serde::Deserialize;
use waterping_scheduler::delivery::ReminderMessage;

const FALLBACK_SETTINGS_PATH: &str = "./waterping-settings.json";

#[derive(Deserialize, Debug, Default)]
pub struct StorageSettings {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug)]
pub struct NotificationSettings {
    pub app_name: String,
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    /// `false` blocks desktop notifications, like a denied browser permission.
    pub allowed: bool,
}

#[derive(Deserialize, Debug)]
pub struct AppSettings {
    #[serde(default)]
    pub storage: StorageSettings,
    pub notification: NotificationSettings,
}

impl AppSettings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Self::with_defaults()?
            .add_source(File::with_name("appsettings").required(false))
            .add_source(File::with_name("appsettings.local").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    fn with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let message = ReminderMessage::default();

        Config::builder()
            .set_default("notification.app_name", "Daily Water Ping")?
            .set_default("notification.title", message.title)?
            .set_default("notification.body", message.body)?
            .set_default("notification.allowed", true)
    }

    /// Where the settings record lives: `storage.path`, else the platform data directory.
    pub fn settings_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .or_else(|| {
                ProjectDirs::from("app", "waterping", "waterping")
                    .map(|dirs| dirs.data_dir().join("settings.json"))
            })
            .unwrap_or_else(|| PathBuf::from(FALLBACK_SETTINGS_PATH))
    }

    pub fn reminder_message(&self) -> ReminderMessage {
        ReminderMessage {
            title: self.notification.title.clone(),
            body: self.notification.body.clone(),
        }
    }
}
