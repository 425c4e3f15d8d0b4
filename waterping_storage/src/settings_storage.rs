use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use waterping_models::settings::Settings;

#[derive(Debug, Error)]
pub enum SettingsStoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Persisted settings are malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Durable home of the settings record.
///
/// `load` and `save` never fail towards the caller: unreadable or corrupt records
/// fall back to [`Settings::default`], rejected writes are logged and dropped.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn try_load(&self) -> Result<Option<Settings>, SettingsStoreError>;
    async fn try_save(&self, settings: &Settings) -> Result<(), SettingsStoreError>;

    async fn load(&self) -> Settings {
        match self.try_load().await {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                log::info!("No persisted settings found, using defaults");
                Settings::default()
            }
            Err(error) => {
                log::warn!("Unable to load settings, using defaults. error = {error}");
                Settings::default()
            }
        }
    }

    async fn save(&self, settings: &Settings) {
        if let Err(error) = self.try_save(settings).await {
            log::error!("Unable to persist settings. error = {error}, settings = {settings:?}");
        }
    }
}

pub struct JsonFileSettingsStore {
    path: PathBuf,
}

impl JsonFileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for JsonFileSettingsStore {
    async fn try_load(&self) -> Result<Option<Settings>, SettingsStoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        if raw.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn try_save(&self, settings: &Settings) -> Result<(), SettingsStoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let raw = serde_json::to_string_pretty(settings)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, raw).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        log::debug!("Persisted settings to {}", self.path.display());
        Ok(())
    }
}

/// Keeps the encoded record in memory, same encoding as the file store.
#[derive(Default)]
pub struct InMemorySettingsStore {
    record: RwLock<Option<String>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: impl Into<String>) -> Self {
        Self {
            record: RwLock::new(Some(record.into())),
        }
    }

    pub async fn record(&self) -> Option<String> {
        self.record.read().await.clone()
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn try_load(&self) -> Result<Option<Settings>, SettingsStoreError> {
        match self.record.read().await.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
        }
    }

    async fn try_save(&self, settings: &Settings) -> Result<(), SettingsStoreError> {
        let raw = serde_json::to_string(settings)?;
        *self.record.write().await = Some(raw);
        Ok(())
    }
}
