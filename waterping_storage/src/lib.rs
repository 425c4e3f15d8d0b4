mod settings_storage;

pub use settings_storage::{
    InMemorySettingsStore, JsonFileSettingsStore, SettingsStore, SettingsStoreError,
};
