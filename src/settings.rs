use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};
use tokio::sync::watch;

use crate::mock::{DEFAULT_ANALYZE_LATENCY, DEFAULT_CLASSIFY_LATENCY};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineSettings {
    pub classify_latency_ms: u64,
    pub analyze_latency_ms: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            classify_latency_ms: DEFAULT_CLASSIFY_LATENCY.as_millis() as u64,
            analyze_latency_ms: DEFAULT_ANALYZE_LATENCY.as_millis() as u64,
        }
    }
}

impl PipelineSettings {
    pub fn classify_latency(&self) -> Duration {
        Duration::from_millis(self.classify_latency_ms)
    }

    pub fn analyze_latency(&self) -> Duration {
        Duration::from_millis(self.analyze_latency_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserSettings {
    #[serde(default)]
    pipeline: PipelineSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
    pipeline_updates: watch::Sender<PipelineSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring unreadable settings at {}: {}",
                    path.display(),
                    err
                );
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        let (pipeline_updates, _) = watch::channel(data.pipeline.clone());

        Ok(Self {
            path,
            data: RwLock::new(data),
            pipeline_updates,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn pipeline(&self) -> PipelineSettings {
        self.read().pipeline.clone()
    }

    /// Current pipeline settings, followed by every successful update.
    pub fn subscribe_pipeline(&self) -> watch::Receiver<PipelineSettings> {
        self.pipeline_updates.subscribe()
    }

    pub fn update_pipeline(&self, settings: PipelineSettings) -> Result<()> {
        let mut guard = self.write();
        guard.pipeline = settings.clone();
        self.persist(&guard)?;
        self.pipeline_updates.send_replace(settings);
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_mock_latencies() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.classify_latency(), Duration::from_millis(2000));
        assert_eq!(settings.analyze_latency(), Duration::from_millis(1500));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.pipeline(), PipelineSettings::default());
    }

    #[test]
    fn update_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).unwrap();
        store
            .update_pipeline(PipelineSettings {
                classify_latency_ms: 10,
                analyze_latency_ms: 20,
            })
            .unwrap();

        let reloaded = SettingsStore::new(path).unwrap();
        assert_eq!(reloaded.pipeline().classify_latency_ms, 10);
        assert_eq!(reloaded.pipeline().analyze_latency_ms, 20);
    }

    #[test]
    fn subscribers_see_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        let mut updates = store.subscribe_pipeline();
        assert_eq!(*updates.borrow(), PipelineSettings::default());

        store
            .update_pipeline(PipelineSettings {
                classify_latency_ms: 10,
                analyze_latency_ms: 20,
            })
            .unwrap();
        assert!(updates.has_changed().unwrap());
        assert_eq!(updates.borrow_and_update().analyze_latency_ms, 20);
    }

    #[test]
    fn partial_file_fills_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"pipeline":{"classifyLatencyMs":5}}"#).unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.pipeline().classify_latency_ms, 5);
        assert_eq!(store.pipeline().analyze_latency_ms, 1500);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.pipeline(), PipelineSettings::default());
    }
}
