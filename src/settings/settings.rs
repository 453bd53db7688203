// Settings management and persistence
use anyhow::Context;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::decoder::DEFAULT_SAMPLE_RATE;

/// Audio settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub sample_rate: u32, // Rate of the speech service's PCM output
    pub volume: f32,      // 0.0-1.0
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            volume: 1.0,
        }
    }
}

/// Story settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorySettings {
    pub word_count: usize, // How many recent words feed a story
}

impl Default for StorySettings {
    fn default() -> Self {
        Self { word_count: 5 }
    }
}

/// Storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub persist: bool, // Keep the collection in SQLite between runs
    pub database_file: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            persist: false,
            database_file: "kotoba.db".to_string(),
        }
    }
}

/// Media resolver settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub producer_timeout_secs: Option<u64>, // None = rely on the service's own policy
}

impl ResolverSettings {
    pub fn producer_timeout(&self) -> Option<Duration> {
        self.producer_timeout_secs.map(Duration::from_secs)
    }
}

/// Main application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub version: i32, // Settings schema version for future migrations
    pub audio: AudioSettings,
    pub story: StorySettings,
    pub storage: StorageSettings,
    pub resolver: ResolverSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: 1,
            audio: AudioSettings::default(),
            story: StorySettings::default(),
            storage: StorageSettings::default(),
            resolver: ResolverSettings::default(),
        }
    }
}

impl AppSettings {
    /// Get the settings file path
    pub fn get_settings_path(app_dir: &Path) -> PathBuf {
        app_dir.join("settings.json")
    }

    /// Get the database file path
    pub fn database_path(&self, app_dir: &Path) -> PathBuf {
        app_dir.join(&self.storage.database_file)
    }

    /// Load settings from file, or return defaults if file doesn't exist
    pub fn load(app_dir: &Path) -> anyhow::Result<Self> {
        let path = Self::get_settings_path(app_dir);

        if !path.exists() {
            info!("[Settings] No settings file found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file {:?}", path))?;

        let settings: AppSettings = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings {:?}", path))?;

        info!("[Settings] Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to file
    pub fn save(&self, app_dir: &Path) -> anyhow::Result<()> {
        // Ensure directory exists
        fs::create_dir_all(app_dir)
            .with_context(|| format!("Failed to create settings directory {:?}", app_dir))?;

        let path = Self::get_settings_path(app_dir);
        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialize settings")?;

        fs::write(&path, content)
            .with_context(|| format!("Failed to write settings file {:?}", path))?;

        info!("[Settings] Saved settings to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("kotoba-settings-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = temp_dir();
        let settings = AppSettings::load(&dir).unwrap();
        assert_eq!(settings, AppSettings::default());
        assert_eq!(settings.audio.sample_rate, 24_000);
        assert_eq!(settings.story.word_count, 5);
    }

    #[test]
    fn test_save_then_load() {
        let dir = temp_dir();
        let mut settings = AppSettings::default();
        settings.storage.persist = true;
        settings.resolver.producer_timeout_secs = Some(30);
        settings.save(&dir).unwrap();

        let loaded = AppSettings::load(&dir).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.resolver.producer_timeout(), Some(Duration::from_secs(30)));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = temp_dir();
        fs::create_dir_all(&dir).unwrap();
        fs::write(AppSettings::get_settings_path(&dir), r#"{"story": {"word_count": 3}}"#).unwrap();

        let loaded = AppSettings::load(&dir).unwrap();
        assert_eq!(loaded.story.word_count, 3);
        assert_eq!(loaded.audio, AudioSettings::default());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = temp_dir();
        fs::create_dir_all(&dir).unwrap();
        fs::write(AppSettings::get_settings_path(&dir), "{ not json").unwrap();

        assert!(AppSettings::load(&dir).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }
}
