// Kotoba - Japanese Vocabulary Companion
// Module declarations
pub mod audio;
pub mod chat;
pub mod commands;
pub mod db;
pub mod error;
pub mod models;
pub mod producer;
pub mod resolver;
pub mod settings;
pub mod state;
pub mod store;

use std::path::PathBuf;
use std::sync::Arc;

use log::info;

use audio::output::CpalSink;
use db::connection::DatabaseConnection;
use producer::ContentProducer;
use settings::AppSettings;
use state::AppState;
use store::EntityStore;

pub use error::AppError;
pub use models::{EntityId, MediaField, MediaSlot, MediaValue, Story, WordEntry};

/// Install the global logger. `RUST_LOG` overrides the default `info` level.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Build the application state rooted at `app_dir`.
///
/// Loads settings, opens the word database when persistence is enabled, and
/// wires the store, resolver and playback controllers to the default output.
pub fn init(app_dir: PathBuf, producer: Arc<dyn ContentProducer>) -> anyhow::Result<AppState> {
    let settings = AppSettings::load(&app_dir)?;

    // Initialize store
    let store = if settings.storage.persist {
        let db_path = settings.database_path(&app_dir);
        let db = DatabaseConnection::new(db_path)?;
        EntityStore::with_database(db)?
    } else {
        EntityStore::new()
    };
    info!("[App] Store ready with {} words", store.len());

    // Initialize audio output; the device is only opened when something plays
    let sink = Arc::new(CpalSink::new(settings.audio.volume));

    Ok(AppState::new(Arc::new(store), producer, sink, settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::testing::FakeProducer;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("kotoba-app-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_init_with_defaults_is_in_memory() {
        let dir = temp_dir();
        let state = init(dir.clone(), Arc::new(FakeProducer::default())).unwrap();

        assert!(state.store.is_empty());
        assert_eq!(state.settings, AppSettings::default());
        assert!(!state.settings.database_path(&dir).exists());
    }

    #[tokio::test]
    async fn test_persisted_words_survive_restart() {
        let dir = temp_dir();
        let mut settings = AppSettings::default();
        settings.storage.persist = true;
        settings.save(&dir).unwrap();

        let first = init(dir.clone(), Arc::new(FakeProducer::default())).unwrap();
        let entry = commands::search_word(&first, "桜").await.unwrap().unwrap();
        while first.resolver.in_flight() > 0 || !first.store.get(entry.id()).unwrap().audio().is_present() {
            tokio::task::yield_now().await;
        }
        drop(first);

        let second = init(dir.clone(), Arc::new(FakeProducer::default())).unwrap();
        let restored = second.store.get(entry.id()).unwrap();
        assert_eq!(restored.kanji(), "桜");
        assert!(restored.audio().is_present());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
