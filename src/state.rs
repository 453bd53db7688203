// Application state management
use std::sync::Arc;

use crate::audio::decoder::AudioDecoder;
use crate::audio::output::AudioSink;
use crate::audio::player::PlaybackController;
use crate::producer::ContentProducer;
use crate::resolver::MediaResolver;
use crate::settings::AppSettings;
use crate::store::EntityStore;

/// One playback controller per widget, so only genuine double-clicks collide
pub struct Players {
    pub word: PlaybackController,
    pub sentence: PlaybackController,
    pub story: PlaybackController,
    pub history: PlaybackController,
}

impl Players {
    pub fn new(sink: Arc<dyn AudioSink>) -> Self {
        Self {
            word: PlaybackController::new("word", Arc::clone(&sink)),
            sentence: PlaybackController::new("sentence", Arc::clone(&sink)),
            story: PlaybackController::new("story", Arc::clone(&sink)),
            history: PlaybackController::new("history", sink),
        }
    }
}

/// Everything a command needs, created at startup and dropped at exit
pub struct AppState {
    pub store: Arc<EntityStore>,
    pub resolver: MediaResolver,
    pub producer: Arc<dyn ContentProducer>,
    pub players: Players,
    pub settings: AppSettings,
}

impl AppState {
    pub fn new(
        store: Arc<EntityStore>,
        producer: Arc<dyn ContentProducer>,
        sink: Arc<dyn AudioSink>,
        settings: AppSettings,
    ) -> Self {
        let resolver = MediaResolver::with_timeout(
            Arc::clone(&store),
            AudioDecoder::new(settings.audio.sample_rate),
            settings.resolver.producer_timeout(),
        );

        Self {
            store,
            resolver,
            producer,
            players: Players::new(sink),
            settings,
        }
    }
}
