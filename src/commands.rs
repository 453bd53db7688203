// Command handlers
// One async function per user action; all state goes through AppState
use std::future::Future;
use std::sync::Arc;

use log::{info, warn};

use crate::audio::decoder::DecodedAudio;
use crate::audio::player::PlaybackController;
use crate::chat::{Transcript, APOLOGY_TEXT};
use crate::error::{AppError, PlaybackError, ProducerError};
use crate::models::{EntityId, MediaField, MediaValue, Story, WordEntry};
use crate::producer::ContentProducer;
use crate::state::AppState;

/// Speech request for `text`, detached from the caller's borrows
fn speech(
    producer: &Arc<dyn ContentProducer>,
    text: &str,
) -> impl FnOnce() -> std::pin::Pin<Box<dyn Future<Output = Result<String, ProducerError>> + Send>> {
    let producer = Arc::clone(producer);
    let text = text.to_string();
    move || Box::pin(async move { producer.synthesize_speech(&text).await })
}

/// Reject early when the widget is already playing, before paying for synthesis
fn ensure_idle(player: &PlaybackController) -> Result<(), AppError> {
    if player.is_playing() {
        return Err(PlaybackError::Busy.into());
    }
    Ok(())
}

async fn play(player: &PlaybackController, audio: DecodedAudio) -> Result<(), AppError> {
    if audio.is_empty() {
        return Ok(());
    }
    player.play_decoded(audio).await?;
    Ok(())
}

// ===== Word Commands =====

/// Analyze a word, add it to the collection and select it.
///
/// Speech for the new word is prefetched in the background.
pub async fn search_word(state: &AppState, input: &str) -> Result<Option<WordEntry>, AppError> {
    let word = input.trim();
    if word.is_empty() {
        return Ok(None);
    }

    let analysis = state.producer.analyze(word).await?;
    let entry = WordEntry::new(analysis);
    info!("[Commands] Analyzed {:?} as {}", word, entry.id());

    state.store.select(Some(entry.clone()));
    state.store.insert(entry.clone())?;

    prefetch_word_audio(state, &entry);
    Ok(Some(entry))
}

/// Start resolving a word's audio without waiting for it
pub fn prefetch_word_audio(state: &AppState, word: &WordEntry) {
    let resolver = state.resolver.clone();
    let id = word.id().clone();
    let producer = speech(&state.producer, word.kanji());

    tokio::spawn(async move {
        if let Err(e) = resolver.ensure(&id, MediaField::Audio, producer).await {
            warn!("[Commands] Audio prefetch for {} failed: {}", id, e);
        }
    });
}

/// Make a word from the collection the current selection
pub fn select_word(state: &AppState, id: &EntityId) -> Result<WordEntry, AppError> {
    if !state.store.select_id(id) {
        return Err(AppError::UnknownEntity(id.clone()));
    }
    state.store.selection().ok_or_else(|| AppError::UnknownEntity(id.clone()))
}

pub fn delete_word(state: &AppState, id: &EntityId) {
    state.store.remove(id);
}

pub fn list_words(state: &AppState) -> Vec<WordEntry> {
    state.store.list(None)
}

/// Generate (or reuse) the illustration for the selected word
pub async fn generate_image(state: &AppState) -> Result<MediaValue, AppError> {
    let word = state.store.selection().ok_or(AppError::NothingSelected)?;

    let producer = Arc::clone(&state.producer);
    let kanji = word.kanji().to_string();
    let meaning = word.meaning().to_string();

    let image = state
        .resolver
        .ensure(word.id(), MediaField::Image, move || async move {
            producer.generate_image(&kanji, &meaning).await
        })
        .await?;
    Ok(image)
}

// ===== Playback Commands =====

/// Play the selected word, synthesizing its audio on first use
pub async fn play_word_audio(state: &AppState) -> Result<(), AppError> {
    let word = state.store.selection().ok_or(AppError::NothingSelected)?;
    ensure_idle(&state.players.word)?;

    let audio = state
        .resolver
        .ensure_audio(word.id(), speech(&state.producer, word.kanji()))
        .await?;
    play(&state.players.word, audio).await
}

/// Play a word from the history list
pub async fn play_history_audio(state: &AppState, id: &EntityId) -> Result<(), AppError> {
    let word = state
        .store
        .get(id)
        .ok_or_else(|| AppError::UnknownEntity(id.clone()))?;
    ensure_idle(&state.players.history)?;

    let audio = state
        .resolver
        .ensure_audio(word.id(), speech(&state.producer, word.kanji()))
        .await?;
    play(&state.players.history, audio).await
}

/// Speak an example sentence. Sentence audio is not cached.
pub async fn play_sentence(state: &AppState, text: &str) -> Result<(), AppError> {
    ensure_idle(&state.players.sentence)?;

    let payload = state.producer.synthesize_speech(text).await?;
    let audio = state.resolver.decoder().decode(&payload)?;
    play(&state.players.sentence, audio).await
}

// ===== Story Commands =====

/// Return the live story, creating one if none exists yet
pub async fn open_story(state: &AppState) -> Result<Option<Story>, AppError> {
    if let Some(story) = state.store.story() {
        return Ok(Some(story));
    }
    regenerate_story(state).await
}

/// Weave a new story from the most recent words, superseding the old one
pub async fn regenerate_story(state: &AppState) -> Result<Option<Story>, AppError> {
    let recent = state.store.recent(state.settings.story.word_count);
    if recent.is_empty() {
        return Ok(None);
    }

    let text = state.producer.generate_story(&recent).await?;
    let story = Story::new(text);
    info!("[Commands] New story {} from {} words", story.id(), recent.len());

    state.store.replace_story(story.clone());
    Ok(Some(story))
}

/// Read the live story aloud
pub async fn play_story(state: &AppState) -> Result<(), AppError> {
    let story = state.store.story().ok_or(AppError::NoStory)?;
    ensure_idle(&state.players.story)?;

    let audio = state
        .resolver
        .ensure_audio(story.id(), speech(&state.producer, story.japanese()))
        .await?;
    play(&state.players.story, audio).await
}

// ===== Chat Commands =====

/// Ask the tutor about the transcript's word.
///
/// A failed reply still leaves an apology turn in the transcript.
pub async fn send_chat_message(
    state: &AppState,
    transcript: &mut Transcript,
    message: &str,
) -> Result<Option<String>, AppError> {
    let message = message.trim();
    if message.is_empty() {
        return Ok(None);
    }

    let word = state
        .store
        .get(transcript.word_id())
        .or_else(|| state.store.selection().filter(|w| w.id() == transcript.word_id()))
        .ok_or_else(|| AppError::UnknownEntity(transcript.word_id().clone()))?;

    let history = transcript.turns().to_vec();
    transcript.push_user(message);

    match state.producer.chat(&word, &history, message).await {
        Ok(reply) => {
            transcript.push_assistant(reply.clone());
            Ok(Some(reply))
        }
        Err(e) => {
            warn!("[Commands] Chat about {} failed: {}", word.id(), e);
            transcript.push_assistant(APOLOGY_TEXT);
            Err(e.into())
        }
    }
}
