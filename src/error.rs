// Error types shared across the store, resolver and playback layers
use thiserror::Error;

use crate::models::EntityId;

/// Errors raised by the entity store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Ids come from UUID v4, so this only fires on a programming error
    #[error("an entity with id {0} is already in the collection")]
    DuplicateId(EntityId),
}

/// Errors raised while decoding a speech payload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed audio payload: {0}")]
    MalformedPayload(String),
}

/// Errors raised by a playback controller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("another playback is still running on this controller")]
    Busy,
    #[error("audio output unavailable: {0}")]
    Unavailable(String),
}

/// Failure reported by the external content service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProducerError {
    #[error("content service request failed: {0}")]
    Service(String),
}

/// Failure of a lazy media resolution, shared by the caller and every joiner
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Producer(#[from] ProducerError),
    #[error(transparent)]
    Malformed(#[from] DecodeError),
    #[error("producer returned an empty value")]
    EmptyResult,
    #[error("producer did not answer within {0} seconds")]
    Timeout(u64),
    #[error("media request ended without a result")]
    Abandoned,
}

/// Top-level error returned by command handlers
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error(transparent)]
    Producer(#[from] ProducerError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("no word is currently selected")]
    NothingSelected,
    #[error("no story has been generated yet")]
    NoStory,
    #[error("unknown word id {0}")]
    UnknownEntity(EntityId),
}
