// Lazy media resolver
// Computes each (entity, field) value at most once at a time and publishes it through the store
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::audio::decoder::{AudioDecoder, DecodedAudio};
use crate::error::{ProducerError, ResolveError};
use crate::models::{EntityId, MediaField, MediaKey, MediaSlot, MediaValue};
use crate::store::EntityStore;

type Outcome = Option<Result<MediaValue, ResolveError>>;

struct ResolverInner {
    store: Arc<EntityStore>,
    decoder: AudioDecoder,
    timeout: Option<Duration>,
    /// One receiver per outstanding request; joiners clone it
    in_flight: Mutex<HashMap<MediaKey, watch::Receiver<Outcome>>>,
}

/// Deduplicating resolver for lazily generated media.
///
/// Cheap to clone; clones share the in-flight table.
#[derive(Clone)]
pub struct MediaResolver {
    inner: Arc<ResolverInner>,
}

impl MediaResolver {
    pub fn new(store: Arc<EntityStore>, decoder: AudioDecoder) -> Self {
        Self::with_timeout(store, decoder, None)
    }

    /// Like [`MediaResolver::new`] but gives every producer call a deadline
    pub fn with_timeout(store: Arc<EntityStore>, decoder: AudioDecoder, timeout: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(ResolverInner {
                store,
                decoder,
                timeout,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.inner.store
    }

    pub fn decoder(&self) -> &AudioDecoder {
        &self.inner.decoder
    }

    /// Number of producer calls currently outstanding
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    /// Make sure `field` of `id` holds a value.
    ///
    /// A present value is returned without calling `producer`. If a request
    /// for the same key is outstanding the caller joins it. Otherwise the
    /// producer runs on its own task, so it finishes even if this caller goes
    /// away. The result is published through
    /// [`EntityStore::apply_media_result`], which drops it if the entity is gone.
    pub async fn ensure<F, Fut>(
        &self,
        id: &EntityId,
        field: MediaField,
        producer: F,
    ) -> Result<MediaValue, ResolveError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, ProducerError>> + Send + 'static,
    {
        let key = MediaKey::new(id.clone(), field);

        let mut rx = {
            // Checking the store and registering happen under one lock, and
            // completion clears the entry under the same lock, so no second
            // producer can start between "pending" and "present"
            let mut in_flight = self.inner.in_flight.lock();

            if let Some(MediaSlot::Present(value)) = self.inner.store.media_state(id, field) {
                return Ok(value);
            }

            match in_flight.get(&key) {
                Some(rx) => {
                    debug!("[Resolver] Joining in-flight request for {}", key);
                    rx.clone()
                }
                None => {
                    // Build the future before registering so a panicking
                    // constructor leaves nothing behind
                    let work = producer();

                    let (tx, rx) = watch::channel(None);
                    in_flight.insert(key.clone(), rx.clone());
                    self.inner.store.mark_pending(id, field);

                    debug!("[Resolver] Starting producer for {}", key);
                    let flight = Flight {
                        inner: Arc::clone(&self.inner),
                        key,
                        tx: Some(tx),
                    };
                    tokio::spawn(Self::drive(flight, work));
                    rx
                }
            }
        };

        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        outcome.unwrap_or(Err(ResolveError::Abandoned))
    }

    /// Ensure the audio field and decode it for playback
    pub async fn ensure_audio<F, Fut>(&self, id: &EntityId, producer: F) -> Result<DecodedAudio, ResolveError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, ProducerError>> + Send + 'static,
    {
        let value = self.ensure(id, MediaField::Audio, producer).await?;
        Ok(self.inner.decoder.decode(value.as_str())?)
    }

    /// Run one producer call to completion and publish its outcome
    async fn drive<Fut>(flight: Flight, work: Fut)
    where
        Fut: Future<Output = Result<String, ProducerError>> + Send + 'static,
    {
        let produced = match flight.inner.timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(result) => result.map_err(ResolveError::from),
                Err(_) => Err(ResolveError::Timeout(limit.as_secs())),
            },
            None => work.await.map_err(ResolveError::from),
        };
        let outcome = produced.and_then(|raw| Self::validate(&flight.inner.decoder, flight.key.field, raw));
        flight.finish(outcome);
    }

    /// Reject empty results and audio the decoder cannot read
    fn validate(decoder: &AudioDecoder, field: MediaField, raw: String) -> Result<MediaValue, ResolveError> {
        if raw.trim().is_empty() {
            return Err(ResolveError::EmptyResult);
        }
        if field == MediaField::Audio {
            decoder.decode(&raw)?;
        }
        Ok(MediaValue::new(raw))
    }
}

/// One registered producer call. Publishes its outcome exactly once, and
/// reports `Abandoned` if the driving task unwinds before finishing.
struct Flight {
    inner: Arc<ResolverInner>,
    key: MediaKey,
    tx: Option<watch::Sender<Outcome>>,
}

impl Flight {
    fn finish(mut self, outcome: Result<MediaValue, ResolveError>) {
        self.publish(outcome);
    }

    fn publish(&mut self, outcome: Result<MediaValue, ResolveError>) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        let inner = &self.inner;
        let key = &self.key;

        // Completion happens under the in-flight lock, like registration
        let mut in_flight = inner.in_flight.lock();
        match &outcome {
            Ok(value) => {
                if inner.store.apply_media_result(&key.id, key.field, value.clone()) {
                    info!("[Resolver] Resolved {}", key);
                } else {
                    debug!("[Resolver] {} resolved after its owner went away", key);
                }
            }
            Err(e) => {
                warn!("[Resolver] Failed to resolve {}: {}", key, e);
                inner.store.clear_pending(&key.id, key.field);
            }
        }
        tx.send_replace(Some(outcome));
        in_flight.remove(key);
    }
}

impl Drop for Flight {
    fn drop(&mut self) {
        if self.tx.is_some() {
            self.publish(Err(ResolveError::Abandoned));
        }
    }
}
