// Canonical word collection plus the views that mirror it
use log::{debug, info, warn};
use parking_lot::RwLock;

use crate::db::connection::DatabaseConnection;
use crate::db::operations::DbOperations;
use crate::error::StoreError;
use crate::models::{EntityId, MediaField, MediaSlot, MediaValue, Story, WordEntry};

#[derive(Default)]
struct StoreInner {
    /// Most recent first
    words: Vec<WordEntry>,
    selection: Option<WordEntry>,
    story: Option<Story>,
}

impl StoreInner {
    fn position(&self, id: &EntityId) -> Option<usize> {
        self.words.iter().position(|w| w.id() == id)
    }

    /// Every live slot holding `(id, field)`: collection entry, selection view, story
    fn slots_mut(&mut self, id: &EntityId, field: MediaField) -> Vec<&mut MediaSlot> {
        let mut slots = Vec::with_capacity(2);
        if let Some(word) = self.words.iter_mut().find(|w| w.id() == id) {
            slots.push(word.media_mut(field));
        }
        if let Some(selected) = self.selection.as_mut().filter(|w| w.id() == id) {
            slots.push(selected.media_mut(field));
        }
        if let Some(story) = self.story.as_mut().filter(|s| s.id() == id) {
            if let Some(slot) = story.media_mut(field) {
                slots.push(slot);
            }
        }
        slots
    }
}

/// Carry media that `source` already resolved (or is resolving) into `target`.
/// A present value in `target` is never downgraded.
fn merge_media(target: &mut WordEntry, source: &WordEntry) {
    for field in MediaField::ALL {
        let incoming = source.media(field);
        let slot = target.media_mut(field);
        let upgrade = match (&*slot, incoming) {
            (MediaSlot::Present(_), _) => false,
            (_, MediaSlot::Present(_)) => true,
            (MediaSlot::Absent, MediaSlot::Pending) => true,
            _ => false,
        };
        if upgrade {
            *slot = incoming.clone();
        }
    }
}

/// The only writer of word and story state.
///
/// Every mutation takes the write lock once, so readers never see a view
/// half-way through an update.
pub struct EntityStore {
    inner: RwLock<StoreInner>,
    db: Option<DatabaseConnection>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    /// Create an empty, memory-only store
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            db: None,
        }
    }

    /// Create a store that mirrors every change into `db`, seeded with its contents
    pub fn with_database(db: DatabaseConnection) -> Result<Self, anyhow::Error> {
        let words = DbOperations::load_words(&db)?;
        info!("[Store] Loaded {} words from database", words.len());

        Ok(Self {
            inner: RwLock::new(StoreInner {
                words,
                ..StoreInner::default()
            }),
            db: Some(db),
        })
    }

    /// Add a new word at the front of the collection.
    ///
    /// If the word is already selected, both copies end up with the union of
    /// their resolved media.
    pub fn insert(&self, mut word: WordEntry) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner.position(word.id()).is_some() {
            return Err(StoreError::DuplicateId(word.id().clone()));
        }

        if let Some(selected) = inner.selection.as_mut().filter(|w| w.id() == word.id()) {
            merge_media(&mut word, selected);
            merge_media(selected, &word);
        }

        if let Some(db) = &self.db {
            if let Err(e) = DbOperations::insert_word(db, &word) {
                warn!("[Store] Failed to persist word {}: {}", word.id(), e);
            }
        }

        debug!("[Store] Inserted word {} ({})", word.id(), word.kanji());
        inner.words.insert(0, word);
        Ok(())
    }

    /// Delete a word; clears the selection if it pointed at it. Unknown ids are ignored.
    pub fn remove(&self, id: &EntityId) {
        let mut inner = self.inner.write();
        if let Some(index) = inner.position(id) {
            inner.words.remove(index);
            debug!("[Store] Removed word {}", id);
        }
        if inner.selection.as_ref().is_some_and(|w| w.id() == id) {
            inner.selection = None;
        }

        if let Some(db) = &self.db {
            if let Err(e) = DbOperations::delete_word(db, id) {
                warn!("[Store] Failed to delete word {} from database: {}", id, e);
            }
        }
    }

    /// Set (or clear) the current selection.
    ///
    /// The entry does not have to be in the collection yet; a freshly
    /// analyzed word is selected before it is inserted. For a word already in
    /// the collection the collection's copy is selected, so a stale clone
    /// cannot hide media that was resolved since.
    pub fn select(&self, word: Option<WordEntry>) {
        let mut inner = self.inner.write();
        let selection = match word {
            Some(mut word) => match inner.position(word.id()) {
                Some(index) => Some(inner.words[index].clone()),
                None => {
                    if let Some(previous) = inner.selection.as_ref().filter(|w| w.id() == word.id()) {
                        merge_media(&mut word, previous);
                    }
                    Some(word)
                }
            },
            None => None,
        };
        inner.selection = selection;
    }

    /// Select a word that is already in the collection. Returns false if the id is unknown.
    pub fn select_id(&self, id: &EntityId) -> bool {
        let mut inner = self.inner.write();
        match inner.position(id) {
            Some(index) => {
                let word = inner.words[index].clone();
                inner.selection = Some(word);
                true
            }
            None => false,
        }
    }

    pub fn selection(&self) -> Option<WordEntry> {
        self.inner.read().selection.clone()
    }

    pub fn get(&self, id: &EntityId) -> Option<WordEntry> {
        let inner = self.inner.read();
        inner.position(id).map(|index| inner.words[index].clone())
    }

    /// Ordered read-only snapshot of the collection
    pub fn list(&self, filter: Option<&dyn Fn(&WordEntry) -> bool>) -> Vec<WordEntry> {
        let inner = self.inner.read();
        match filter {
            Some(keep) => inner.words.iter().filter(|w| keep(w)).cloned().collect(),
            None => inner.words.clone(),
        }
    }

    /// The `count` most recently created words
    pub fn recent(&self, count: usize) -> Vec<WordEntry> {
        let inner = self.inner.read();
        inner.words.iter().take(count).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().words.is_empty()
    }

    /// Current state of a lazy field, looking at every live view.
    /// `None` means no view holds the id.
    pub fn media_state(&self, id: &EntityId, field: MediaField) -> Option<MediaSlot> {
        let inner = self.inner.read();
        if let Some(index) = inner.position(id) {
            return Some(inner.words[index].media(field).clone());
        }
        if let Some(selected) = inner.selection.as_ref().filter(|w| w.id() == id) {
            return Some(selected.media(field).clone());
        }
        inner
            .story
            .as_ref()
            .filter(|s| s.id() == id && field == MediaField::Audio)
            .map(|s| s.audio().clone())
    }

    /// Mark an absent field as pending in every live view
    pub fn mark_pending(&self, id: &EntityId, field: MediaField) {
        let mut inner = self.inner.write();
        for slot in inner.slots_mut(id, field) {
            if !slot.is_present() {
                *slot = MediaSlot::Pending;
            }
        }
    }

    /// Put a pending field back to absent so a later request can retry
    pub fn clear_pending(&self, id: &EntityId, field: MediaField) {
        let mut inner = self.inner.write();
        for slot in inner.slots_mut(id, field) {
            if slot.is_pending() {
                *slot = MediaSlot::Absent;
            }
        }
    }

    /// Publish a resolved value to every live view of `id`.
    ///
    /// Returns false when no view holds the id any more (the entity was
    /// deleted or the story superseded); the value is then dropped.
    pub fn apply_media_result(&self, id: &EntityId, field: MediaField, value: MediaValue) -> bool {
        let mut inner = self.inner.write();
        let in_collection = inner.position(id).is_some();

        let slots = inner.slots_mut(id, field);
        if slots.is_empty() {
            debug!("[Store] Dropping stale {} result for {}", field, id);
            return false;
        }
        for slot in slots {
            *slot = MediaSlot::Present(value.clone());
        }

        if in_collection {
            if let Some(db) = &self.db {
                if let Err(e) = DbOperations::update_media(db, id, field, &value) {
                    warn!("[Store] Failed to persist {} for {}: {}", field, id, e);
                }
            }
        }
        true
    }

    /// Install a new story, superseding any previous one
    pub fn replace_story(&self, story: Story) {
        let mut inner = self.inner.write();
        if let Some(previous) = inner.story.replace(story) {
            debug!("[Store] Story {} superseded", previous.id());
        }
    }

    pub fn story(&self) -> Option<Story> {
        self.inner.read().story.clone()
    }
}
