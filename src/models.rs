// Data models
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity of a word or story. Never reused, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One example sentence attached to a word
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleSentence {
    pub japanese: String,
    pub romaji: String,
    pub english: String,
    pub chinese: String,
}

/// Analysis fields returned by the content service for a looked-up word.
/// Field names follow the service's JSON schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordAnalysis {
    pub kanji: String,
    pub kana: String,
    pub romaji: String,
    pub meaning: String,
    pub meaning_zh: String,
    pub examples: Vec<ExampleSentence>,
}

/// A lazily generated media value (base64 PCM for audio, a data URL for images).
///
/// Cloning shares the underlying buffer, so every view of an entity that
/// observed the same update holds the very same allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaValue(Arc<str>);

impl MediaValue {
    pub fn new(value: impl Into<Arc<str>>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when both values point at the same shared buffer
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// State of a lazily computed field
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum MediaSlot {
    #[default]
    Absent,
    Pending,
    Present(MediaValue),
}

impl MediaSlot {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn value(&self) -> Option<&MediaValue> {
        match self {
            Self::Present(value) => Some(value),
            _ => None,
        }
    }
}

impl From<Option<MediaValue>> for MediaSlot {
    fn from(value: Option<MediaValue>) -> Self {
        value.map_or(Self::Absent, Self::Present)
    }
}

/// Which lazy field of an entity a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaField {
    Audio,
    Image,
}

impl MediaField {
    pub const ALL: [MediaField; 2] = [MediaField::Audio, MediaField::Image];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for MediaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key of one lazily resolved value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaKey {
    pub id: EntityId,
    pub field: MediaField,
}

impl MediaKey {
    pub fn new(id: EntityId, field: MediaField) -> Self {
        Self { id, field }
    }
}

impl fmt::Display for MediaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.id, self.field)
    }
}

/// A vocabulary record.
///
/// Analysis fields are fixed at creation. The media slots can only be
/// written through [`crate::store::EntityStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordEntry {
    id: EntityId,
    kanji: String,
    kana: String,
    romaji: String,
    meaning: String,
    meaning_zh: String,
    examples: Vec<ExampleSentence>,
    audio: MediaSlot,
    image: MediaSlot,
    created_at: DateTime<Utc>,
}

impl WordEntry {
    /// Create a brand new entry from a service analysis
    pub fn new(analysis: WordAnalysis) -> Self {
        Self::with_id(EntityId::generate(), analysis, Utc::now())
    }

    /// Build an entry with a known identity (used when loading from storage)
    pub fn with_id(id: EntityId, analysis: WordAnalysis, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            kanji: analysis.kanji,
            kana: analysis.kana,
            romaji: analysis.romaji,
            meaning: analysis.meaning,
            meaning_zh: analysis.meaning_zh,
            examples: analysis.examples,
            audio: MediaSlot::Absent,
            image: MediaSlot::Absent,
            created_at,
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn kanji(&self) -> &str {
        &self.kanji
    }

    pub fn kana(&self) -> &str {
        &self.kana
    }

    pub fn romaji(&self) -> &str {
        &self.romaji
    }

    pub fn meaning(&self) -> &str {
        &self.meaning
    }

    pub fn meaning_zh(&self) -> &str {
        &self.meaning_zh
    }

    pub fn examples(&self) -> &[ExampleSentence] {
        &self.examples
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn audio(&self) -> &MediaSlot {
        &self.audio
    }

    pub fn image(&self) -> &MediaSlot {
        &self.image
    }

    pub fn media(&self, field: MediaField) -> &MediaSlot {
        match field {
            MediaField::Audio => &self.audio,
            MediaField::Image => &self.image,
        }
    }

    pub(crate) fn media_mut(&mut self, field: MediaField) -> &mut MediaSlot {
        match field {
            MediaField::Audio => &mut self.audio,
            MediaField::Image => &mut self.image,
        }
    }

    /// Seed a media slot while building an entry outside the store
    pub(crate) fn with_media(mut self, field: MediaField, slot: MediaSlot) -> Self {
        *self.media_mut(field) = slot;
        self
    }
}

/// Story text as produced by the content service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryText {
    pub title: String,
    pub japanese: String,
    pub english: String,
}

/// The single live short story woven from recently learned words
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    id: EntityId,
    title: String,
    japanese: String,
    english: String,
    date: String,
    audio: MediaSlot,
}

impl Story {
    pub fn new(text: StoryText) -> Self {
        Self {
            id: EntityId::generate(),
            title: text.title,
            japanese: text.japanese,
            english: text.english,
            date: Local::now().format("%Y-%m-%d").to_string(),
            audio: MediaSlot::Absent,
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn japanese(&self) -> &str {
        &self.japanese
    }

    pub fn english(&self) -> &str {
        &self.english
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn audio(&self) -> &MediaSlot {
        &self.audio
    }

    /// Stories only carry audio; an image request targets nothing
    pub(crate) fn media_mut(&mut self, field: MediaField) -> Option<&mut MediaSlot> {
        match field {
            MediaField::Audio => Some(&mut self.audio),
            MediaField::Image => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis() -> WordAnalysis {
        WordAnalysis {
            kanji: "猫".to_string(),
            kana: "ねこ".to_string(),
            romaji: "neko".to_string(),
            meaning: "cat".to_string(),
            meaning_zh: "猫".to_string(),
            examples: vec![],
        }
    }

    #[test]
    fn test_new_entries_get_distinct_ids() {
        let a = WordEntry::new(analysis());
        let b = WordEntry::new(analysis());
        assert_ne!(a.id(), b.id());
        assert_eq!(a.audio(), &MediaSlot::Absent);
        assert_eq!(a.image(), &MediaSlot::Absent);
    }

    #[test]
    fn test_analysis_parses_service_json() {
        let json = r#"{
            "kanji": "雷", "kana": "かみなり", "romaji": "kaminari",
            "meaning": "thunder", "meaningZh": "雷",
            "examples": [{"japanese": "雷が鳴る", "romaji": "kaminari ga naru",
                          "english": "Thunder rumbles", "chinese": "打雷"}]
        }"#;
        let parsed: WordAnalysis = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.meaning_zh, "雷");
        assert_eq!(parsed.examples.len(), 1);
    }

    #[test]
    fn test_media_value_sharing() {
        let value = MediaValue::new("abc");
        let clone = value.clone();
        assert!(value.ptr_eq(&clone));
        assert!(!value.ptr_eq(&MediaValue::new("abc")));
    }

    #[test]
    fn test_story_has_no_image_slot() {
        let mut story = Story::new(StoryText {
            title: "t".to_string(),
            japanese: "j".to_string(),
            english: "e".to_string(),
        });
        assert!(story.media_mut(MediaField::Image).is_none());
        assert!(story.media_mut(MediaField::Audio).is_some());
    }
}
