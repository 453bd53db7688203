// Tutor chat transcript tied to one word
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{EntityId, WordEntry};

/// Reply recorded when the tutor could not answer
pub const APOLOGY_TEXT: &str = "Sorry, I lost my train of thought. Try again?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

/// One turn of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    fn now(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only conversation about a single word.
///
/// Attaching a different word wipes the history and reseeds the greeting.
/// Never persisted.
#[derive(Debug, Clone)]
pub struct Transcript {
    word_id: EntityId,
    turns: Vec<ChatTurn>,
}

impl Transcript {
    pub fn new(word: &WordEntry) -> Self {
        Self {
            word_id: word.id().clone(),
            turns: vec![Self::greeting(word)],
        }
    }

    fn greeting(word: &WordEntry) -> ChatTurn {
        ChatTurn::now(
            Speaker::Assistant,
            format!(
                "Hi! I'm your tutor for \"{}\". Ask me about nuance, grammar, or usage!",
                word.kanji()
            ),
        )
    }

    /// Point the transcript at `word`; resets only when the identity changes
    pub fn attach(&mut self, word: &WordEntry) -> bool {
        if &self.word_id == word.id() {
            return false;
        }
        *self = Self::new(word);
        true
    }

    pub fn word_id(&self) -> &EntityId {
        &self.word_id
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(ChatTurn::now(Speaker::User, text));
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.turns.push(ChatTurn::now(Speaker::Assistant, text));
    }
}
