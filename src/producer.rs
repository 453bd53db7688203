// Content producer capability
// The generative service behind analysis, speech, imagery, stories and chat
use async_trait::async_trait;

use crate::chat::ChatTurn;
use crate::error::ProducerError;
use crate::models::{StoryText, WordAnalysis, WordEntry};

/// External service producing word analyses and lazily generated media.
///
/// Every call may fail arbitrarily; callers treat all failures alike.
#[async_trait]
pub trait ContentProducer: Send + Sync + 'static {
    /// Analyze a looked-up word
    async fn analyze(&self, word: &str) -> Result<WordAnalysis, ProducerError>;

    /// Synthesize speech as base64 mono PCM16 at the decoder's sample rate
    async fn synthesize_speech(&self, text: &str) -> Result<String, ProducerError>;

    /// Generate an illustrative image; an empty string means "nothing generated"
    async fn generate_image(&self, word: &str, meaning: &str) -> Result<String, ProducerError>;

    /// Weave a short story from the given words
    async fn generate_story(&self, words: &[WordEntry]) -> Result<StoryText, ProducerError>;

    /// Answer a tutoring question about `word` given the conversation so far
    async fn chat(
        &self,
        word: &WordEntry,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<String, ProducerError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::audio::decoder::encode_pcm16;
    use crate::models::ExampleSentence;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Deterministic in-process producer with call counters
    pub struct FakeProducer {
        pub speech: Mutex<Result<String, ProducerError>>,
        pub image: Mutex<Result<String, ProducerError>>,
        pub chat_reply: Mutex<Result<String, ProducerError>>,
        pub delay: Duration,
        pub analyze_calls: AtomicUsize,
        pub speech_calls: AtomicUsize,
        pub image_calls: AtomicUsize,
        pub story_calls: AtomicUsize,
        pub spoken: Mutex<Vec<String>>,
    }

    impl Default for FakeProducer {
        fn default() -> Self {
            Self {
                speech: Mutex::new(Ok(encode_pcm16(&[0, 16384, -16384, 32767]))),
                image: Mutex::new(Ok("data:image/png;base64,iVBORw0KGgo=".to_string())),
                chat_reply: Mutex::new(Ok("It means cat.".to_string())),
                delay: Duration::from_millis(20),
                analyze_calls: AtomicUsize::new(0),
                speech_calls: AtomicUsize::new(0),
                image_calls: AtomicUsize::new(0),
                story_calls: AtomicUsize::new(0),
                spoken: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ContentProducer for FakeProducer {
        async fn analyze(&self, word: &str) -> Result<WordAnalysis, ProducerError> {
            self.analyze_calls.fetch_add(1, Ordering::SeqCst);
            if word == "fail" {
                return Err(ProducerError::Service("analysis unavailable".to_string()));
            }
            Ok(WordAnalysis {
                kanji: word.to_string(),
                kana: format!("{}かな", word),
                romaji: "romaji".to_string(),
                meaning: format!("meaning of {}", word),
                meaning_zh: "意思".to_string(),
                examples: vec![ExampleSentence {
                    japanese: format!("{}です", word),
                    romaji: "desu".to_string(),
                    english: "It is".to_string(),
                    chinese: "是".to_string(),
                }],
            })
        }

        async fn synthesize_speech(&self, text: &str) -> Result<String, ProducerError> {
            self.speech_calls.fetch_add(1, Ordering::SeqCst);
            self.spoken.lock().push(text.to_string());
            tokio::time::sleep(self.delay).await;
            self.speech.lock().clone()
        }

        async fn generate_image(&self, _word: &str, _meaning: &str) -> Result<String, ProducerError> {
            self.image_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.image.lock().clone()
        }

        async fn generate_story(&self, words: &[WordEntry]) -> Result<StoryText, ProducerError> {
            self.story_calls.fetch_add(1, Ordering::SeqCst);
            let list: Vec<&str> = words.iter().map(|w| w.kanji()).collect();
            Ok(StoryText {
                title: "物語".to_string(),
                japanese: list.join("、"),
                english: format!("A story about {} words", words.len()),
            })
        }

        async fn chat(
            &self,
            _word: &WordEntry,
            _history: &[ChatTurn],
            _message: &str,
        ) -> Result<String, ProducerError> {
            self.chat_reply.lock().clone()
        }
    }
}
