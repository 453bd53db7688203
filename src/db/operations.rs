// Database operations
use chrono::{DateTime, Utc};
use rusqlite::params;
use crate::db::connection::DatabaseConnection;
use crate::models::{EntityId, ExampleSentence, MediaField, MediaSlot, MediaValue, WordAnalysis, WordEntry};

/// Raw column values of one `words` row
struct WordRow {
    id: String,
    kanji: String,
    kana: String,
    romaji: String,
    meaning: String,
    meaning_zh: String,
    examples: String,
    audio: Option<String>,
    image: Option<String>,
    created_at: i64,
}

/// Database operations for the word collection
pub struct DbOperations;

impl DbOperations {
    /// Insert a new word. Only present media values are written.
    pub fn insert_word(
        db: &DatabaseConnection,
        word: &WordEntry,
    ) -> Result<(), anyhow::Error> {
        let examples = serde_json::to_string(word.examples())?;
        let audio = word.audio().value().map(MediaValue::as_str);
        let image = word.image().value().map(MediaValue::as_str);

        let conn = db.get_connection();
        let conn = conn.lock();

        conn.execute(
            "INSERT INTO words (id, kanji, kana, romaji, meaning, meaning_zh, examples, audio, image, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                word.id().as_str(),
                word.kanji(),
                word.kana(),
                word.romaji(),
                word.meaning(),
                word.meaning_zh(),
                examples,
                audio,
                image,
                word.created_at().timestamp_millis(),
            ],
        )?;

        Ok(())
    }

    /// Delete a word by id. Deleting an unknown id is not an error.
    pub fn delete_word(
        db: &DatabaseConnection,
        id: &EntityId,
    ) -> Result<(), anyhow::Error> {
        let conn = db.get_connection();
        let conn = conn.lock();

        conn.execute("DELETE FROM words WHERE id = ?1", params![id.as_str()])?;

        Ok(())
    }

    /// Store a resolved media value for a word
    pub fn update_media(
        db: &DatabaseConnection,
        id: &EntityId,
        field: MediaField,
        value: &MediaValue,
    ) -> Result<(), anyhow::Error> {
        let conn = db.get_connection();
        let conn = conn.lock();

        // Column names come from a closed enum, never from input
        let sql = match field {
            MediaField::Audio => "UPDATE words SET audio = ?1 WHERE id = ?2",
            MediaField::Image => "UPDATE words SET image = ?1 WHERE id = ?2",
        };
        conn.execute(sql, params![value.as_str(), id.as_str()])?;

        Ok(())
    }

    /// Load every stored word, most recent first
    pub fn load_words(db: &DatabaseConnection) -> Result<Vec<WordEntry>, anyhow::Error> {
        let rows = {
            let conn = db.get_connection();
            let conn = conn.lock();

            let mut stmt = conn.prepare(
                "SELECT id, kanji, kana, romaji, meaning, meaning_zh, examples, audio, image, created_at
                 FROM words
                 ORDER BY created_at DESC, rowid DESC",
            )?;

            let rows = stmt
                .query_map([], |row| {
                    Ok(WordRow {
                        id: row.get(0)?,
                        kanji: row.get(1)?,
                        kana: row.get(2)?,
                        romaji: row.get(3)?,
                        meaning: row.get(4)?,
                        meaning_zh: row.get(5)?,
                        examples: row.get(6)?,
                        audio: row.get(7)?,
                        image: row.get(8)?,
                        created_at: row.get(9)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        rows.into_iter().map(Self::row_to_word).collect()
    }

    fn row_to_word(row: WordRow) -> Result<WordEntry, anyhow::Error> {
        let examples: Vec<ExampleSentence> = serde_json::from_str(&row.examples)?;
        let created_at = DateTime::<Utc>::from_timestamp_millis(row.created_at).unwrap_or_default();

        let analysis = WordAnalysis {
            kanji: row.kanji,
            kana: row.kana,
            romaji: row.romaji,
            meaning: row.meaning,
            meaning_zh: row.meaning_zh,
            examples,
        };

        let audio = MediaSlot::from(row.audio.map(MediaValue::new));
        let image = MediaSlot::from(row.image.map(MediaValue::new));

        Ok(WordEntry::with_id(EntityId::from(row.id), analysis, created_at)
            .with_media(MediaField::Audio, audio)
            .with_media(MediaField::Image, image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn word(kanji: &str, minutes_ago: i64) -> WordEntry {
        WordEntry::with_id(
            EntityId::generate(),
            WordAnalysis {
                kanji: kanji.to_string(),
                kana: "かな".to_string(),
                romaji: "kana".to_string(),
                meaning: "meaning".to_string(),
                meaning_zh: "意思".to_string(),
                examples: vec![ExampleSentence {
                    japanese: "例".to_string(),
                    romaji: "rei".to_string(),
                    english: "example".to_string(),
                    chinese: "例子".to_string(),
                }],
            },
            Utc::now() - Duration::minutes(minutes_ago),
        )
    }

    #[test]
    fn test_insert_and_load_most_recent_first() {
        let db = DatabaseConnection::open_in_memory().unwrap();
        DbOperations::insert_word(&db, &word("古", 10)).unwrap();
        DbOperations::insert_word(&db, &word("新", 1)).unwrap();

        let words = DbOperations::load_words(&db).unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].kanji(), "新");
        assert_eq!(words[1].kanji(), "古");
        assert_eq!(words[0].examples().len(), 1);
    }

    #[test]
    fn test_update_media_persists_value() {
        let db = DatabaseConnection::open_in_memory().unwrap();
        let entry = word("音", 0);
        DbOperations::insert_word(&db, &entry).unwrap();
        DbOperations::update_media(&db, entry.id(), MediaField::Audio, &MediaValue::new("AAAA")).unwrap();

        let loaded = DbOperations::load_words(&db).unwrap();
        assert_eq!(loaded[0].audio().value().map(MediaValue::as_str), Some("AAAA"));
        assert_eq!(loaded[0].image(), &MediaSlot::Absent);
    }

    #[test]
    fn test_delete_unknown_word_is_ok() {
        let db = DatabaseConnection::open_in_memory().unwrap();
        DbOperations::delete_word(&db, &EntityId::from("missing")).unwrap();
        assert!(DbOperations::load_words(&db).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_insert_fails() {
        let db = DatabaseConnection::open_in_memory().unwrap();
        let entry = word("重", 0);
        DbOperations::insert_word(&db, &entry).unwrap();
        assert!(DbOperations::insert_word(&db, &entry).is_err());
    }
}
