// Database migrations
use rusqlite::Connection;
use anyhow::Result;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    // Create words table
    // Examples are stored as a JSON array; media columns stay NULL until resolved
    conn.execute(
        "CREATE TABLE IF NOT EXISTS words (
            id TEXT PRIMARY KEY NOT NULL,
            kanji TEXT NOT NULL,
            kana TEXT NOT NULL,
            romaji TEXT NOT NULL,
            meaning TEXT NOT NULL,
            meaning_zh TEXT NOT NULL,
            examples TEXT NOT NULL,
            audio TEXT,
            image TEXT,
            created_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_words_created_at ON words(created_at)",
        [],
    )?;

    Ok(())
}
