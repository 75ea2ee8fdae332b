use course_core::model::{Word, WordDraft, WordId};

use super::SqliteRepository;
use super::mapping::{db_err, id_to_i64, map_word_row, ser, word_id_from_i64};
use crate::repository::{StorageError, WordRepository};

#[async_trait::async_trait]
impl WordRepository for SqliteRepository {
    async fn insert_word(&self, word: WordDraft) -> Result<WordId, StorageError> {
        // Validate with a placeholder id so blank drafts never reach the table.
        let word = word.validate(WordId::new(0)).map_err(ser)?;
        let res = sqlx::query(
            r"
            INSERT INTO word (text, definition, phonetic, part_of_speech, audio_uri, image_uri)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(word.text())
        .bind(word.definition())
        .bind(word.phonetic())
        .bind(word.part_of_speech())
        .bind(word.audio_uri())
        .bind(word.image_uri())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        word_id_from_i64(res.last_insert_rowid())
    }

    async fn get_word(&self, id: WordId) -> Result<Option<Word>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, text, definition, phonetic, part_of_speech, audio_uri, image_uri
            FROM word WHERE id = ?1
            ",
        )
        .bind(id_to_i64("word_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_word_row).transpose()
    }

    async fn find_word(&self, text: &str) -> Result<Option<Word>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, text, definition, phonetic, part_of_speech, audio_uri, image_uri
            FROM word
            WHERE text = ?1 COLLATE NOCASE
            ORDER BY id ASC
            LIMIT 1
            ",
        )
        .bind(text.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_word_row).transpose()
    }
}
