use course_core::model::{Card, CardId, CourseId};
use sqlx::{Sqlite, Transaction};

use super::SqliteRepository;
use super::mapping::{card_id_from_i64, db_err, id_to_i64, map_card_row};
use crate::repository::{CardRepository, CardWordLink, NewCardRecord, StorageError};

async fn lesson_id_for(
    tx: &mut Transaction<'_, Sqlite>,
    course_id: CourseId,
    lesson_order: u32,
) -> Result<i64, StorageError> {
    sqlx::query_scalar::<_, i64>(
        "SELECT id FROM lesson WHERE course_id = ?1 AND lesson_order = ?2",
    )
    .bind(id_to_i64("course_id", course_id.value())?)
    .bind(i64::from(lesson_order))
    .fetch_optional(&mut **tx)
    .await
    .map_err(db_err)?
    .ok_or(StorageError::NotFound)
}

async fn card_id_for(
    tx: &mut Transaction<'_, Sqlite>,
    lesson_id: i64,
    order: u32,
) -> Result<i64, StorageError> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM card WHERE lesson_id = ?1 AND card_order = ?2")
        .bind(lesson_id)
        .bind(i64::from(order))
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_err)?
        .ok_or(StorageError::NotFound)
}

async fn insert_links(
    tx: &mut Transaction<'_, Sqlite>,
    card_id: i64,
    words: &[CardWordLink],
) -> Result<(), StorageError> {
    for link in words {
        sqlx::query(
            r"
            INSERT INTO card_word (card_id, word_id, word_order, start_index, end_index)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(card_id)
        .bind(id_to_i64("word_id", link.word_id.value())?)
        .bind(i64::from(link.order))
        .bind(i64::from(link.start_index))
        .bind(i64::from(link.end_index))
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl CardRepository for SqliteRepository {
    async fn add_card(&self, card: NewCardRecord) -> Result<CardId, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let lesson_id = lesson_id_for(&mut tx, card.course_id, card.lesson_order).await?;

        let res = sqlx::query(
            r"
            INSERT INTO card (lesson_id, card_order, front_text, front_audio_uri)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(lesson_id)
        .bind(i64::from(card.order))
        .bind(&card.text)
        .bind(&card.audio_uri)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        let card_id = res.last_insert_rowid();

        insert_links(&mut tx, card_id, &card.words).await?;
        tx.commit().await.map_err(db_err)?;

        tracing::debug!(card_id, lesson_id, links = card.words.len(), "inserted card");
        card_id_from_i64(card_id)
    }

    async fn update_card_text(
        &self,
        course_id: CourseId,
        lesson_order: u32,
        order: u32,
        text: &str,
        words: &[CardWordLink],
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let lesson_id = lesson_id_for(&mut tx, course_id, lesson_order).await?;
        let card_id = card_id_for(&mut tx, lesson_id, order).await?;

        sqlx::query("UPDATE card SET front_text = ?1 WHERE id = ?2")
            .bind(text)
            .bind(card_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        sqlx::query("DELETE FROM card_word WHERE card_id = ?1")
            .bind(card_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        insert_links(&mut tx, card_id, words).await?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn delete_card(
        &self,
        course_id: CourseId,
        lesson_order: u32,
        order: u32,
    ) -> Result<(), StorageError> {
        let order = i64::from(order);
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let lesson_id = lesson_id_for(&mut tx, course_id, lesson_order).await?;

        let res = sqlx::query("DELETE FROM card WHERE lesson_id = ?1 AND card_order = ?2")
            .bind(lesson_id)
            .bind(order)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        sqlx::query(
            r"
            UPDATE card SET card_order = -card_order
            WHERE lesson_id = ?1 AND card_order > ?2
            ",
        )
        .bind(lesson_id)
        .bind(order)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        let shifted = sqlx::query(
            r"
            UPDATE card SET card_order = -card_order - 1
            WHERE lesson_id = ?1 AND card_order < 0
            ",
        )
        .bind(lesson_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        tracing::debug!(
            lesson_id,
            order,
            shifted = shifted.rows_affected(),
            "deleted card"
        );
        Ok(())
    }

    async fn list_cards(
        &self,
        course_id: CourseId,
        lesson_order: u32,
    ) -> Result<Vec<Card>, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let lesson_id = lesson_id_for(&mut tx, course_id, lesson_order).await?;
        let rows = sqlx::query(
            r"
            SELECT id, lesson_id, card_order, front_text, front_audio_uri
            FROM card
            WHERE lesson_id = ?1
            ORDER BY card_order ASC
            ",
        )
        .bind(lesson_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;

        rows.iter().map(map_card_row).collect()
    }
}
