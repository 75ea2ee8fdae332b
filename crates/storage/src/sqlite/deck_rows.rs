use course_core::DeckRow;
use course_core::model::{CourseId, TeacherIdentity};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{course_id_from_i64, db_err, id_to_i64, order_from_i64, ser};
use crate::repository::{DeckRowSource, StorageError};

fn opt_order(row: &SqliteRow, field: &'static str) -> Result<Option<u32>, StorageError> {
    row.try_get::<Option<i64>, _>(field)
        .map_err(ser)?
        .map(|v| order_from_i64(field, v))
        .transpose()
}

fn map_deck_row(row: &SqliteRow) -> Result<DeckRow, StorageError> {
    Ok(DeckRow {
        course_id: row
            .try_get::<Option<i64>, _>("course_id")
            .map_err(ser)?
            .map(course_id_from_i64)
            .transpose()?,
        course_level: opt_order(row, "course_level")?,
        course_title: row.try_get("course_title").map_err(ser)?,
        lesson_order: opt_order(row, "lesson_order")?,
        lesson_title: row.try_get("lesson_title").map_err(ser)?,
        card_order: opt_order(row, "card_order")?,
        card_text: row.try_get("card_text").map_err(ser)?,
        word_start_index: opt_order(row, "word_start_index")?,
        word_end_index: opt_order(row, "word_end_index")?,
        word_text: row.try_get("word_text").map_err(ser)?,
        word_definition: row.try_get("word_definition").map_err(ser)?,
        word_phonetic: row.try_get("word_phonetic").map_err(ser)?,
        word_part_of_speech: row.try_get("word_part_of_speech").map_err(ser)?,
        word_audio_uri: row.try_get("word_audio_uri").map_err(ser)?,
        word_image_uri: row.try_get("word_image_uri").map_err(ser)?,
    })
}

#[async_trait::async_trait]
impl DeckRowSource for SqliteRepository {
    async fn deck_rows(
        &self,
        course_id: CourseId,
        teacher: &TeacherIdentity,
    ) -> Result<Vec<DeckRow>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                c.id AS course_id,
                c.level AS course_level,
                c.title AS course_title,
                l.lesson_order AS lesson_order,
                l.title AS lesson_title,
                cd.card_order AS card_order,
                cd.front_text AS card_text,
                cw.start_index AS word_start_index,
                cw.end_index AS word_end_index,
                w.text AS word_text,
                w.definition AS word_definition,
                w.phonetic AS word_phonetic,
                w.part_of_speech AS word_part_of_speech,
                w.audio_uri AS word_audio_uri,
                w.image_uri AS word_image_uri
            FROM teacher_course tc
            JOIN course c ON c.id = tc.course_id
            LEFT JOIN lesson l ON l.course_id = c.id
            LEFT JOIN card cd ON cd.lesson_id = l.id
            LEFT JOIN card_word cw ON cw.card_id = cd.id
            LEFT JOIN word w ON w.id = cw.word_id
            WHERE tc.teacher_username = ?1 AND c.id = ?2
            ORDER BY l.lesson_order ASC, cd.card_order ASC, cw.word_order ASC
            ",
        )
        .bind(teacher.username())
        .bind(id_to_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        tracing::debug!(
            course_id = course_id.value(),
            teacher = %teacher,
            rows = rows.len(),
            "fetched deck rows"
        );
        rows.iter().map(map_deck_row).collect()
    }
}
