use course_core::model::{
    Card, CardId, Course, CourseDraft, CourseId, CourseStatus, Lesson, LessonId, Word, WordDraft,
    WordId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Map a query failure, turning UNIQUE violations into `Conflict`.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    match e {
        sqlx::Error::RowNotFound => StorageError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
        other => StorageError::Connection(other.to_string()),
    }
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn order_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn course_id_from_i64(v: i64) -> Result<CourseId, StorageError> {
    Ok(CourseId::new(i64_to_u64("course_id", v)?))
}

pub(crate) fn lesson_id_from_i64(v: i64) -> Result<LessonId, StorageError> {
    Ok(LessonId::new(i64_to_u64("lesson_id", v)?))
}

pub(crate) fn card_id_from_i64(v: i64) -> Result<CardId, StorageError> {
    Ok(CardId::new(i64_to_u64("card_id", v)?))
}

pub(crate) fn word_id_from_i64(v: i64) -> Result<WordId, StorageError> {
    Ok(WordId::new(i64_to_u64("word_id", v)?))
}

pub(crate) fn map_course_row(row: &SqliteRow) -> Result<Course, StorageError> {
    let id = course_id_from_i64(row.try_get("id").map_err(ser)?)?;
    let status: String = row.try_get("status").map_err(ser)?;
    let draft = CourseDraft {
        level: order_from_i64("level", row.try_get("level").map_err(ser)?)?,
        title: row.try_get("title").map_err(ser)?,
        status: status.parse::<CourseStatus>().map_err(ser)?,
        summary: row.try_get("summary").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        thumbnail: row.try_get("thumbnail").map_err(ser)?,
    };
    draft
        .validate(id, row.try_get("updated_at").map_err(ser)?)
        .map_err(ser)
}

pub(crate) fn map_lesson_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    let lesson = Lesson::new(
        lesson_id_from_i64(row.try_get("id").map_err(ser)?)?,
        course_id_from_i64(row.try_get("course_id").map_err(ser)?)?,
        order_from_i64("lesson_order", row.try_get("lesson_order").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get("updated_at").map_err(ser)?,
    )
    .map_err(ser)?
    .with_audio(row.try_get::<String, _>("audio").map_err(ser)?)
    .with_summary(row.try_get("summary").map_err(ser)?)
    .with_description(row.try_get("description").map_err(ser)?)
    .with_thumbnail(row.try_get("thumbnail").map_err(ser)?)
    .with_content(row.try_get("content").map_err(ser)?);
    Ok(lesson)
}

pub(crate) fn map_card_row(row: &SqliteRow) -> Result<Card, StorageError> {
    Card::new(
        card_id_from_i64(row.try_get("id").map_err(ser)?)?,
        lesson_id_from_i64(row.try_get("lesson_id").map_err(ser)?)?,
        order_from_i64("card_order", row.try_get("card_order").map_err(ser)?)?,
        row.try_get::<String, _>("front_text").map_err(ser)?,
        row.try_get("front_audio_uri").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_word_row(row: &SqliteRow) -> Result<Word, StorageError> {
    let draft = WordDraft {
        text: row.try_get("text").map_err(ser)?,
        definition: row.try_get("definition").map_err(ser)?,
        phonetic: row.try_get("phonetic").map_err(ser)?,
        part_of_speech: row.try_get("part_of_speech").map_err(ser)?,
        audio_uri: row.try_get("audio_uri").map_err(ser)?,
        image_uri: row.try_get("image_uri").map_err(ser)?,
    };
    draft
        .validate(word_id_from_i64(row.try_get("id").map_err(ser)?)?)
        .map_err(ser)
}
