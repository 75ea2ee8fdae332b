use chrono::{DateTime, Utc};
use course_core::model::{CourseId, Lesson, LessonId};

use super::SqliteRepository;
use super::mapping::{db_err, id_to_i64, lesson_id_from_i64, map_lesson_row};
use crate::repository::{LessonRepository, NewLessonRecord, StorageError};

#[async_trait::async_trait]
impl LessonRepository for SqliteRepository {
    async fn add_lesson(&self, lesson: NewLessonRecord) -> Result<LessonId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO lesson (course_id, lesson_order, title, audio, content, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(id_to_i64("course_id", lesson.course_id.value())?)
        .bind(i64::from(lesson.order))
        .bind(lesson.title)
        .bind(lesson.audio)
        .bind(lesson.content)
        .bind(lesson.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        lesson_id_from_i64(res.last_insert_rowid())
    }

    async fn rename_lesson(
        &self,
        course_id: CourseId,
        order: u32,
        title: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE lesson SET title = ?1, updated_at = ?2
            WHERE course_id = ?3 AND lesson_order = ?4
            ",
        )
        .bind(title)
        .bind(updated_at)
        .bind(id_to_i64("course_id", course_id.value())?)
        .bind(i64::from(order))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_lesson(&self, course_id: CourseId, order: u32) -> Result<(), StorageError> {
        let course = id_to_i64("course_id", course_id.value())?;
        let order = i64::from(order);
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let res = sqlx::query("DELETE FROM lesson WHERE course_id = ?1 AND lesson_order = ?2")
            .bind(course)
            .bind(order)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        // Two passes through negative orders keep UNIQUE(course_id, lesson_order)
        // satisfied at every row update.
        sqlx::query(
            r"
            UPDATE lesson SET lesson_order = -lesson_order
            WHERE course_id = ?1 AND lesson_order > ?2
            ",
        )
        .bind(course)
        .bind(order)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        let shifted = sqlx::query(
            r"
            UPDATE lesson SET lesson_order = -lesson_order - 1
            WHERE course_id = ?1 AND lesson_order < 0
            ",
        )
        .bind(course)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        tracing::debug!(
            course_id = course,
            order,
            shifted = shifted.rows_affected(),
            "deleted lesson"
        );
        Ok(())
    }

    async fn list_lessons(&self, course_id: CourseId) -> Result<Vec<Lesson>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, course_id, lesson_order, title, audio, summary, description, thumbnail, content, updated_at
            FROM lesson
            WHERE course_id = ?1
            ORDER BY lesson_order ASC
            ",
        )
        .bind(id_to_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_lesson_row).collect()
    }
}
