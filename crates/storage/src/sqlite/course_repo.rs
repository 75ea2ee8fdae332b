use chrono::{DateTime, Utc};
use course_core::model::{Course, CourseId, CourseStatus, TeacherIdentity};

use super::SqliteRepository;
use super::mapping::{course_id_from_i64, db_err, id_to_i64, map_course_row};
use crate::repository::{CourseRepository, NewCourseRecord, StorageError};

#[async_trait::async_trait]
impl CourseRepository for SqliteRepository {
    async fn insert_course(
        &self,
        course: NewCourseRecord,
        owner: &TeacherIdentity,
    ) -> Result<CourseId, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let res = sqlx::query(
            r"
            INSERT INTO course (level, title, status, summary, description, thumbnail, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(i64::from(course.level))
        .bind(course.title)
        .bind(course.status.as_str())
        .bind(course.summary)
        .bind(course.description)
        .bind(course.thumbnail)
        .bind(course.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        let id = res.last_insert_rowid();

        sqlx::query("INSERT INTO teacher_course (teacher_username, course_id) VALUES (?1, ?2)")
            .bind(owner.username())
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        tracing::debug!(course_id = id, teacher = %owner, "inserted course");
        course_id_from_i64(id)
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, level, title, status, summary, description, thumbnail, updated_at
            FROM course WHERE id = ?1
            ",
        )
        .bind(id_to_i64("course_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_course_row).transpose()
    }

    async fn list_courses(&self, owner: &TeacherIdentity) -> Result<Vec<Course>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT c.id, c.level, c.title, c.status, c.summary, c.description, c.thumbnail, c.updated_at
            FROM course c
            JOIN teacher_course tc ON tc.course_id = c.id
            WHERE tc.teacher_username = ?1
            ORDER BY c.level ASC, c.id ASC
            ",
        )
        .bind(owner.username())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_course_row).collect()
    }

    async fn set_course_status(
        &self,
        id: CourseId,
        status: CourseStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE course SET status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(status.as_str())
            .bind(updated_at)
            .bind(id_to_i64("course_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
