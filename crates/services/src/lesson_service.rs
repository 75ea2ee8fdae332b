use std::sync::Arc;

use course_core::model::{CourseId, Lesson, LessonId};
use storage::repository::{LessonRepository, NewLessonRecord};

use crate::Clock;
use crate::error::MutationError;

/// Appends, renames, and deletes lessons of a course.
#[derive(Clone)]
pub struct LessonService {
    clock: Clock,
    lessons: Arc<dyn LessonRepository>,
}

impl LessonService {
    #[must_use]
    pub fn new(clock: Clock, lessons: Arc<dyn LessonRepository>) -> Self {
        Self { clock, lessons }
    }

    /// Insert a lesson at `order`, normally the sibling count the caller saw
    /// in its snapshot (see `DeckTree::next_lesson_order`).
    ///
    /// # Errors
    ///
    /// Returns `MutationError::Lesson` for a blank title.
    /// Returns `MutationError::Storage` if the course is missing, or
    /// `StorageError::Conflict` inside it when `order` is already taken.
    pub async fn add_lesson(
        &self,
        course_id: CourseId,
        order: u32,
        title: &str,
    ) -> Result<(), MutationError> {
        let lesson = Lesson::new(LessonId::new(1), course_id, order, title, self.clock.now())?;
        self.lessons
            .add_lesson(NewLessonRecord::from_lesson(&lesson))
            .await?;
        tracing::info!(course_id = %course_id, order, "added lesson");
        Ok(())
    }

    /// Replace the title of the lesson at `order`.
    ///
    /// # Errors
    ///
    /// Returns `MutationError::Lesson` for a blank title and
    /// `MutationError::Storage` if no lesson has `order`.
    pub async fn rename_lesson(
        &self,
        course_id: CourseId,
        order: u32,
        title: &str,
    ) -> Result<(), MutationError> {
        let now = self.clock.now();
        let mut validated = Lesson::new(LessonId::new(1), course_id, order, "untitled", now)?;
        validated.rename(title, now)?;
        self.lessons
            .rename_lesson(course_id, order, validated.title(), now)
            .await?;
        tracing::info!(course_id = %course_id, order, "renamed lesson");
        Ok(())
    }

    /// Delete the lesson at `order`; later lessons move down by one.
    ///
    /// # Errors
    ///
    /// Returns `MutationError::Storage` if no lesson has `order`.
    pub async fn delete_lesson(&self, course_id: CourseId, order: u32) -> Result<(), MutationError> {
        self.lessons.delete_lesson(course_id, order).await?;
        tracing::info!(course_id = %course_id, order, "deleted lesson");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use course_core::model::{CourseDraft, TeacherIdentity};
    use course_core::time::fixed_now;
    use storage::memory::InMemoryRepository;
    use storage::repository::{CourseRepository, NewCourseRecord, StorageError};

    async fn setup() -> (InMemoryRepository, LessonService, CourseId) {
        let repo = InMemoryRepository::new();
        let course = CourseDraft::new(1, "School")
            .validate(CourseId::new(1), fixed_now())
            .unwrap();
        let course_id = repo
            .insert_course(
                NewCourseRecord::from_course(&course),
                &TeacherIdentity::new("teacher1").unwrap(),
            )
            .await
            .unwrap();
        let service = LessonService::new(Clock::fixed(fixed_now()), Arc::new(repo.clone()));
        (repo, service, course_id)
    }

    #[tokio::test]
    async fn lessons_insert_at_given_order() {
        let (repo, service, course_id) = setup().await;
        service.add_lesson(course_id, 0, "Introduction").await.unwrap();
        service.add_lesson(course_id, 1, "Chapter 1").await.unwrap();

        let titles: Vec<String> = repo
            .list_lessons(course_id)
            .await
            .unwrap()
            .iter()
            .map(|l| l.title().to_owned())
            .collect();
        assert_eq!(titles, vec!["Introduction", "Chapter 1"]);
    }

    #[tokio::test]
    async fn taken_order_is_a_conflict() {
        let (repo, service, course_id) = setup().await;
        service.add_lesson(course_id, 0, "Introduction").await.unwrap();

        let err = service.add_lesson(course_id, 0, "Again").await.unwrap_err();
        assert!(matches!(err, MutationError::Storage(StorageError::Conflict)));
        assert_eq!(repo.list_lessons(course_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn append_after_delete_reuses_packed_order() {
        let (repo, service, course_id) = setup().await;
        for (order, title) in ["A", "B", "C"].into_iter().enumerate() {
            let order = u32::try_from(order).unwrap();
            service.add_lesson(course_id, order, title).await.unwrap();
        }
        service.delete_lesson(course_id, 0).await.unwrap();

        let orders: Vec<u32> = repo
            .list_lessons(course_id)
            .await
            .unwrap()
            .iter()
            .map(Lesson::order)
            .collect();
        assert_eq!(course_core::ordering::next_order(&orders), 2);
        service.add_lesson(course_id, 2, "D").await.unwrap();
    }

    #[tokio::test]
    async fn blank_rename_is_rejected() {
        let (repo, service, course_id) = setup().await;
        service.add_lesson(course_id, 0, "Introduction").await.unwrap();

        let err = service.rename_lesson(course_id, 0, "  ").await.unwrap_err();
        assert!(matches!(err, MutationError::Lesson(_)));
        let lessons = repo.list_lessons(course_id).await.unwrap();
        assert_eq!(lessons[0].title(), "Introduction");

        service.rename_lesson(course_id, 0, " Welcome ").await.unwrap();
        let lessons = repo.list_lessons(course_id).await.unwrap();
        assert_eq!(lessons[0].title(), "Welcome");
    }

    #[tokio::test]
    async fn deleting_missing_lesson_is_not_found() {
        let (_repo, service, course_id) = setup().await;
        let err = service.delete_lesson(course_id, 3).await.unwrap_err();
        assert!(matches!(err, MutationError::Storage(StorageError::NotFound)));
    }
}
