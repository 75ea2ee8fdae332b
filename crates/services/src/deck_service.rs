use std::sync::Arc;

use course_core::model::{Course, CourseDraft, CourseId, CourseStatus, TeacherIdentity};
use course_core::{DeckTree, RowSetError, reduce_rows};
use storage::repository::{CourseRepository, DeckRowSource, NewCourseRecord};

use crate::Clock;
use crate::error::{BrowserError, DeckServiceError};

/// One entry of the course overview: a course with its lesson titles in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseOverview {
    pub course: Course,
    pub lesson_titles: Vec<String>,
}

/// Course lifecycle and course-tree loading.
#[derive(Clone)]
pub struct DeckService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    rows: Arc<dyn DeckRowSource>,
}

impl DeckService {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        rows: Arc<dyn DeckRowSource>,
    ) -> Self {
        Self {
            clock,
            courses,
            rows,
        }
    }

    /// Create a course owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::Course` for validation failures.
    /// Returns `DeckServiceError::Storage` if persistence fails.
    pub async fn create_course(
        &self,
        draft: CourseDraft,
        owner: &TeacherIdentity,
    ) -> Result<CourseId, DeckServiceError> {
        let course = draft.validate(CourseId::new(1), self.clock.now())?;
        let id = self
            .courses
            .insert_course(NewCourseRecord::from_course(&course), owner)
            .await?;
        tracing::info!(course_id = %id, teacher = %owner, "created course");
        Ok(id)
    }

    /// Courses `owner` may edit, ordered by level.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::Storage` if repository access fails.
    pub async fn list_courses(
        &self,
        owner: &TeacherIdentity,
    ) -> Result<Vec<Course>, DeckServiceError> {
        Ok(self.courses.list_courses(owner).await?)
    }

    /// Every course of `owner` with its lesson titles, ordered by level.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::RowSet` for malformed rows and
    /// `DeckServiceError::Storage` if repository access fails.
    pub async fn overview(
        &self,
        owner: &TeacherIdentity,
    ) -> Result<Vec<CourseOverview>, DeckServiceError> {
        let courses = self.list_courses(owner).await?;
        let mut overview = Vec::with_capacity(courses.len());
        for course in courses {
            let rows = self.rows.deck_rows(course.id(), owner).await?;
            let lesson_titles = match reduce_rows(&rows) {
                Ok(tree) => tree.lessons.into_iter().map(|lesson| lesson.title).collect(),
                Err(RowSetError::Empty) => Vec::new(),
                Err(other) => return Err(other.into()),
            };
            overview.push(CourseOverview {
                course,
                lesson_titles,
            });
        }
        Ok(overview)
    }

    /// Move a course to another lifecycle status.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::Storage` if the course is missing or the
    /// update fails.
    pub async fn set_status(
        &self,
        course_id: CourseId,
        status: CourseStatus,
    ) -> Result<(), DeckServiceError> {
        self.courses
            .set_course_status(course_id, status, self.clock.now())
            .await?;
        tracing::info!(course_id = %course_id, status = %status, "changed course status");
        Ok(())
    }

    /// Load one course's rows and reduce them into a tree snapshot.
    ///
    /// # Errors
    ///
    /// Returns `BrowserError::CourseNotFound` when the course is missing or not
    /// shared with `teacher`, `BrowserError::RowSet` for malformed rows, and
    /// `BrowserError::Storage` if the query fails.
    pub async fn load_tree(
        &self,
        course_id: CourseId,
        teacher: &TeacherIdentity,
    ) -> Result<Arc<DeckTree>, BrowserError> {
        let rows = self.rows.deck_rows(course_id, teacher).await?;
        let tree = reduce_rows(&rows).map_err(|e| match e {
            RowSetError::Empty => BrowserError::CourseNotFound(course_id),
            other => BrowserError::RowSet(other),
        })?;
        tracing::debug!(
            course_id = %course_id,
            lessons = tree.lessons.len(),
            "loaded course tree"
        );
        Ok(Arc::new(tree))
    }
}
