use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::course::non_blank;
use crate::model::ids::{CourseId, LessonId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson title cannot be empty")]
    EmptyTitle,
}

/// A lesson ("subdeck") inside a course.
///
/// `order` is unique among the lessons of one course. A lesson without cards
/// is valid and carries its material in `content`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    id: LessonId,
    course_id: CourseId,
    order: u32,
    title: String,
    audio: String,
    summary: Option<String>,
    description: Option<String>,
    thumbnail: Option<String>,
    content: Option<String>,
    updated_at: DateTime<Utc>,
}

impl Lesson {
    /// Creates a lesson with no audio and no optional text.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::EmptyTitle` if `title` is blank.
    pub fn new(
        id: LessonId,
        course_id: CourseId,
        order: u32,
        title: impl Into<String>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, LessonError> {
        Ok(Self {
            id,
            course_id,
            order,
            title: validate_title(title)?,
            audio: String::new(),
            summary: None,
            description: None,
            thumbnail: None,
            content: None,
            updated_at,
        })
    }

    #[must_use]
    pub fn with_audio(mut self, audio: impl Into<String>) -> Self {
        self.audio = audio.into();
        self
    }

    #[must_use]
    pub fn with_content(mut self, content: Option<String>) -> Self {
        self.content = non_blank(content);
        self
    }

    #[must_use]
    pub fn with_summary(mut self, summary: Option<String>) -> Self {
        self.summary = non_blank(summary);
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = non_blank(description);
        self
    }

    #[must_use]
    pub fn with_thumbnail(mut self, thumbnail: Option<String>) -> Self {
        self.thumbnail = non_blank(thumbnail);
        self
    }

    /// Replace the title, keeping every other field.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::EmptyTitle` if `title` is blank; the lesson is unchanged.
    pub fn rename(&mut self, title: impl Into<String>, now: DateTime<Utc>) -> Result<(), LessonError> {
        self.title = validate_title(title)?;
        self.updated_at = now;
        Ok(())
    }

    pub fn set_order(&mut self, order: u32) {
        self.order = order;
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn audio(&self) -> &str {
        &self.audio
    }

    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }

    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

fn validate_title(title: impl Into<String>) -> Result<String, LessonError> {
    let title = title.into();
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(LessonError::EmptyTitle);
    }
    Ok(trimmed.to_owned())
}
