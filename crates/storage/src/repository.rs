use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::model::{
    Card, CardId, Course, CourseId, CourseStatus, Lesson, LessonId, TeacherIdentity, Word,
    WordDraft, WordId,
};
use course_core::DeckRow;
use thiserror::Error;

use crate::memory::InMemoryRepository;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Insert shape for a course; the adapter assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCourseRecord {
    pub level: u32,
    pub title: String,
    pub status: CourseStatus,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl NewCourseRecord {
    #[must_use]
    pub fn from_course(course: &Course) -> Self {
        Self {
            level: course.level(),
            title: course.title().to_owned(),
            status: course.status(),
            summary: course.summary().map(str::to_owned),
            description: course.description().map(str::to_owned),
            thumbnail: course.thumbnail().map(str::to_owned),
            updated_at: course.updated_at(),
        }
    }
}

/// Insert shape for a lesson appended to a course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLessonRecord {
    pub course_id: CourseId,
    pub order: u32,
    pub title: String,
    pub audio: String,
    pub content: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl NewLessonRecord {
    #[must_use]
    pub fn from_lesson(lesson: &Lesson) -> Self {
        Self {
            course_id: lesson.course_id(),
            order: lesson.order(),
            title: lesson.title().to_owned(),
            audio: lesson.audio().to_owned(),
            content: lesson.content().map(str::to_owned),
            updated_at: lesson.updated_at(),
        }
    }
}

/// Annotation link to write alongside a card's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardWordLink {
    pub word_id: WordId,
    pub order: u32,
    pub start_index: u32,
    pub end_index: u32,
}

/// Insert shape for a card, addressed by its lesson's order within the course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCardRecord {
    pub course_id: CourseId,
    pub lesson_order: u32,
    pub order: u32,
    pub text: String,
    pub audio_uri: Option<String>,
    pub words: Vec<CardWordLink>,
}

impl NewCardRecord {
    #[must_use]
    pub fn from_card(
        course_id: CourseId,
        lesson_order: u32,
        card: &Card,
        words: Vec<CardWordLink>,
    ) -> Self {
        Self {
            course_id,
            lesson_order,
            order: card.order(),
            text: card.text().to_owned(),
            audio_uri: card.audio_uri().map(str::to_owned),
            words,
        }
    }
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Insert a course and grant `owner` access to it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn insert_course(
        &self,
        course: NewCourseRecord,
        owner: &TeacherIdentity,
    ) -> Result<CourseId, StorageError>;

    /// Fetch a course by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError>;

    /// Courses `owner` may edit, ordered by level then ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn list_courses(&self, owner: &TeacherIdentity) -> Result<Vec<Course>, StorageError>;

    /// Change the lifecycle status of a course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the course is missing.
    async fn set_course_status(
        &self,
        id: CourseId,
        status: CourseStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

/// Query side of the course browser.
#[async_trait]
pub trait DeckRowSource: Send + Sync {
    /// Flat outer-join rows for one course, ordered by lesson, card, then word order.
    ///
    /// Returns no rows when the course does not exist or `teacher` cannot access it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn deck_rows(
        &self,
        course_id: CourseId,
        teacher: &TeacherIdentity,
    ) -> Result<Vec<DeckRow>, StorageError>;
}

#[async_trait]
pub trait LessonRepository: Send + Sync {
    /// Insert a lesson at the record's order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the order is taken and
    /// `StorageError::NotFound` if the course is missing.
    async fn add_lesson(&self, lesson: NewLessonRecord) -> Result<LessonId, StorageError>;

    /// Replace a lesson's title.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no lesson has `order`.
    async fn rename_lesson(
        &self,
        course_id: CourseId,
        order: u32,
        title: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Delete a lesson (and its cards) and shift later lessons down by one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no lesson has `order`.
    async fn delete_lesson(&self, course_id: CourseId, order: u32) -> Result<(), StorageError>;

    /// Lessons of a course ordered by order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn list_lessons(&self, course_id: CourseId) -> Result<Vec<Lesson>, StorageError>;
}

#[async_trait]
pub trait CardRepository: Send + Sync {
    /// Insert a card and its annotation links.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the order is taken and
    /// `StorageError::NotFound` if the lesson is missing.
    async fn add_card(&self, card: NewCardRecord) -> Result<CardId, StorageError>;

    /// Replace a card's text and its annotation links.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the card is missing.
    async fn update_card_text(
        &self,
        course_id: CourseId,
        lesson_order: u32,
        order: u32,
        text: &str,
        words: &[CardWordLink],
    ) -> Result<(), StorageError>;

    /// Delete a card and shift later cards of the lesson down by one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the card is missing.
    async fn delete_card(
        &self,
        course_id: CourseId,
        lesson_order: u32,
        order: u32,
    ) -> Result<(), StorageError>;

    /// Cards of a lesson ordered by order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson is missing.
    async fn list_cards(
        &self,
        course_id: CourseId,
        lesson_order: u32,
    ) -> Result<Vec<Card>, StorageError>;
}

#[async_trait]
pub trait WordRepository: Send + Sync {
    /// Insert a vocabulary entry.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the draft is invalid.
    async fn insert_word(&self, word: WordDraft) -> Result<WordId, StorageError>;

    /// Fetch a word by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_word(&self, id: WordId) -> Result<Option<Word>, StorageError>;

    /// Case-insensitive lookup by surface text; the lowest ID wins on duplicates.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn find_word(&self, text: &str) -> Result<Option<Word>, StorageError>;
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub courses: Arc<dyn CourseRepository>,
    pub lessons: Arc<dyn LessonRepository>,
    pub cards: Arc<dyn CardRepository>,
    pub words: Arc<dyn WordRepository>,
    pub rows: Arc<dyn DeckRowSource>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            courses: Arc::new(repo.clone()),
            lessons: Arc::new(repo.clone()),
            cards: Arc::new(repo.clone()),
            words: Arc::new(repo.clone()),
            rows: Arc::new(repo),
        }
    }
}
