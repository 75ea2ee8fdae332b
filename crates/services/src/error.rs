//! Shared error types for the services crate.

use thiserror::Error;

use course_core::model::{CardError, CourseError, CourseId, LessonError, WordError};
use course_core::{MarkupError, RowSetError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted while loading a course tree for the browser.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BrowserError {
    #[error("course {0} not found")]
    CourseNotFound(CourseId),
    #[error(transparent)]
    RowSet(#[from] RowSetError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `DeckService` course operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeckServiceError {
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error(transparent)]
    RowSet(#[from] RowSetError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while applying a lesson, card, or word mutation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MutationError {
    #[error(transparent)]
    Markup(#[from] MarkupError),
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Card(#[from] CardError),
    #[error(transparent)]
    Word(#[from] WordError),
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
