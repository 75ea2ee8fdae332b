use thiserror::Error;

use crate::markup::MarkupError;
use crate::model::{CardError, CourseError, LessonError, WordError};
use crate::ordering::OrderError;
use crate::selection::SelectionError;
use crate::tree::RowSetError;

/// Any failure raised by the content core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Markup(#[from] MarkupError),
    #[error(transparent)]
    RowSet(#[from] RowSetError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Card(#[from] CardError),
    #[error(transparent)]
    Word(#[from] WordError),
}
