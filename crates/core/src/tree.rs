//! Regrouping of flat course rows into a lesson → card → annotation tree.
//!
//! The data source joins course, lesson, card, and word tables with left outer
//! joins, so one course arrives as one row per leaf. [`reduce_rows`] folds
//! those rows back into a [`DeckTree`] in a single pass.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::model::CourseId;
use crate::ordering::next_order;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RowSetError {
    #[error("row set is empty")]
    Empty,

    #[error("row {row}: required field `{field}` is null")]
    MissingField { row: usize, field: &'static str },

    #[error("row {row}: course {found} differs from course {expected}")]
    MixedCourses {
        row: usize,
        expected: CourseId,
        found: CourseId,
    },
}

//
// ─── INPUT ─────────────────────────────────────────────────────────────────────
//

/// One denormalized join row. Lesson, card and word columns are null when the
/// outer join found nothing at that level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeckRow {
    pub course_id: Option<CourseId>,
    pub course_level: Option<u32>,
    pub course_title: Option<String>,
    pub lesson_order: Option<u32>,
    pub lesson_title: Option<String>,
    pub card_order: Option<u32>,
    pub card_text: Option<String>,
    pub word_start_index: Option<u32>,
    pub word_end_index: Option<u32>,
    pub word_text: Option<String>,
    pub word_definition: Option<String>,
    pub word_phonetic: Option<String>,
    pub word_part_of_speech: Option<String>,
    pub word_audio_uri: Option<String>,
    pub word_image_uri: Option<String>,
}

impl DeckRow {
    /// A row for a course with no lesson attached.
    #[must_use]
    pub fn course(id: CourseId, level: u32, title: impl Into<String>) -> Self {
        Self {
            course_id: Some(id),
            course_level: Some(level),
            course_title: Some(title.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_lesson(mut self, order: u32, title: impl Into<String>) -> Self {
        self.lesson_order = Some(order);
        self.lesson_title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_card(mut self, order: u32, text: impl Into<String>) -> Self {
        self.card_order = Some(order);
        self.card_text = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_word(
        mut self,
        start: u32,
        end: u32,
        text: impl Into<String>,
        definition: impl Into<String>,
    ) -> Self {
        self.word_start_index = Some(start);
        self.word_end_index = Some(end);
        self.word_text = Some(text.into());
        self.word_definition = Some(definition.into());
        self
    }

    fn has_word(&self) -> bool {
        self.word_text.is_some() || self.word_start_index.is_some()
    }
}

//
// ─── OUTPUT ────────────────────────────────────────────────────────────────────
//

/// One course's content, grouped and in first-appearance order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckTree {
    pub course_id: CourseId,
    pub course_level: u32,
    pub course_title: String,
    pub lessons: Vec<LessonNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonNode {
    pub order: u32,
    pub title: String,
    pub cards: Vec<CardNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardNode {
    pub order: u32,
    pub text: String,
    pub annotations: Vec<WordAnnotation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordAnnotation {
    pub start_index: u32,
    pub end_index: u32,
    pub text: String,
    pub definition: String,
    pub phonetic: Option<String>,
    pub part_of_speech: Option<String>,
    pub audio_uri: Option<String>,
    pub image_uri: Option<String>,
}

impl DeckTree {
    #[must_use]
    pub fn lesson(&self, order: u32) -> Option<&LessonNode> {
        self.lessons.iter().find(|lesson| lesson.order == order)
    }

    /// Lowest lesson order present; `None` for a course without lessons.
    #[must_use]
    pub fn min_lesson_order(&self) -> Option<u32> {
        self.lessons.iter().map(|lesson| lesson.order).min()
    }

    #[must_use]
    pub fn lesson_orders(&self) -> Vec<u32> {
        self.lessons.iter().map(|lesson| lesson.order).collect()
    }

    /// Order a lesson appended to this snapshot would take.
    #[must_use]
    pub fn next_lesson_order(&self) -> u32 {
        next_order(&self.lesson_orders())
    }
}

impl LessonNode {
    #[must_use]
    pub fn card(&self, order: u32) -> Option<&CardNode> {
        self.cards.iter().find(|card| card.order == order)
    }

    #[must_use]
    pub fn min_card_order(&self) -> Option<u32> {
        self.cards.iter().map(|card| card.order).min()
    }

    #[must_use]
    pub fn card_orders(&self) -> Vec<u32> {
        self.cards.iter().map(|card| card.order).collect()
    }

    #[must_use]
    pub fn next_card_order(&self) -> u32 {
        next_order(&self.card_orders())
    }
}

//
// ─── REDUCER ───────────────────────────────────────────────────────────────────
//

/// Group one course's rows into a [`DeckTree`].
///
/// Lessons and cards keep the order in which they first appear; rows do not
/// need to be contiguous per group. Gaps in order values are kept as-is.
///
/// # Errors
///
/// Returns `RowSetError::Empty` for no rows, `RowSetError::MixedCourses` if
/// rows name more than one course, and `RowSetError::MissingField` when a
/// required column is null: course columns on every row, lesson title with
/// its order, card text with its order, lesson order whenever card columns are
/// set, and card order, span, text and definition whenever word columns are set.
pub fn reduce_rows(rows: &[DeckRow]) -> Result<DeckTree, RowSetError> {
    let first = rows.first().ok_or(RowSetError::Empty)?;
    let course_id = required(first.course_id, 0, "course_id")?;
    let course_level = required(first.course_level, 0, "course_level")?;
    let course_title = required(first.course_title.clone(), 0, "course_title")?;
    let mut lessons: Vec<LessonNode> = Vec::new();
    // lesson order -> (index into `lessons`, card order -> index into `cards`)
    let mut index: HashMap<u32, (usize, HashMap<u32, usize>)> = HashMap::new();

    for (row_no, row) in rows.iter().enumerate() {
        let found = required(row.course_id, row_no, "course_id")?;
        if found != course_id {
            return Err(RowSetError::MixedCourses {
                row: row_no,
                expected: course_id,
                found,
            });
        }
        required(row.course_level, row_no, "course_level")?;
        required(row.course_title.as_ref(), row_no, "course_title")?;

        let Some(lesson_order) = row.lesson_order else {
            if row.card_order.is_some() || row.has_word() {
                return Err(RowSetError::MissingField {
                    row: row_no,
                    field: "lesson_order",
                });
            }
            continue;
        };

        let lesson_title = required(row.lesson_title.as_ref(), row_no, "lesson_title")?;
        let (lesson_slot, card_index) = index.entry(lesson_order).or_insert_with(|| {
            lessons.push(LessonNode {
                order: lesson_order,
                title: lesson_title.clone(),
                cards: Vec::new(),
            });
            (lessons.len() - 1, HashMap::new())
        });
        let lesson = &mut lessons[*lesson_slot];

        let Some(card_order) = row.card_order else {
            if row.has_word() {
                return Err(RowSetError::MissingField {
                    row: row_no,
                    field: "card_order",
                });
            }
            continue;
        };

        let card_text = required(row.card_text.as_ref(), row_no, "card_text")?;
        let card_slot = *card_index.entry(card_order).or_insert_with(|| {
            lesson.cards.push(CardNode {
                order: card_order,
                text: card_text.clone(),
                annotations: Vec::new(),
            });
            lesson.cards.len() - 1
        });

        if row.has_word() {
            let annotation = word_annotation(row, row_no)?;
            lesson.cards[card_slot].annotations.push(annotation);
        }
    }

    Ok(DeckTree {
        course_id,
        course_level,
        course_title,
        lessons,
    })
}

fn word_annotation(row: &DeckRow, row_no: usize) -> Result<WordAnnotation, RowSetError> {
    Ok(WordAnnotation {
        start_index: required(row.word_start_index, row_no, "word_start_index")?,
        end_index: required(row.word_end_index, row_no, "word_end_index")?,
        text: required(row.word_text.clone(), row_no, "word_text")?,
        definition: required(row.word_definition.clone(), row_no, "word_definition")?,
        phonetic: row.word_phonetic.clone(),
        part_of_speech: row.word_part_of_speech.clone(),
        audio_uri: row.word_audio_uri.clone(),
        image_uri: row.word_image_uri.clone(),
    })
}

fn required<T>(value: Option<T>, row: usize, field: &'static str) -> Result<T, RowSetError> {
    value.ok_or(RowSetError::MissingField { row, field })
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
