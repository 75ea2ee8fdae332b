use thiserror::Error;

use crate::markup::{self, Annotations, MarkupError};
use crate::model::ids::{CardId, LessonId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CardError {
    #[error("card text cannot be empty")]
    EmptyText,

    #[error(transparent)]
    Markup(#[from] MarkupError),
}

//
// ─── CARD ──────────────────────────────────────────────────────────────────────
//

/// A flashcard within a lesson.
///
/// The front text may carry `#word#` annotations; it is checked for balanced
/// delimiters on construction so decoding a stored card cannot fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    id: CardId,
    lesson_id: LessonId,
    order: u32,
    text: String,
    audio_uri: Option<String>,
}

impl Card {
    /// Creates a card.
    ///
    /// # Errors
    ///
    /// Returns `CardError::EmptyText` for blank text and `CardError::Markup`
    /// for unbalanced `#` delimiters.
    pub fn new(
        id: CardId,
        lesson_id: LessonId,
        order: u32,
        text: impl Into<String>,
        audio_uri: Option<String>,
    ) -> Result<Self, CardError> {
        let text = validate_text(text)?;
        Ok(Self {
            id,
            lesson_id,
            order,
            text,
            audio_uri: audio_uri.filter(|uri| !uri.trim().is_empty()),
        })
    }

    /// Replace the card text.
    ///
    /// # Errors
    ///
    /// Same as [`Card::new`]; on error the card is unchanged.
    pub fn set_text(&mut self, text: impl Into<String>) -> Result<(), CardError> {
        self.text = validate_text(text)?;
        Ok(())
    }

    pub fn set_order(&mut self, order: u32) {
        self.order = order;
    }

    #[must_use]
    pub fn id(&self) -> CardId {
        self.id
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    /// Raw text including `#` delimiters.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn audio_uri(&self) -> Option<&str> {
        self.audio_uri.as_deref()
    }

    /// Annotations in the card text.
    #[must_use]
    pub fn annotations(&self) -> Annotations<'_> {
        // Balanced on construction, so the empty fallback is never taken.
        markup::decode_annotations(&self.text).unwrap_or_else(|_| Annotations::empty())
    }
}

fn validate_text(text: impl Into<String>) -> Result<String, CardError> {
    let text = text.into();
    if text.trim().is_empty() {
        return Err(CardError::EmptyText);
    }
    markup::decode_annotations(&text)?;
    Ok(text)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
