use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::course::non_blank;
use crate::model::ids::{CardId, WordId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WordError {
    #[error("word text cannot be empty")]
    EmptyText,

    #[error("word definition cannot be empty")]
    EmptyDefinition,

    #[error("annotation span {start}..{end} is empty or reversed")]
    InvalidSpan { start: u32, end: u32 },
}

/// Author input for a vocabulary entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordDraft {
    pub text: String,
    pub definition: String,
    pub phonetic: String,
    pub part_of_speech: String,
    pub audio_uri: Option<String>,
    pub image_uri: Option<String>,
}

impl WordDraft {
    #[must_use]
    pub fn new(text: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            definition: definition.into(),
            ..Self::default()
        }
    }

    /// Validate the draft.
    ///
    /// # Errors
    ///
    /// Returns `WordError::EmptyText` or `WordError::EmptyDefinition` for blank fields.
    pub fn validate(self, id: WordId) -> Result<Word, WordError> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(WordError::EmptyText);
        }
        let definition = self.definition.trim();
        if definition.is_empty() {
            return Err(WordError::EmptyDefinition);
        }
        Ok(Word {
            id,
            text: text.to_owned(),
            definition: definition.to_owned(),
            phonetic: self.phonetic.trim().to_owned(),
            part_of_speech: self.part_of_speech.trim().to_owned(),
            audio_uri: non_blank(self.audio_uri),
            image_uri: non_blank(self.image_uri),
        })
    }
}

/// A vocabulary entry shared by any number of cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Word {
    id: WordId,
    text: String,
    definition: String,
    phonetic: String,
    part_of_speech: String,
    audio_uri: Option<String>,
    image_uri: Option<String>,
}

impl Word {
    #[must_use]
    pub fn id(&self) -> WordId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn definition(&self) -> &str {
        &self.definition
    }

    #[must_use]
    pub fn phonetic(&self) -> &str {
        &self.phonetic
    }

    #[must_use]
    pub fn part_of_speech(&self) -> &str {
        &self.part_of_speech
    }

    #[must_use]
    pub fn audio_uri(&self) -> Option<&str> {
        self.audio_uri.as_deref()
    }

    #[must_use]
    pub fn image_uri(&self) -> Option<&str> {
        self.image_uri.as_deref()
    }

    /// Case-insensitive match against an annotated span.
    #[must_use]
    pub fn matches_surface(&self, surface: &str) -> bool {
        self.text.to_lowercase() == surface.trim().to_lowercase()
    }
}

/// Links a card to a word, covering `start..end` of the card's visible text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardWord {
    pub card_id: CardId,
    pub word_id: WordId,
    pub order: u32,
    pub start_index: u32,
    pub end_index: u32,
}

impl CardWord {
    /// Creates an annotation link.
    ///
    /// # Errors
    ///
    /// Returns `WordError::InvalidSpan` unless `start_index < end_index`.
    pub fn new(
        card_id: CardId,
        word_id: WordId,
        order: u32,
        start_index: u32,
        end_index: u32,
    ) -> Result<Self, WordError> {
        if start_index >= end_index {
            return Err(WordError::InvalidSpan {
                start: start_index,
                end: end_index,
            });
        }
        Ok(Self {
            card_id,
            word_id,
            order,
            start_index,
            end_index,
        })
    }
}
