use std::sync::Arc;

use course_core::model::{Card, CardId, CourseId, LessonId, WordDraft, WordId};
use storage::repository::{
    CardRepository, CardWordLink, NewCardRecord, StorageError, WordRepository,
};

use crate::error::MutationError;

/// Orchestrates card edits and the vocabulary links they carry.
#[derive(Clone)]
pub struct CardService {
    cards: Arc<dyn CardRepository>,
    words: Arc<dyn WordRepository>,
}

impl CardService {
    #[must_use]
    pub fn new(cards: Arc<dyn CardRepository>, words: Arc<dyn WordRepository>) -> Self {
        Self { cards, words }
    }

    /// Insert a card at `order` in a lesson, normally the sibling count the
    /// caller saw in its snapshot (see `LessonNode::next_card_order`).
    ///
    /// Each annotated span is linked to the vocabulary entry with the same
    /// text, ignoring case; spans with no such entry stay unlinked.
    ///
    /// # Errors
    ///
    /// Returns `MutationError::Card` for blank text or unbalanced markup.
    /// Returns `MutationError::Storage` if the lesson is missing, `order` is
    /// already taken (`StorageError::Conflict`), or the write fails.
    pub async fn add_card(
        &self,
        course_id: CourseId,
        lesson_order: u32,
        order: u32,
        text: &str,
    ) -> Result<(), MutationError> {
        let card = Card::new(CardId::new(1), LessonId::new(1), order, text, None)?;
        let links = self.link_annotations(&card).await?;
        let linked = links.len();

        self.cards
            .add_card(NewCardRecord::from_card(course_id, lesson_order, &card, links))
            .await?;
        tracing::info!(course_id = %course_id, lesson_order, order, linked, "added card");
        Ok(())
    }

    /// Replace a card's text and re-link its annotations.
    ///
    /// # Errors
    ///
    /// Returns `MutationError::Card` for blank text or unbalanced markup.
    /// Returns `MutationError::Storage` if the card is missing.
    pub async fn edit_card(
        &self,
        course_id: CourseId,
        lesson_order: u32,
        order: u32,
        text: &str,
    ) -> Result<(), MutationError> {
        let card = Card::new(CardId::new(1), LessonId::new(1), order, text, None)?;
        let links = self.link_annotations(&card).await?;
        self.cards
            .update_card_text(course_id, lesson_order, order, card.text(), &links)
            .await?;
        tracing::info!(course_id = %course_id, lesson_order, order, "edited card");
        Ok(())
    }

    /// Delete a card; later cards of the lesson move down by one.
    ///
    /// # Errors
    ///
    /// Returns `MutationError::Storage` if the card is missing.
    pub async fn delete_card(
        &self,
        course_id: CourseId,
        lesson_order: u32,
        order: u32,
    ) -> Result<(), MutationError> {
        self.cards.delete_card(course_id, lesson_order, order).await?;
        tracing::info!(course_id = %course_id, lesson_order, order, "deleted card");
        Ok(())
    }

    /// Add a vocabulary entry that later card annotations can link to.
    ///
    /// # Errors
    ///
    /// Returns `MutationError::Word` for a blank text or definition.
    /// Returns `MutationError::Storage` if persistence fails.
    pub async fn add_word(&self, draft: WordDraft) -> Result<WordId, MutationError> {
        draft.clone().validate(WordId::new(1))?;
        let id = self.words.insert_word(draft).await?;
        tracing::info!(word_id = %id, "added word");
        Ok(id)
    }

    async fn link_annotations(&self, card: &Card) -> Result<Vec<CardWordLink>, StorageError> {
        let mut links = Vec::new();
        for annotation in card.annotations().filter(|a| !a.is_empty()) {
            let Some(word) = self.words.find_word(annotation.text).await? else {
                tracing::debug!(surface = annotation.text, "no vocabulary entry for span");
                continue;
            };
            links.push(CardWordLink {
                word_id: word.id(),
                order: offset("word_order", links.len())?,
                start_index: offset("start_index", annotation.start)?,
                end_index: offset("end_index", annotation.end)?,
            });
        }
        Ok(links)
    }
}

fn offset(field: &'static str, value: usize) -> Result<u32, StorageError> {
    u32::try_from(value).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}
