//! Lesson/card selection for the master-detail course browser.

use std::sync::Arc;

use thiserror::Error;

use crate::tree::{CardNode, DeckTree, LessonNode};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SelectionError {
    #[error("lesson {0} does not exist")]
    UnknownLesson(u32),

    #[error("card {card} is not in the selected lesson")]
    UnknownCard { card: u32, lesson: Option<u32> },
}

/// Which lesson and card are highlighted, by order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionState {
    pub lesson: Option<u32>,
    pub card: Option<u32>,
}

/// What a snapshot refresh did to the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Same tree as before; nothing was recomputed.
    Unchanged,
    /// The selected lesson and card both still exist.
    Kept,
    /// The selected card disappeared; the lesson's lowest card was picked.
    CardFallback,
    /// The selected lesson disappeared; the course's lowest lesson was picked.
    LessonFallback,
}

/// Long-lived selection over a sequence of immutable tree snapshots.
///
/// Each refresh swaps the whole snapshot; the tree itself is never mutated.
#[derive(Debug, Clone)]
pub struct Selection {
    snapshot: Arc<DeckTree>,
    state: SelectionState,
}

impl Selection {
    /// Select the lowest lesson and, within it, the lowest card.
    #[must_use]
    pub fn new(snapshot: Arc<DeckTree>) -> Self {
        let lesson = snapshot.min_lesson_order();
        let state = SelectionState {
            lesson,
            card: lesson.and_then(|order| lowest_card(&snapshot, order)),
        };
        Self { snapshot, state }
    }

    #[must_use]
    pub fn state(&self) -> SelectionState {
        self.state
    }

    #[must_use]
    pub fn snapshot(&self) -> &Arc<DeckTree> {
        &self.snapshot
    }

    #[must_use]
    pub fn selected_lesson(&self) -> Option<&LessonNode> {
        self.state
            .lesson
            .and_then(|order| self.snapshot.lesson(order))
    }

    #[must_use]
    pub fn selected_card(&self) -> Option<&CardNode> {
        let card = self.state.card?;
        self.selected_lesson()?.card(card)
    }

    /// Select a lesson and reset the card to that lesson's lowest card.
    ///
    /// The previous card selection is never carried over, even when the new
    /// lesson has a card with the same order.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::UnknownLesson` if no lesson has `order`; the
    /// selection is unchanged.
    pub fn select_lesson(&mut self, order: u32) -> Result<SelectionState, SelectionError> {
        let lesson = self
            .snapshot
            .lesson(order)
            .ok_or(SelectionError::UnknownLesson(order))?;
        self.state = SelectionState {
            lesson: Some(order),
            card: lesson.min_card_order(),
        };
        Ok(self.state)
    }

    /// Select a card of the current lesson.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::UnknownCard` if the selected lesson has no
    /// card with `order`; the selection is unchanged.
    pub fn select_card(&mut self, order: u32) -> Result<SelectionState, SelectionError> {
        let exists = self
            .selected_lesson()
            .is_some_and(|lesson| lesson.card(order).is_some());
        if !exists {
            return Err(SelectionError::UnknownCard {
                card: order,
                lesson: self.state.lesson,
            });
        }
        self.state.card = Some(order);
        Ok(self.state)
    }

    /// Replace the snapshot after a data refresh.
    ///
    /// A snapshot equal to the current one leaves the selection alone. Otherwise
    /// a still-present card stays selected; a vanished card falls back to the
    /// lowest card of the lesson, and a vanished lesson to the lowest lesson.
    pub fn refresh(&mut self, snapshot: Arc<DeckTree>) -> Reconciliation {
        if Arc::ptr_eq(&self.snapshot, &snapshot) || *self.snapshot == *snapshot {
            self.snapshot = snapshot;
            return Reconciliation::Unchanged;
        }
        self.snapshot = snapshot;

        let lesson = self
            .state
            .lesson
            .and_then(|order| self.snapshot.lesson(order));
        match lesson {
            Some(lesson) => {
                if self.state.card.is_some_and(|card| lesson.card(card).is_some())
                    || (self.state.card.is_none() && lesson.cards.is_empty())
                {
                    Reconciliation::Kept
                } else {
                    self.state.card = lesson.min_card_order();
                    Reconciliation::CardFallback
                }
            }
            None => {
                let fallback = Self::new(Arc::clone(&self.snapshot));
                self.state = fallback.state;
                Reconciliation::LessonFallback
            }
        }
    }
}

fn lowest_card(tree: &DeckTree, lesson: u32) -> Option<u32> {
    tree.lesson(lesson).and_then(LessonNode::min_card_order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CourseId;
    use crate::tree::{DeckRow, reduce_rows};

    fn school() -> DeckRow {
        DeckRow::course(CourseId::new(1), 1, "School")
    }

    fn tree(rows: &[DeckRow]) -> Arc<DeckTree> {
        Arc::new(reduce_rows(rows).unwrap())
    }

    fn two_lessons() -> Arc<DeckTree> {
        tree(&[
            school().with_lesson(0, "Introduction"),
            school()
                .with_lesson(1, "Chapter 1")
                .with_card(0, "Is your school #big# or #little#?"),
            school().with_lesson(1, "Chapter 1").with_card(1, "#New# or #old#?"),
        ])
    }

    #[test]
    fn starts_on_lowest_lesson_with_no_card() {
        let selection = Selection::new(two_lessons());
        assert_eq!(
            selection.state(),
            SelectionState {
                lesson: Some(0),
                card: None
            }
        );
        assert!(selection.selected_card().is_none());
    }

    #[test]
    fn selecting_lesson_picks_its_lowest_card() {
        let mut selection = Selection::new(two_lessons());
        let state = selection.select_lesson(1).unwrap();
        assert_eq!(
            state,
            SelectionState {
                lesson: Some(1),
                card: Some(0)
            }
        );
        assert_eq!(selection.selected_card().unwrap().text, "Is your school #big# or #little#?");
    }

    #[test]
    fn selecting_lesson_never_keeps_previous_card() {
        let snapshot = tree(&[
            school().with_lesson(0, "A").with_card(0, "a0"),
            school().with_lesson(0, "A").with_card(1, "a1"),
            school().with_lesson(1, "B").with_card(0, "b0"),
            school().with_lesson(1, "B").with_card(1, "b1"),
        ]);
        let mut selection = Selection::new(snapshot);
        selection.select_card(1).unwrap();
        selection.select_lesson(1).unwrap();
        assert_eq!(selection.state().card, Some(0));

        selection.select_card(1).unwrap();
        selection.select_lesson(1).unwrap();
        assert_eq!(selection.state().card, Some(0));
    }

    #[test]
    fn invalid_selections_leave_state_intact() {
        let mut selection = Selection::new(two_lessons());
        selection.select_lesson(1).unwrap();
        selection.select_card(1).unwrap();
        let before = selection.state();

        assert_eq!(
            selection.select_card(7).unwrap_err(),
            SelectionError::UnknownCard {
                card: 7,
                lesson: Some(1)
            }
        );
        assert_eq!(
            selection.select_lesson(9).unwrap_err(),
            SelectionError::UnknownLesson(9)
        );
        assert_eq!(selection.state(), before);
    }

    #[test]
    fn empty_course_has_nothing_selected() {
        let mut selection = Selection::new(tree(&[school()]));
        assert_eq!(selection.state(), SelectionState::default());
        assert!(selection.select_card(0).is_err());
    }

    #[test]
    fn identical_refresh_keeps_user_choice() {
        let mut selection = Selection::new(two_lessons());
        selection.select_lesson(1).unwrap();
        selection.select_card(1).unwrap();

        assert_eq!(selection.refresh(two_lessons()), Reconciliation::Unchanged);
        assert_eq!(selection.state().card, Some(1));
    }

    #[test]
    fn added_card_keeps_selection() {
        let mut selection = Selection::new(two_lessons());
        selection.select_lesson(1).unwrap();
        selection.select_card(1).unwrap();

        let grown = tree(&[
            school().with_lesson(0, "Introduction"),
            school().with_lesson(1, "Chapter 1").with_card(0, "first"),
            school().with_lesson(1, "Chapter 1").with_card(1, "second"),
            school().with_lesson(1, "Chapter 1").with_card(2, "third"),
        ]);
        assert_eq!(selection.refresh(grown), Reconciliation::Kept);
        assert_eq!(selection.state().card, Some(1));
    }

    #[test]
    fn deleted_card_falls_back_to_new_minimum() {
        let mut selection = Selection::new(two_lessons());
        selection.select_lesson(1).unwrap();
        selection.select_card(1).unwrap();

        // Card 0 deleted, card 1 re-indexed to 0.
        let shrunk = tree(&[
            school().with_lesson(0, "Introduction"),
            school().with_lesson(1, "Chapter 1").with_card(0, "#New# or #old#?"),
        ]);
        assert_eq!(selection.refresh(shrunk), Reconciliation::CardFallback);
        assert_eq!(
            selection.state(),
            SelectionState {
                lesson: Some(1),
                card: Some(0)
            }
        );
    }

    #[test]
    fn first_card_added_to_empty_lesson_is_selected() {
        let mut selection = Selection::new(two_lessons());
        let grown = tree(&[
            school().with_lesson(0, "Introduction").with_card(0, "hello"),
            school().with_lesson(1, "Chapter 1").with_card(0, "x"),
        ]);
        assert_eq!(selection.refresh(grown), Reconciliation::CardFallback);
        assert_eq!(selection.state().card, Some(0));
    }

    #[test]
    fn deleted_lesson_falls_back_to_lowest_lesson() {
        let mut selection = Selection::new(two_lessons());
        selection.select_lesson(1).unwrap();

        let shrunk = tree(&[school().with_lesson(0, "Introduction").with_card(0, "only")]);
        assert_eq!(selection.refresh(shrunk), Reconciliation::LessonFallback);
        assert_eq!(
            selection.state(),
            SelectionState {
                lesson: Some(0),
                card: Some(0)
            }
        );
    }
}
