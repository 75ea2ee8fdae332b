use std::sync::Arc;

use course_core::model::{CourseId, TeacherIdentity};
use course_core::{
    CardNode, DeckTree, LessonNode, Reconciliation, Selection, SelectionError, SelectionState,
};
use tokio::sync::watch;

use crate::deck_service::DeckService;
use crate::error::BrowserError;
use crate::mutation::DispatchEvent;

/// Master-detail browsing state for one course.
///
/// Holds the current tree snapshot and the highlighted lesson and card;
/// every refresh replaces the snapshot and reconciles the selection against it.
#[derive(Debug, Clone)]
pub struct BrowserSession {
    course_id: CourseId,
    selection: Selection,
}

impl BrowserSession {
    /// Load a course and select its lowest lesson and card.
    ///
    /// # Errors
    ///
    /// Returns `BrowserError` if the course cannot be loaded.
    pub async fn open(
        deck: &DeckService,
        course_id: CourseId,
        teacher: &TeacherIdentity,
    ) -> Result<Self, BrowserError> {
        let tree = deck.load_tree(course_id, teacher).await?;
        Ok(Self::from_snapshot(tree))
    }

    #[must_use]
    pub fn from_snapshot(tree: Arc<DeckTree>) -> Self {
        Self {
            course_id: tree.course_id,
            selection: Selection::new(tree),
        }
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn tree(&self) -> &Arc<DeckTree> {
        self.selection.snapshot()
    }

    #[must_use]
    pub fn state(&self) -> SelectionState {
        self.selection.state()
    }

    #[must_use]
    pub fn selected_lesson(&self) -> Option<&LessonNode> {
        self.selection.selected_lesson()
    }

    #[must_use]
    pub fn selected_card(&self) -> Option<&CardNode> {
        self.selection.selected_card()
    }

    /// # Errors
    ///
    /// Returns `SelectionError::UnknownLesson` if the lesson does not exist.
    pub fn select_lesson(&mut self, order: u32) -> Result<SelectionState, SelectionError> {
        self.selection.select_lesson(order)
    }

    /// # Errors
    ///
    /// Returns `SelectionError::UnknownCard` if the selected lesson has no such card.
    pub fn select_card(&mut self, order: u32) -> Result<SelectionState, SelectionError> {
        self.selection.select_card(order)
    }

    /// Swap in a newer snapshot of this course.
    ///
    /// Snapshots of other courses are ignored.
    pub fn apply_snapshot(&mut self, tree: Arc<DeckTree>) -> Reconciliation {
        if tree.course_id != self.course_id {
            tracing::debug!(
                course_id = %tree.course_id,
                browsing = %self.course_id,
                "ignoring snapshot of another course"
            );
            return Reconciliation::Unchanged;
        }
        let outcome = self.selection.refresh(tree);
        tracing::debug!(?outcome, state = ?self.selection.state(), "browser refreshed");
        outcome
    }

    /// Apply the tree carried by an applied mutation; failures change nothing.
    pub fn apply_event(&mut self, event: &DispatchEvent) -> Option<Reconciliation> {
        match event {
            DispatchEvent::Applied { tree, .. } => Some(self.apply_snapshot(Arc::clone(tree))),
            DispatchEvent::Failed { .. } => None,
        }
    }

    /// Wait for the next published snapshot and apply it.
    ///
    /// Returns `None` once the publisher is gone.
    pub async fn follow(
        &mut self,
        snapshots: &mut watch::Receiver<Option<Arc<DeckTree>>>,
    ) -> Option<Reconciliation> {
        loop {
            snapshots.changed().await.ok()?;
            let latest = snapshots.borrow_and_update().clone();
            if let Some(tree) = latest {
                return Some(self.apply_snapshot(tree));
            }
        }
    }

    /// Reload the course from storage and reconcile the selection.
    ///
    /// # Errors
    ///
    /// Returns `BrowserError` if the course cannot be loaded; the session keeps
    /// its previous snapshot.
    pub async fn reload(
        &mut self,
        deck: &DeckService,
        teacher: &TeacherIdentity,
    ) -> Result<Reconciliation, BrowserError> {
        let tree = deck.load_tree(self.course_id, teacher).await?;
        Ok(self.apply_snapshot(tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use course_core::DeckRow;
    use course_core::reduce_rows;

    fn tree(course: u64, rows: &[(u32, Option<u32>)]) -> Arc<DeckTree> {
        let base = DeckRow::course(CourseId::new(course), 1, "School");
        let rows: Vec<DeckRow> = rows
            .iter()
            .map(|(lesson, card)| {
                let row = base.clone().with_lesson(*lesson, format!("Lesson {lesson}"));
                match card {
                    Some(card) => row.with_card(*card, format!("card {card}")),
                    None => row,
                }
            })
            .collect();
        Arc::new(reduce_rows(&rows).unwrap())
    }

    #[test]
    fn snapshot_for_other_course_is_ignored() {
        let mut session = BrowserSession::from_snapshot(tree(1, &[(0, Some(0))]));
        let outcome = session.apply_snapshot(tree(2, &[(5, None)]));
        assert_eq!(outcome, Reconciliation::Unchanged);
        assert_eq!(session.tree().course_id, CourseId::new(1));
    }

    #[test]
    fn failed_event_leaves_selection() {
        let mut session =
            BrowserSession::from_snapshot(tree(1, &[(0, Some(0)), (0, Some(1))]));
        session.select_card(1).unwrap();
        let event = DispatchEvent::Failed {
            ticket: 1,
            mutation: crate::mutation::Mutation::DeleteCard {
                course_id: CourseId::new(1),
                lesson_order: 0,
                order: 9,
            },
            error: "not found".to_owned(),
        };
        assert_eq!(session.apply_event(&event), None);
        assert_eq!(session.state().card, Some(1));
    }

    #[tokio::test]
    async fn follow_applies_published_snapshot() {
        let mut session =
            BrowserSession::from_snapshot(tree(1, &[(0, Some(0)), (0, Some(1))]));
        session.select_card(1).unwrap();

        let (tx, mut rx) = watch::channel(None);
        tx.send_replace(Some(tree(1, &[(0, Some(0))])));
        assert_eq!(
            session.follow(&mut rx).await,
            Some(Reconciliation::CardFallback)
        );
        assert_eq!(session.state().card, Some(0));

        drop(tx);
        assert_eq!(session.follow(&mut rx).await, None);
    }
}
