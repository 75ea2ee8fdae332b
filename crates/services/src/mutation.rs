//! Fire-and-forget course edits applied in dispatch order.
//!
//! Callers hand a [`Mutation`] to the [`MutationDispatcher`] and get a
//! [`Ticket`] back immediately. A single worker applies queued mutations one
//! at a time, reloads the edited course, and publishes the new tree on a
//! `watch` channel. Every outcome is also broadcast as a [`DispatchEvent`];
//! failures never reach the caller of [`MutationDispatcher::dispatch`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use course_core::DeckTree;
use course_core::model::{CourseId, TeacherIdentity};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::card_service::CardService;
use crate::deck_service::DeckService;
use crate::error::MutationError;
use crate::lesson_service::LessonService;

/// Identifies one dispatched mutation in the event stream.
pub type Ticket = u64;

const EVENT_CAPACITY: usize = 64;

/// A single edit to a course's lessons or cards.
///
/// Lessons are addressed by order within the course and cards by order within
/// their lesson. Inserts carry the position the caller computed from its
/// snapshot; a position taken in the meantime fails with a conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Mutation {
    AddLesson {
        course_id: CourseId,
        order: u32,
        title: String,
    },
    RenameLesson {
        course_id: CourseId,
        order: u32,
        title: String,
    },
    DeleteLesson {
        course_id: CourseId,
        order: u32,
    },
    AddCard {
        course_id: CourseId,
        lesson_order: u32,
        order: u32,
        text: String,
    },
    EditCard {
        course_id: CourseId,
        lesson_order: u32,
        order: u32,
        text: String,
    },
    DeleteCard {
        course_id: CourseId,
        lesson_order: u32,
        order: u32,
    },
}

impl Mutation {
    #[must_use]
    pub fn course_id(&self) -> CourseId {
        match self {
            Mutation::AddLesson { course_id, .. }
            | Mutation::RenameLesson { course_id, .. }
            | Mutation::DeleteLesson { course_id, .. }
            | Mutation::AddCard { course_id, .. }
            | Mutation::EditCard { course_id, .. }
            | Mutation::DeleteCard { course_id, .. } => *course_id,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::AddLesson { .. } => "add_lesson",
            Mutation::RenameLesson { .. } => "rename_lesson",
            Mutation::DeleteLesson { .. } => "delete_lesson",
            Mutation::AddCard { .. } => "add_card",
            Mutation::EditCard { .. } => "edit_card",
            Mutation::DeleteCard { .. } => "delete_card",
        }
    }
}

/// Outcome of one dispatched mutation.
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    Applied {
        ticket: Ticket,
        mutation: Mutation,
        tree: Arc<DeckTree>,
    },
    Failed {
        ticket: Ticket,
        mutation: Mutation,
        error: String,
    },
}

impl DispatchEvent {
    #[must_use]
    pub fn ticket(&self) -> Ticket {
        match self {
            DispatchEvent::Applied { ticket, .. } | DispatchEvent::Failed { ticket, .. } => *ticket,
        }
    }
}

/// Wait for the event of `ticket`, skipping other tickets.
///
/// `events` must be subscribed before the mutation is dispatched. Returns
/// `None` once the dispatcher has shut down.
pub async fn wait_for(
    events: &mut broadcast::Receiver<DispatchEvent>,
    ticket: Ticket,
) -> Option<DispatchEvent> {
    loop {
        match events.recv().await {
            Ok(event) if event.ticket() == ticket => return Some(event),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "dispatch event receiver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

struct Applier {
    teacher: TeacherIdentity,
    deck: DeckService,
    lessons: LessonService,
    cards: CardService,
}

impl Applier {
    async fn apply(&self, mutation: &Mutation) -> Result<Arc<DeckTree>, MutationError> {
        match mutation {
            Mutation::AddLesson {
                course_id,
                order,
                title,
            } => self.lessons.add_lesson(*course_id, *order, title).await?,
            Mutation::RenameLesson {
                course_id,
                order,
                title,
            } => self.lessons.rename_lesson(*course_id, *order, title).await?,
            Mutation::DeleteLesson { course_id, order } => {
                self.lessons.delete_lesson(*course_id, *order).await?;
            }
            Mutation::AddCard {
                course_id,
                lesson_order,
                order,
                text,
            } => {
                self.cards
                    .add_card(*course_id, *lesson_order, *order, text)
                    .await?;
            }
            Mutation::EditCard {
                course_id,
                lesson_order,
                order,
                text,
            } => {
                self.cards
                    .edit_card(*course_id, *lesson_order, *order, text)
                    .await?;
            }
            Mutation::DeleteCard {
                course_id,
                lesson_order,
                order,
            } => {
                self.cards
                    .delete_card(*course_id, *lesson_order, *order)
                    .await?;
            }
        }
        Ok(self
            .deck
            .load_tree(mutation.course_id(), &self.teacher)
            .await?)
    }
}

/// Ordered, fire-and-forget mutation queue for one teacher.
pub struct MutationDispatcher {
    queue: mpsc::UnboundedSender<(Ticket, Mutation)>,
    next_ticket: AtomicU64,
    snapshots: watch::Receiver<Option<Arc<DeckTree>>>,
    events: broadcast::Sender<DispatchEvent>,
    worker: JoinHandle<()>,
}

impl MutationDispatcher {
    /// Start the worker task. Must be called from within a Tokio runtime.
    #[must_use]
    pub fn spawn(
        teacher: TeacherIdentity,
        deck: DeckService,
        lessons: LessonService,
        cards: CardService,
    ) -> Self {
        let (queue, mut inbox) = mpsc::unbounded_channel::<(Ticket, Mutation)>();
        let (snapshot_tx, snapshots) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let applier = Applier {
            teacher,
            deck,
            lessons,
            cards,
        };
        let publisher = events.clone();
        let worker = tokio::spawn(async move {
            while let Some((ticket, mutation)) = inbox.recv().await {
                let span = tracing::info_span!("mutation", ticket, kind = mutation.kind());
                let outcome = applier.apply(&mutation).instrument(span).await;
                let event = match outcome {
                    Ok(tree) => {
                        tracing::info!(ticket, kind = mutation.kind(), "mutation applied");
                        snapshot_tx.send_replace(Some(Arc::clone(&tree)));
                        DispatchEvent::Applied {
                            ticket,
                            mutation,
                            tree,
                        }
                    }
                    Err(err) => {
                        tracing::warn!(ticket, kind = mutation.kind(), error = %err, "mutation failed");
                        DispatchEvent::Failed {
                            ticket,
                            mutation,
                            error: err.to_string(),
                        }
                    }
                };
                // No subscribers is fine; the snapshot channel still carries the result.
                let _ = publisher.send(event);
            }
            tracing::debug!("mutation queue closed");
        });

        Self {
            queue,
            next_ticket: AtomicU64::new(1),
            snapshots,
            events,
            worker,
        }
    }

    /// Queue a mutation and return without waiting for it to apply.
    pub fn dispatch(&self, mutation: Mutation) -> Ticket {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(ticket, kind = mutation.kind(), "dispatching mutation");
        if let Err(mpsc::error::SendError((ticket, mutation))) = self.queue.send((ticket, mutation))
        {
            tracing::warn!(ticket, kind = mutation.kind(), "mutation worker stopped");
            let _ = self.events.send(DispatchEvent::Failed {
                ticket,
                mutation,
                error: "mutation worker stopped".to_owned(),
            });
        }
        ticket
    }

    /// Latest tree published after an applied mutation.
    #[must_use]
    pub fn snapshots(&self) -> watch::Receiver<Option<Arc<DeckTree>>> {
        self.snapshots.clone()
    }

    /// Subscribe to outcomes of mutations dispatched from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events.subscribe()
    }

    /// Stop accepting mutations and wait for the queued ones to finish.
    pub async fn shutdown(self) {
        drop(self.queue);
        if let Err(err) = self.worker.await {
            tracing::warn!(error = %err, "mutation worker ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use course_core::model::CourseDraft;
    use course_core::time::fixed_now;
    use storage::repository::Storage;

    use crate::Clock;

    async fn setup() -> (MutationDispatcher, CourseId) {
        let storage = Storage::in_memory();
        let clock = Clock::fixed(fixed_now());
        let teacher = TeacherIdentity::new("teacher1").unwrap();
        let deck = DeckService::new(clock, Arc::clone(&storage.courses), Arc::clone(&storage.rows));
        let course_id = deck
            .create_course(CourseDraft::new(1, "School"), &teacher)
            .await
            .unwrap();
        let dispatcher = MutationDispatcher::spawn(
            teacher,
            deck,
            LessonService::new(clock, Arc::clone(&storage.lessons)),
            CardService::new(Arc::clone(&storage.cards), Arc::clone(&storage.words)),
        );
        (dispatcher, course_id)
    }

    #[tokio::test]
    async fn mutations_apply_in_dispatch_order() {
        let (dispatcher, course_id) = setup().await;
        let mut events = dispatcher.subscribe();

        dispatcher.dispatch(Mutation::AddLesson {
            course_id,
            order: 0,
            title: "Introduction".to_owned(),
        });
        dispatcher.dispatch(Mutation::AddLesson {
            course_id,
            order: 1,
            title: "Chapter 1".to_owned(),
        });
        let last = dispatcher.dispatch(Mutation::AddCard {
            course_id,
            lesson_order: 1,
            order: 0,
            text: "Is your school #big# or #little#?".to_owned(),
        });

        let Some(DispatchEvent::Applied { tree, .. }) = wait_for(&mut events, last).await else {
            panic!("card was not applied");
        };
        assert_eq!(tree.lesson_orders(), vec![0, 1]);
        assert_eq!(tree.lesson(1).unwrap().card_orders(), vec![0]);

        let latest = dispatcher.snapshots().borrow().clone().unwrap();
        assert!(Arc::ptr_eq(&latest, &tree));
    }

    #[tokio::test]
    async fn failures_are_published_not_returned() {
        let (dispatcher, course_id) = setup().await;
        let mut events = dispatcher.subscribe();

        let ticket = dispatcher.dispatch(Mutation::DeleteLesson {
            course_id,
            order: 4,
        });

        match wait_for(&mut events, ticket).await {
            Some(DispatchEvent::Failed { mutation, error, .. }) => {
                assert_eq!(mutation.kind(), "delete_lesson");
                assert_eq!(error, "not found");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(dispatcher.snapshots().borrow().is_none());
    }

    #[tokio::test]
    async fn stale_card_order_fails_with_conflict() {
        let (dispatcher, course_id) = setup().await;
        let mut events = dispatcher.subscribe();

        dispatcher.dispatch(Mutation::AddLesson {
            course_id,
            order: 0,
            title: "Chapter 1".to_owned(),
        });
        let first = dispatcher.dispatch(Mutation::AddCard {
            course_id,
            lesson_order: 0,
            order: 0,
            text: "#New# or #old#?".to_owned(),
        });
        // Computed from the same snapshot as the first card.
        let stale = dispatcher.dispatch(Mutation::AddCard {
            course_id,
            lesson_order: 0,
            order: 0,
            text: "Is your school #big#?".to_owned(),
        });

        assert!(matches!(
            wait_for(&mut events, first).await,
            Some(DispatchEvent::Applied { .. })
        ));
        match wait_for(&mut events, stale).await {
            Some(DispatchEvent::Failed { mutation, error, .. }) => {
                assert_eq!(mutation.kind(), "add_card");
                assert_eq!(error, "conflict");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let tree = dispatcher.snapshots().borrow().clone().unwrap();
        let lesson = tree.lesson(0).unwrap();
        assert_eq!(lesson.card_orders(), vec![0]);
        assert_eq!(lesson.cards[0].text, "#New# or #old#?");
        assert_eq!(lesson.next_card_order(), 1);
    }

    #[tokio::test]
    async fn shutdown_drains_queue() {
        let (dispatcher, course_id) = setup().await;
        let snapshots = dispatcher.snapshots();
        for (order, title) in (0..).zip(["A", "B", "C"]) {
            dispatcher.dispatch(Mutation::AddLesson {
                course_id,
                order,
                title: title.to_owned(),
            });
        }
        dispatcher.shutdown().await;

        let tree = snapshots.borrow().clone().unwrap();
        let titles: Vec<&str> = tree.lessons.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }
}
