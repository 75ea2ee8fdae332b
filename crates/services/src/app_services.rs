use std::sync::Arc;

use course_core::model::TeacherIdentity;
use storage::repository::Storage;

use crate::Clock;
use crate::card_service::CardService;
use crate::deck_service::DeckService;
use crate::error::AppServicesError;
use crate::lesson_service::LessonService;
use crate::mutation::MutationDispatcher;

/// Assembles the authoring services for one signed-in teacher.
#[derive(Clone)]
pub struct AppServices {
    teacher: TeacherIdentity,
    deck_service: Arc<DeckService>,
    lesson_service: Arc<LessonService>,
    card_service: Arc<CardService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        teacher: TeacherIdentity,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        tracing::info!(teacher = %teacher, "authoring services ready");
        Ok(Self::from_storage(&storage, clock, teacher))
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, teacher: TeacherIdentity) -> Self {
        let deck_service = Arc::new(DeckService::new(
            clock,
            Arc::clone(&storage.courses),
            Arc::clone(&storage.rows),
        ));
        let lesson_service = Arc::new(LessonService::new(clock, Arc::clone(&storage.lessons)));
        let card_service = Arc::new(CardService::new(
            Arc::clone(&storage.cards),
            Arc::clone(&storage.words),
        ));
        Self {
            teacher,
            deck_service,
            lesson_service,
            card_service,
        }
    }

    #[must_use]
    pub fn teacher(&self) -> &TeacherIdentity {
        &self.teacher
    }

    #[must_use]
    pub fn deck_service(&self) -> Arc<DeckService> {
        Arc::clone(&self.deck_service)
    }

    #[must_use]
    pub fn lesson_service(&self) -> Arc<LessonService> {
        Arc::clone(&self.lesson_service)
    }

    #[must_use]
    pub fn card_service(&self) -> Arc<CardService> {
        Arc::clone(&self.card_service)
    }

    /// Start a mutation dispatcher for this teacher. Requires a Tokio runtime.
    #[must_use]
    pub fn dispatcher(&self) -> MutationDispatcher {
        MutationDispatcher::spawn(
            self.teacher.clone(),
            DeckService::clone(&self.deck_service),
            LessonService::clone(&self.lesson_service),
            CardService::clone(&self.card_service),
        )
    }
}
