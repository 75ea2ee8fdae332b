//! In-memory adapter for tests and prototyping.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::model::{
    Card, CardId, CardWord, Course, CourseDraft, CourseId, CourseStatus, Lesson, LessonId,
    TeacherIdentity, Word, WordDraft, WordId,
};
use course_core::ordering;
use course_core::DeckRow;

use crate::repository::{
    CardRepository, CardWordLink, CourseRepository, DeckRowSource, LessonRepository,
    NewCardRecord, NewCourseRecord, NewLessonRecord, StorageError, WordRepository,
};

#[derive(Default)]
struct MemoryState {
    last_id: u64,
    courses: BTreeMap<CourseId, Course>,
    owners: BTreeSet<(String, CourseId)>,
    lessons: Vec<Lesson>,
    cards: Vec<Card>,
    words: BTreeMap<WordId, Word>,
    card_words: Vec<CardWord>,
}

impl MemoryState {
    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    fn lesson_index(&self, course_id: CourseId, order: u32) -> Result<usize, StorageError> {
        self.lessons
            .iter()
            .position(|l| l.course_id() == course_id && l.order() == order)
            .ok_or(StorageError::NotFound)
    }

    fn lesson_orders(&self, course_id: CourseId) -> Vec<u32> {
        self.lessons
            .iter()
            .filter(|l| l.course_id() == course_id)
            .map(Lesson::order)
            .collect()
    }

    fn card_orders(&self, lesson_id: LessonId) -> Vec<u32> {
        self.cards
            .iter()
            .filter(|c| c.lesson_id() == lesson_id)
            .map(Card::order)
            .collect()
    }

    fn card_index(
        &self,
        course_id: CourseId,
        lesson_order: u32,
        order: u32,
    ) -> Result<usize, StorageError> {
        let lesson_id = self.lessons[self.lesson_index(course_id, lesson_order)?].id();
        self.cards
            .iter()
            .position(|c| c.lesson_id() == lesson_id && c.order() == order)
            .ok_or(StorageError::NotFound)
    }

    fn link_words(&mut self, card_id: CardId, words: &[CardWordLink]) -> Result<(), StorageError> {
        let mut linked = Vec::with_capacity(words.len());
        for link in words {
            if !self.words.contains_key(&link.word_id) {
                return Err(StorageError::NotFound);
            }
            linked.push(
                CardWord::new(
                    card_id,
                    link.word_id,
                    link.order,
                    link.start_index,
                    link.end_index,
                )
                .map_err(ser)?,
            );
        }
        self.card_words.retain(|cw| cw.card_id != card_id);
        self.card_words.extend(linked);
        Ok(())
    }

    fn remove_cards_of(&mut self, lesson_id: LessonId) {
        let removed: Vec<CardId> = self
            .cards
            .iter()
            .filter(|c| c.lesson_id() == lesson_id)
            .map(Card::id)
            .collect();
        self.cards.retain(|c| c.lesson_id() != lesson_id);
        self.card_words.retain(|cw| !removed.contains(&cw.card_id));
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn insert_course(
        &self,
        course: NewCourseRecord,
        owner: &TeacherIdentity,
    ) -> Result<CourseId, StorageError> {
        let mut guard = self.lock()?;
        let id = CourseId::new(guard.next_id());
        let draft = CourseDraft {
            level: course.level,
            title: course.title,
            status: course.status,
            summary: course.summary,
            description: course.description,
            thumbnail: course.thumbnail,
        };
        let course = draft.validate(id, course.updated_at).map_err(ser)?;
        guard.courses.insert(id, course);
        guard.owners.insert((owner.username().to_owned(), id));
        Ok(id)
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.courses.get(&id).cloned())
    }

    async fn list_courses(&self, owner: &TeacherIdentity) -> Result<Vec<Course>, StorageError> {
        let guard = self.lock()?;
        let mut courses: Vec<Course> = guard
            .owners
            .iter()
            .filter(|(name, _)| name == owner.username())
            .filter_map(|(_, id)| guard.courses.get(id).cloned())
            .collect();
        courses.sort_by_key(|c| (c.level(), c.id()));
        Ok(courses)
    }

    async fn set_course_status(
        &self,
        id: CourseId,
        status: CourseStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let course = guard.courses.get_mut(&id).ok_or(StorageError::NotFound)?;
        course.set_status(status, updated_at);
        Ok(())
    }
}

#[async_trait]
impl DeckRowSource for InMemoryRepository {
    async fn deck_rows(
        &self,
        course_id: CourseId,
        teacher: &TeacherIdentity,
    ) -> Result<Vec<DeckRow>, StorageError> {
        let guard = self.lock()?;
        if !guard
            .owners
            .contains(&(teacher.username().to_owned(), course_id))
        {
            return Ok(Vec::new());
        }
        let Some(course) = guard.courses.get(&course_id) else {
            return Ok(Vec::new());
        };

        let course_row = DeckRow::course(course.id(), course.level(), course.title());
        let mut lessons: Vec<&Lesson> = guard
            .lessons
            .iter()
            .filter(|l| l.course_id() == course_id)
            .collect();
        lessons.sort_by_key(|l| l.order());
        if lessons.is_empty() {
            return Ok(vec![course_row]);
        }

        let mut rows = Vec::new();
        for lesson in lessons {
            let lesson_row = course_row
                .clone()
                .with_lesson(lesson.order(), lesson.title());
            let mut cards: Vec<&Card> = guard
                .cards
                .iter()
                .filter(|c| c.lesson_id() == lesson.id())
                .collect();
            cards.sort_by_key(|c| c.order());
            if cards.is_empty() {
                rows.push(lesson_row);
                continue;
            }

            for card in cards {
                let card_row = lesson_row.clone().with_card(card.order(), card.text());
                let mut links: Vec<&CardWord> = guard
                    .card_words
                    .iter()
                    .filter(|cw| cw.card_id == card.id())
                    .collect();
                links.sort_by_key(|cw| cw.order);
                if links.is_empty() {
                    rows.push(card_row);
                    continue;
                }

                for link in links {
                    let word = guard.words.get(&link.word_id).ok_or(StorageError::NotFound)?;
                    let mut row = card_row.clone().with_word(
                        link.start_index,
                        link.end_index,
                        word.text(),
                        word.definition(),
                    );
                    row.word_phonetic = Some(word.phonetic().to_owned());
                    row.word_part_of_speech = Some(word.part_of_speech().to_owned());
                    row.word_audio_uri = word.audio_uri().map(str::to_owned);
                    row.word_image_uri = word.image_uri().map(str::to_owned);
                    rows.push(row);
                }
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl LessonRepository for InMemoryRepository {
    async fn add_lesson(&self, lesson: NewLessonRecord) -> Result<LessonId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.courses.contains_key(&lesson.course_id) {
            return Err(StorageError::NotFound);
        }
        ordering::check_append(&guard.lesson_orders(lesson.course_id), lesson.order)
            .map_err(|_| StorageError::Conflict)?;

        let id = LessonId::new(guard.next_id());
        let stored = Lesson::new(id, lesson.course_id, lesson.order, lesson.title, lesson.updated_at)
            .map_err(ser)?
            .with_audio(lesson.audio)
            .with_content(lesson.content);
        guard.lessons.push(stored);
        Ok(id)
    }

    async fn rename_lesson(
        &self,
        course_id: CourseId,
        order: u32,
        title: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let index = guard.lesson_index(course_id, order)?;
        guard.lessons[index].rename(title, updated_at).map_err(ser)
    }

    async fn delete_lesson(&self, course_id: CourseId, order: u32) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let index = guard.lesson_index(course_id, order)?;
        let plan = ordering::reindex_after_delete(&guard.lesson_orders(course_id), order)
            .map_err(|_| StorageError::NotFound)?;

        let removed = guard.lessons.remove(index);
        guard.remove_cards_of(removed.id());
        for step in plan {
            if let Some(lesson) = guard
                .lessons
                .iter_mut()
                .find(|l| l.course_id() == course_id && l.order() == step.from)
            {
                lesson.set_order(step.to);
            }
        }
        Ok(())
    }

    async fn list_lessons(&self, course_id: CourseId) -> Result<Vec<Lesson>, StorageError> {
        let guard = self.lock()?;
        let mut lessons: Vec<Lesson> = guard
            .lessons
            .iter()
            .filter(|l| l.course_id() == course_id)
            .cloned()
            .collect();
        lessons.sort_by_key(Lesson::order);
        Ok(lessons)
    }
}

#[async_trait]
impl CardRepository for InMemoryRepository {
    async fn add_card(&self, card: NewCardRecord) -> Result<CardId, StorageError> {
        let mut guard = self.lock()?;
        let lesson_id = guard.lessons[guard.lesson_index(card.course_id, card.lesson_order)?].id();
        ordering::check_append(&guard.card_orders(lesson_id), card.order)
            .map_err(|_| StorageError::Conflict)?;

        let id = CardId::new(guard.next_id());
        let stored = Card::new(id, lesson_id, card.order, card.text, card.audio_uri).map_err(ser)?;
        guard.link_words(id, &card.words)?;
        guard.cards.push(stored);
        Ok(id)
    }

    async fn update_card_text(
        &self,
        course_id: CourseId,
        lesson_order: u32,
        order: u32,
        text: &str,
        words: &[CardWordLink],
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let index = guard.card_index(course_id, lesson_order, order)?;
        let mut updated = guard.cards[index].clone();
        updated.set_text(text).map_err(ser)?;
        guard.link_words(updated.id(), words)?;
        guard.cards[index] = updated;
        Ok(())
    }

    async fn delete_card(
        &self,
        course_id: CourseId,
        lesson_order: u32,
        order: u32,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let index = guard.card_index(course_id, lesson_order, order)?;
        let lesson_id = guard.cards[index].lesson_id();
        let plan = ordering::reindex_after_delete(&guard.card_orders(lesson_id), order)
            .map_err(|_| StorageError::NotFound)?;

        let removed = guard.cards.remove(index);
        guard.card_words.retain(|cw| cw.card_id != removed.id());
        for step in plan {
            if let Some(card) = guard
                .cards
                .iter_mut()
                .find(|c| c.lesson_id() == lesson_id && c.order() == step.from)
            {
                card.set_order(step.to);
            }
        }
        Ok(())
    }

    async fn list_cards(
        &self,
        course_id: CourseId,
        lesson_order: u32,
    ) -> Result<Vec<Card>, StorageError> {
        let guard = self.lock()?;
        let lesson_id = guard.lessons[guard.lesson_index(course_id, lesson_order)?].id();
        let mut cards: Vec<Card> = guard
            .cards
            .iter()
            .filter(|c| c.lesson_id() == lesson_id)
            .cloned()
            .collect();
        cards.sort_by_key(Card::order);
        Ok(cards)
    }
}

#[async_trait]
impl WordRepository for InMemoryRepository {
    async fn insert_word(&self, word: WordDraft) -> Result<WordId, StorageError> {
        let mut guard = self.lock()?;
        let id = WordId::new(guard.next_id());
        let word = word.validate(id).map_err(ser)?;
        guard.words.insert(id, word);
        Ok(id)
    }

    async fn get_word(&self, id: WordId) -> Result<Option<Word>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.words.get(&id).cloned())
    }

    async fn find_word(&self, text: &str) -> Result<Option<Word>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .words
            .values()
            .find(|w| w.matches_surface(text))
            .cloned())
    }
}
