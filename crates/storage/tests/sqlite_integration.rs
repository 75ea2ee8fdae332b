use course_core::model::{CourseDraft, CourseId, CourseStatus, TeacherIdentity, WordDraft};
use course_core::reduce_rows;
use course_core::time::fixed_now;
use storage::repository::{
    CardRepository, CardWordLink, CourseRepository, DeckRowSource, LessonRepository,
    NewCardRecord, NewCourseRecord, NewLessonRecord, StorageError, WordRepository,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn teacher() -> TeacherIdentity {
    TeacherIdentity::new("teacher1").unwrap()
}

async fn seed_course(repo: &SqliteRepository, lessons: &[&str]) -> CourseId {
    let course = CourseDraft::new(1, "School")
        .validate(CourseId::new(0), fixed_now())
        .unwrap();
    let course_id = repo
        .insert_course(NewCourseRecord::from_course(&course), &teacher())
        .await
        .unwrap();
    for (order, title) in (0u32..).zip(lessons) {
        repo.add_lesson(NewLessonRecord {
            course_id,
            order,
            title: (*title).to_owned(),
            audio: String::new(),
            content: None,
            updated_at: fixed_now(),
        })
        .await
        .unwrap();
    }
    course_id
}

fn card(course_id: CourseId, lesson_order: u32, order: u32, text: &str) -> NewCardRecord {
    NewCardRecord {
        course_id,
        lesson_order,
        order,
        text: text.to_owned(),
        audio_uri: None,
        words: Vec::new(),
    }
}

#[tokio::test]
async fn deck_rows_reduce_into_course_tree() {
    let repo = connect("memdb_deck_rows").await;
    let course_id = seed_course(&repo, &["Introduction", "Chapter 1"]).await;
    let big = repo
        .insert_word(WordDraft::new("big", "large in size"))
        .await
        .unwrap();
    let little = repo
        .insert_word(WordDraft::new("little", "small in size"))
        .await
        .unwrap();

    let mut first = card(course_id, 1, 0, "Is your school #big# or #little#?");
    first.words = vec![
        CardWordLink {
            word_id: big,
            order: 0,
            start_index: 15,
            end_index: 18,
        },
        CardWordLink {
            word_id: little,
            order: 1,
            start_index: 22,
            end_index: 28,
        },
    ];
    repo.add_card(first).await.unwrap();
    repo.add_card(card(course_id, 1, 1, "#New# or #old#?"))
        .await
        .unwrap();

    let rows = repo.deck_rows(course_id, &teacher()).await.unwrap();
    assert_eq!(rows.len(), 4);

    let tree = reduce_rows(&rows).unwrap();
    assert_eq!(tree.course_title, "School");
    assert_eq!(tree.lesson_orders(), vec![0, 1]);
    assert!(tree.lesson(0).unwrap().cards.is_empty());

    let chapter = tree.lesson(1).unwrap();
    assert_eq!(chapter.card_orders(), vec![0, 1]);
    let annotated = chapter.card(0).unwrap();
    let words: Vec<(&str, u32, u32)> = annotated
        .annotations
        .iter()
        .map(|a| (a.text.as_str(), a.start_index, a.end_index))
        .collect();
    assert_eq!(words, vec![("big", 15, 18), ("little", 22, 28)]);
    assert!(chapter.card(1).unwrap().annotations.is_empty());
}

#[tokio::test]
async fn deck_rows_hidden_from_other_teachers() {
    let repo = connect("memdb_deck_rows_owner").await;
    let course_id = seed_course(&repo, &["Introduction"]).await;

    let stranger = TeacherIdentity::new("teacher2").unwrap();
    assert!(repo.deck_rows(course_id, &stranger).await.unwrap().is_empty());
    assert!(repo
        .deck_rows(CourseId::new(999), &teacher())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn course_without_lessons_yields_single_row() {
    let repo = connect("memdb_course_only").await;
    let course_id = seed_course(&repo, &[]).await;

    let rows = repo.deck_rows(course_id, &teacher()).await.unwrap();
    assert_eq!(rows.len(), 1);
    let tree = reduce_rows(&rows).unwrap();
    assert!(tree.lessons.is_empty());
}

#[tokio::test]
async fn delete_card_repacks_later_cards() {
    let repo = connect("memdb_delete_card").await;
    let course_id = seed_course(&repo, &["Chapter 1"]).await;
    for (order, text) in (0u32..).zip(["zero", "one", "two", "three"]) {
        repo.add_card(card(course_id, 0, order, text)).await.unwrap();
    }

    repo.delete_card(course_id, 0, 1).await.unwrap();

    let cards = repo.list_cards(course_id, 0).await.unwrap();
    let shape: Vec<(u32, &str)> = cards.iter().map(|c| (c.order(), c.text())).collect();
    assert_eq!(shape, vec![(0, "zero"), (1, "two"), (2, "three")]);

    let err = repo.delete_card(course_id, 0, 7).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn delete_lesson_cascades_and_repacks() {
    let repo = connect("memdb_delete_lesson").await;
    let course_id = seed_course(&repo, &["A", "B", "C", "D"]).await;
    repo.add_card(card(course_id, 1, 0, "in B")).await.unwrap();
    repo.add_card(card(course_id, 2, 0, "in C")).await.unwrap();

    repo.delete_lesson(course_id, 1).await.unwrap();

    let lessons = repo.list_lessons(course_id).await.unwrap();
    let shape: Vec<(u32, &str)> = lessons.iter().map(|l| (l.order(), l.title())).collect();
    assert_eq!(shape, vec![(0, "A"), (1, "C"), (2, "D")]);

    let cards = repo.list_cards(course_id, 1).await.unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].text(), "in C");
}

#[tokio::test]
async fn duplicate_orders_are_conflicts() {
    let repo = connect("memdb_conflicts").await;
    let course_id = seed_course(&repo, &["A"]).await;

    let err = repo
        .add_lesson(NewLessonRecord {
            course_id,
            order: 0,
            title: "again".to_owned(),
            audio: String::new(),
            content: None,
            updated_at: fixed_now(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    repo.add_card(card(course_id, 0, 0, "first")).await.unwrap();
    let err = repo.add_card(card(course_id, 0, 0, "second")).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
}

#[tokio::test]
async fn rename_and_edit_update_in_place() {
    let repo = connect("memdb_rename_edit").await;
    let course_id = seed_course(&repo, &["Chapter 1"]).await;
    let old = repo.insert_word(WordDraft::new("old", "not new")).await.unwrap();
    repo.add_card(card(course_id, 0, 0, "New or old?")).await.unwrap();

    repo.rename_lesson(course_id, 0, "Chapter One", fixed_now())
        .await
        .unwrap();
    repo.update_card_text(
        course_id,
        0,
        0,
        "New or #old#?",
        &[CardWordLink {
            word_id: old,
            order: 0,
            start_index: 7,
            end_index: 10,
        }],
    )
    .await
    .unwrap();

    let tree = reduce_rows(&repo.deck_rows(course_id, &teacher()).await.unwrap()).unwrap();
    let lesson = tree.lesson(0).unwrap();
    assert_eq!(lesson.title, "Chapter One");
    let edited = lesson.card(0).unwrap();
    assert_eq!(edited.text, "New or #old#?");
    assert_eq!(edited.annotations.len(), 1);
    assert_eq!(edited.annotations[0].definition, "not new");

    let err = repo
        .rename_lesson(course_id, 5, "missing", fixed_now())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn courses_listed_per_teacher_with_status() {
    let repo = connect("memdb_courses").await;
    let course_id = seed_course(&repo, &[]).await;

    repo.set_course_status(course_id, CourseStatus::InReview, fixed_now())
        .await
        .unwrap();

    let courses = repo.list_courses(&teacher()).await.unwrap();
    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0].status(), CourseStatus::InReview);
    assert!(repo
        .list_courses(&TeacherIdentity::new("teacher2").unwrap())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn word_lookup_is_case_insensitive() {
    let repo = connect("memdb_words").await;
    let first = repo
        .insert_word(WordDraft::new("School", "a place to learn"))
        .await
        .unwrap();
    repo.insert_word(WordDraft::new("school", "a group of fish"))
        .await
        .unwrap();

    let found = repo.find_word("SCHOOL").await.unwrap().unwrap();
    assert_eq!(found.id(), first);
    assert!(repo.find_word("schools").await.unwrap().is_none());
    assert!(repo.get_word(first).await.unwrap().is_some());
}
