use course_core::model::{CourseDraft, TeacherIdentity, WordDraft};
use course_core::time::fixed_now;
use course_core::{Reconciliation, SelectionState};
use services::mutation::wait_for;
use services::{AppServices, BrowserSession, Clock, DispatchEvent, Mutation};

fn teacher() -> TeacherIdentity {
    TeacherIdentity::new("teacher1").unwrap()
}

#[tokio::test]
async fn deleting_selected_card_falls_back_after_reindex() {
    let services = AppServices::new_sqlite(
        "sqlite:file:memdb_browser_flow?mode=memory&cache=shared",
        Clock::fixed(fixed_now()),
        teacher(),
    )
    .await
    .expect("connect sqlite");
    let deck = services.deck_service();
    let course_id = deck
        .create_course(CourseDraft::new(1, "School"), &teacher())
        .await
        .expect("create course");
    services
        .card_service()
        .add_word(WordDraft::new("big", "large in size"))
        .await
        .expect("add word");

    let dispatcher = services.dispatcher();
    let mut events = dispatcher.subscribe();
    let mut snapshots = dispatcher.snapshots();

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
    dispatcher.dispatch(Mutation::AddCard {
        course_id,
        lesson_order: 1,
        order: 0,
        text: "Is your school #big# or #little#?".to_owned(),
    });
    let last = dispatcher.dispatch(Mutation::AddCard {
        course_id,
        lesson_order: 1,
        order: 1,
        text: "#New# or #old#?".to_owned(),
    });
    assert!(matches!(
        wait_for(&mut events, last).await,
        Some(DispatchEvent::Applied { .. })
    ));

    let mut session = BrowserSession::open(&deck, course_id, &teacher())
        .await
        .expect("open browser");
    assert_eq!(
        session.state(),
        SelectionState {
            lesson: Some(0),
            card: None
        }
    );

    session.select_lesson(1).unwrap();
    session.select_card(1).unwrap();
    let annotated = &session.selected_lesson().unwrap().cards[0];
    assert_eq!(annotated.annotations.len(), 1);
    assert_eq!(annotated.annotations[0].text, "big");

    // Mark the current snapshot as seen so `follow` waits for the delete.
    snapshots.borrow_and_update();
    let ticket = dispatcher.dispatch(Mutation::DeleteCard {
        course_id,
        lesson_order: 1,
        order: 0,
    });
    assert_eq!(
        session.follow(&mut snapshots).await,
        Some(Reconciliation::CardFallback)
    );
    assert!(matches!(
        wait_for(&mut events, ticket).await,
        Some(DispatchEvent::Applied { .. })
    ));

    assert_eq!(
        session.state(),
        SelectionState {
            lesson: Some(1),
            card: Some(0)
        }
    );
    assert_eq!(session.selected_card().unwrap().text, "#New# or #old#?");

    dispatcher.shutdown().await;
}

#[tokio::test]
async fn failed_mutation_keeps_browser_state() {
    let services = AppServices::new_sqlite(
        "sqlite:file:memdb_browser_failure?mode=memory&cache=shared",
        Clock::fixed(fixed_now()),
        teacher(),
    )
    .await
    .expect("connect sqlite");
    let deck = services.deck_service();
    let course_id = deck
        .create_course(CourseDraft::new(1, "School"), &teacher())
        .await
        .expect("create course");
    services
        .lesson_service()
        .add_lesson(course_id, 0, "Introduction")
        .await
        .expect("add lesson");

    let mut session = BrowserSession::open(&deck, course_id, &teacher())
        .await
        .expect("open browser");
    let before = session.state();

    let dispatcher = services.dispatcher();
    let mut events = dispatcher.subscribe();
    let ticket = dispatcher.dispatch(Mutation::AddCard {
        course_id,
        lesson_order: 0,
        order: session.selected_lesson().unwrap().next_card_order(),
        text: "broken #markup".to_owned(),
    });
    let event = wait_for(&mut events, ticket).await.expect("event");
    assert!(matches!(event, DispatchEvent::Failed { .. }));
    assert_eq!(session.apply_event(&event), None);
    assert_eq!(session.state(), before);

    assert_eq!(
        session.reload(&deck, &teacher()).await.unwrap(),
        Reconciliation::Unchanged
    );
    dispatcher.shutdown().await;
}
