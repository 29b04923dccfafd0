//! Workflow lifecycle specs
//!
//! Create, advance through every stage, and finish in each terminal status.

use crate::prelude::*;
use similar_asserts::assert_eq;
use stepwise_core::Storage;

async fn approve_flow<S: Storage>(machine: &ReviewMachine<S>) {
    let created = machine.create(&submit("doc-1", "Quarterly report")).await.unwrap();
    assert!(!created.already_existed());
    let id = created.state().id.clone();

    let parked = machine.advance(&id, None).await.unwrap();
    assert_eq!(parked.state.status, Status::InProgress);
    assert_eq!(parked.state.step_tag(), "review");
    assert_eq!(parked.state.data.revisions, 1);

    let done = machine
        .advance(&id, verdict(true, "ana", ""))
        .await
        .unwrap();
    assert_eq!(done.state.status, Status::Completed);
    assert_eq!(done.state.step, None);
    assert!(done.state.data.published);
    assert_eq!(done.state.data.reviewer.as_deref(), Some("ana"));

    let audit = machine.step_executions(&id).await.unwrap();
    assert_eq!(
        trail(&audit),
        vec![
            row("write", Some("review"), None),
            row("review", None, None),
            row("review", Some("publish"), None),
            row("publish", None, None),
        ]
    );
}

#[tokio::test]
async fn approved_document_is_published_in_memory() {
    approve_flow(&review_machine(MemoryStorage::new())).await;
}

#[tokio::test]
async fn approved_document_is_published_through_traced_storage() {
    init_tracing();
    approve_flow(&review_machine(TracedStorage::new(MemoryStorage::new()))).await;
}

#[tokio::test]
async fn rejected_document_fails_with_reason() {
    let machine = review_machine(MemoryStorage::new());
    let id = machine
        .create(&submit("doc-1", "Draft"))
        .await
        .unwrap()
        .into_state()
        .id;
    machine.advance(&id, None).await.unwrap();

    let failed = machine
        .advance(&id, verdict(false, "bo", "off topic"))
        .await
        .unwrap();

    assert_eq!(failed.state.status, Status::Failed);
    assert_eq!(failed.state.step, None);
    assert_eq!(failed.state.fail_data.reason.as_str(), "off topic");
    assert!(failed.step_error.is_none());

    let err = machine.advance(&id, None).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::InTerminalStatus {
            status: Status::Failed,
            ..
        }
    ));
}

#[tokio::test]
async fn revision_request_loops_back_and_parks_again() {
    let machine = review_machine(MemoryStorage::new());
    let id = machine
        .create(&submit("doc-1", "Draft"))
        .await
        .unwrap()
        .into_state()
        .id;
    machine.advance(&id, None).await.unwrap();

    let revised = machine
        .advance(&id, verdict(false, "bo", "revise"))
        .await
        .unwrap();

    // Options are consumed by the first review, the second one parks
    assert_eq!(revised.state.status, Status::InProgress);
    assert_eq!(revised.state.step, Some(Stage::Review));
    assert_eq!(revised.state.data.revisions, 2);
    assert_eq!(revised.state.data.reviewer, None);
}

#[tokio::test]
async fn resubmitting_a_key_returns_the_first_instance() {
    let machine = review_machine(MemoryStorage::new());
    let first = machine
        .create(&submit("doc-1", "Original title"))
        .await
        .unwrap();
    machine.advance(&first.state().id, None).await.unwrap();

    let again = machine
        .create(&submit("doc-1", "Different title"))
        .await
        .unwrap();

    assert!(again.already_existed());
    let state = again.into_state();
    assert_eq!(state.id, first.state().id);
    assert_eq!(state.data.title.as_str(), "Original title");
    assert_eq!(state.step, Some(Stage::Review));
}

#[tokio::test]
async fn invalid_submission_is_refused_by_the_runner() {
    let storage = Arc::new(MemoryStorage::new());
    let machine = review_machine(Arc::clone(&storage));

    let err = machine.create(&submit("doc-1", "  ")).await.unwrap_err();

    assert!(matches!(err, EngineError::Create(_)));
    assert_eq!(
        err.to_string().as_str(),
        "runner create failed: title is required"
    );
    assert_eq!(storage.state_count(), 0);
}

#[tokio::test]
async fn unknown_instance_is_not_found() {
    let machine = review_machine(MemoryStorage::new());
    let id = StateId::from("nope");

    assert!(machine.get_state(&id).await.unwrap().is_none());
    assert!(machine.advance(&id, None).await.unwrap_err().is_not_found());
    assert!(machine.step_executions(&id).await.unwrap().is_empty());
}
