//! Pausing specs
//!
//! An advance stops early when the caller cancels or the chain bound is
//! reached; either way the committed progress is kept.

use crate::prelude::*;
use similar_asserts::assert_eq;
use stepwise_core::EngineConfig;

#[tokio::test]
async fn cancelled_advance_returns_the_stored_state() {
    let machine = review_machine(MemoryStorage::new());
    let created = machine
        .create(&submit("doc-1", "Draft"))
        .await
        .unwrap()
        .into_state();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let advanced = machine
        .advance_with_cancel(&created.id, None, &cancel)
        .await
        .unwrap();

    assert_eq!(advanced.state, created);
    assert!(machine.step_executions(&created.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn chain_bound_pauses_between_steps() {
    let config = EngineConfig::default().with_max_chained_steps(1);
    let machine = review_machine_with(MemoryStorage::new(), config);
    let id = machine
        .create(&submit("doc-1", "Draft"))
        .await
        .unwrap()
        .into_state()
        .id;

    let written = machine.advance(&id, None).await.unwrap();
    assert_eq!(written.state.step, Some(Stage::Review));
    assert_eq!(written.state.data.revisions, 1);

    let approved = machine
        .advance(&id, verdict(true, "ana", ""))
        .await
        .unwrap();
    assert_eq!(approved.state.step, Some(Stage::Publish));
    assert_eq!(approved.state.status, Status::InProgress);
    assert!(!approved.state.data.published);

    let published = machine.advance(&id, None).await.unwrap();
    assert_eq!(published.state.status, Status::Completed);
    assert!(published.state.data.published);
}

#[tokio::test]
async fn chain_bound_comes_from_toml() {
    let config = EngineConfig::from_toml_str("max_chained_steps = 1\n").unwrap();
    let machine = review_machine_with(MemoryStorage::new(), config);
    let id = machine
        .create(&submit("doc-1", "Draft"))
        .await
        .unwrap()
        .into_state()
        .id;

    machine.advance(&id, None).await.unwrap();

    assert_eq!(machine.step_executions(&id).await.unwrap().len(), 1);
}
