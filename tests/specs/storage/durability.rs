//! Durability specs
//!
//! A workflow backed by the write-ahead log resumes after the process
//! restarts, including after a crash that tore the last log line.

use crate::prelude::*;
use similar_asserts::assert_eq;
use std::io::Write as _;
use std::path::Path;

fn open(dir: &Path) -> ReviewMachine<WalStorage> {
    let config = WalStorageConfig {
        dir: dir.to_path_buf(),
        machine_id: "host-a".to_string(),
        sync_writes: true,
    };
    review_machine(WalStorage::open(&config).unwrap())
}

#[tokio::test]
async fn parked_workflow_resumes_after_restart() {
    let dir = tempfile::tempdir().unwrap();

    let (id, parked) = {
        let machine = open(dir.path());
        let id = machine
            .create(&submit("doc-1", "Release notes"))
            .await
            .unwrap()
            .into_state()
            .id;
        let parked = machine.advance(&id, None).await.unwrap().state;
        (id, parked)
    };

    let machine = open(dir.path());
    let restored = machine.get_state(&id).await.unwrap();
    assert_eq!(restored, Some(parked));

    let done = machine
        .advance(&id, verdict(true, "ana", ""))
        .await
        .unwrap();
    assert_eq!(done.state.status, Status::Completed);
    assert!(done.state.data.published);
    assert_eq!(machine.step_executions(&id).await.unwrap().len(), 4);

    // Idempotency survives the restart too
    let again = machine
        .create(&submit("doc-1", "Release notes"))
        .await
        .unwrap();
    assert!(again.already_existed());
    assert_eq!(again.state().status, Status::Completed);
}

#[tokio::test]
async fn finished_workflow_stays_finished_after_restart() {
    let dir = tempfile::tempdir().unwrap();

    let id = {
        let machine = open(dir.path());
        let id = machine
            .create(&submit("doc-1", "Draft"))
            .await
            .unwrap()
            .into_state()
            .id;
        machine.advance(&id, None).await.unwrap();
        machine
            .advance(&id, verdict(false, "bo", "off topic"))
            .await
            .unwrap();
        id
    };

    let machine = open(dir.path());
    let err = machine.advance(&id, None).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::InTerminalStatus {
            status: Status::Failed,
            ..
        }
    ));
    let state = machine.get_state(&id).await.unwrap().unwrap();
    assert_eq!(state.fail_data.reason.as_str(), "off topic");
}

#[tokio::test]
async fn torn_log_tail_is_discarded_on_restart() {
    let dir = tempfile::tempdir().unwrap();

    let (id, parked) = {
        let machine = open(dir.path());
        let id = machine
            .create(&submit("doc-1", "Draft"))
            .await
            .unwrap()
            .into_state()
            .id;
        let parked = machine.advance(&id, None).await.unwrap().state;
        (id, parked)
    };

    // A crash in the middle of appending the next transaction
    let wal_path = dir.path().join("wal.jsonl");
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(&wal_path)
        .unwrap();
    file.write_all(br#"{"sequence":99,"transaction":{"ops":[{"type":"#)
        .unwrap();
    drop(file);

    let machine = open(dir.path());
    assert_eq!(machine.get_state(&id).await.unwrap(), Some(parked));

    let done = machine
        .advance(&id, verdict(true, "ana", ""))
        .await
        .unwrap();
    assert_eq!(done.state.status, Status::Completed);

    let replay = WalStorage::replay(&wal_path).unwrap();
    assert!(!replay.is_corrupt());
}
