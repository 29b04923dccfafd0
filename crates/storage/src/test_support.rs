// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Record builders for backend tests

use chrono::{DateTime, Duration, TimeZone, Utc};
use stepwise_core::{StateId, StateRecord, StateUpdate, Status, StepExecution};

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

pub fn record(id: &str, key: &str) -> StateRecord {
    StateRecord {
        id: StateId::from(id),
        idempotency_key: key.to_string(),
        created_at: epoch(),
        updated_at: epoch(),
        status: Status::New,
        step: "first".to_string(),
        workflow_type: "test".to_string(),
        data: br#"{"count":0}"#.to_vec(),
        fail_data: Vec::new(),
        meta_data: Vec::new(),
        error: None,
    }
}

/// Audit row that started `secs` seconds after the epoch
pub fn execution(id: &str, secs: i64, next: Option<&str>) -> StepExecution {
    StepExecution {
        state_id: StateId::from(id),
        started_at: epoch() + Duration::seconds(secs),
        completed_at: epoch() + Duration::seconds(secs + 1),
        error: None,
        preview_step: "first".to_string(),
        next_step: next.map(str::to_string),
    }
}

pub fn progressed(record: &StateRecord, step: &str) -> StateUpdate {
    let mut update = record.to_update();
    update.status = Status::InProgress;
    update.step = step.to_string();
    update.updated_at = epoch() + Duration::seconds(10);
    update.data = br#"{"count":1}"#.to_vec();
    update
}
