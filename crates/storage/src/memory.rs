// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process storage backend
//!
//! Keeps the tables behind a mutex. A one-shot [`FailPoint`] can be armed to
//! make the next transaction fail at a chosen operation, which is how the
//! engine's all-or-nothing persistence is exercised in tests.

use crate::state::{MaterializedState, UndoLog};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use stepwise_core::{
    Operation, StateId, StateRecord, StepExecution, Storage, StorageError, Transaction,
};

/// Operation kind at which an injected failure fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    CreateState,
    SaveStepExecution,
    UpdateState,
    /// Fail before any operation is applied
    Begin,
}

impl FailPoint {
    fn matches(self, op: &Operation) -> bool {
        matches!(
            (self, op),
            (FailPoint::CreateState, Operation::CreateState(_))
                | (FailPoint::SaveStepExecution, Operation::SaveStepExecution(_))
                | (FailPoint::UpdateState, Operation::UpdateState { .. })
        )
    }
}

#[derive(Default)]
struct Inner {
    state: MaterializedState,
    fail_next: Option<FailPoint>,
    committed: u64,
}

#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StorageError> {
        self.inner
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage lock poisoned".to_string()))
    }

    /// Arm a failure for the next transaction that reaches `point`
    pub fn fail_next(&self, point: FailPoint) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_next = Some(point);
        }
    }

    /// Number of transactions committed so far
    pub fn committed(&self) -> u64 {
        self.inner.lock().map(|inner| inner.committed).unwrap_or(0)
    }

    pub fn state_count(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.state.state_count())
            .unwrap_or(0)
    }
}

fn injected(point: FailPoint) -> StorageError {
    StorageError::Unavailable(format!("injected failure at {:?}", point))
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn run_transaction(&self, tx: Transaction) -> Result<(), StorageError> {
        let mut inner = self.lock()?;
        let Inner {
            state, fail_next, ..
        } = &mut *inner;

        if *fail_next == Some(FailPoint::Begin) {
            *fail_next = None;
            return Err(injected(FailPoint::Begin));
        }

        let mut log = UndoLog::default();
        for op in tx.ops() {
            if let Some(point) = fail_next.filter(|point| point.matches(op)) {
                *fail_next = None;
                log.rollback(state);
                tracing::debug!(op = op.name(), "injected storage failure");
                return Err(injected(point));
            }
            match state.apply(op) {
                Ok(undo) => log.record(undo),
                Err(e) => {
                    log.rollback(state);
                    return Err(e);
                }
            }
        }

        inner.committed += 1;
        Ok(())
    }

    async fn get_state_by_id(&self, id: &StateId) -> Result<StateRecord, StorageError> {
        self.lock()?
            .state
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("state", id.as_str()))
    }

    async fn get_state_by_idempotency_key(&self, key: &str) -> Result<StateRecord, StorageError> {
        self.lock()?
            .state
            .get_by_idempotency_key(key)
            .cloned()
            .ok_or_else(|| StorageError::not_found("idempotency_key", key))
    }

    async fn step_executions(&self, id: &StateId) -> Result<Vec<StepExecution>, StorageError> {
        Ok(self.lock()?.state.executions(id))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
