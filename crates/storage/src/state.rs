// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized tables shared by the storage backends
//!
//! Every applied operation yields an [`Undo`] so a batch that fails midway
//! can be reverted, leaving the tables exactly as they were.

use stepwise_core::{
    Operation, StateId, StateRecord, StateUpdate, StepExecution, StorageError, Transaction,
};
use std::collections::HashMap;

/// Inverse of one applied operation
#[derive(Debug)]
pub enum Undo {
    RemoveState { id: StateId, idempotency_key: String },
    PopExecution { state_id: StateId },
    RestoreState { id: StateId, previous: StateUpdate },
}

/// Undo records for a batch, newest last
#[derive(Debug, Default)]
pub struct UndoLog {
    entries: Vec<Undo>,
}

impl UndoLog {
    pub fn record(&mut self, undo: Undo) {
        self.entries.push(undo);
    }

    /// Revert every recorded operation, newest first
    pub fn rollback(self, state: &mut MaterializedState) {
        for undo in self.entries.into_iter().rev() {
            state.undo(undo);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Materialized state built from committed transactions
#[derive(Debug, Default)]
pub struct MaterializedState {
    states: HashMap<StateId, StateRecord>,
    idempotency: HashMap<String, StateId>,
    executions: HashMap<StateId, Vec<StepExecution>>,
}

impl MaterializedState {
    pub fn get(&self, id: &StateId) -> Option<&StateRecord> {
        self.states.get(id)
    }

    pub fn get_by_idempotency_key(&self, key: &str) -> Option<&StateRecord> {
        self.idempotency.get(key).and_then(|id| self.states.get(id))
    }

    /// Audit rows for `id`, ordered by start time
    pub fn executions(&self, id: &StateId) -> Vec<StepExecution> {
        let mut rows = self.executions.get(id).cloned().unwrap_or_default();
        rows.sort_by_key(|row| row.started_at);
        rows
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn execution_count(&self) -> usize {
        self.executions.values().map(Vec::len).sum()
    }

    /// Apply an operation to update the tables
    pub fn apply(&mut self, op: &Operation) -> Result<Undo, StorageError> {
        match op {
            Operation::CreateState(record) => {
                if self.states.contains_key(&record.id) {
                    return Err(StorageError::already_exists("state", record.id.as_str()));
                }
                if self.idempotency.contains_key(&record.idempotency_key) {
                    return Err(StorageError::already_exists(
                        "idempotency_key",
                        record.idempotency_key.clone(),
                    ));
                }
                self.idempotency
                    .insert(record.idempotency_key.clone(), record.id.clone());
                self.states.insert(record.id.clone(), record.clone());
                Ok(Undo::RemoveState {
                    id: record.id.clone(),
                    idempotency_key: record.idempotency_key.clone(),
                })
            }

            Operation::SaveStepExecution(exec) => {
                if !self.states.contains_key(&exec.state_id) {
                    return Err(StorageError::not_found("state", exec.state_id.as_str()));
                }
                self.executions
                    .entry(exec.state_id.clone())
                    .or_default()
                    .push(exec.clone());
                Ok(Undo::PopExecution {
                    state_id: exec.state_id.clone(),
                })
            }

            Operation::UpdateState { id, update } => {
                let record = self
                    .states
                    .get_mut(id)
                    .ok_or_else(|| StorageError::not_found("state", id.as_str()))?;
                let previous = record.apply(update.clone());
                Ok(Undo::RestoreState {
                    id: id.clone(),
                    previous,
                })
            }
        }
    }

    /// Apply a whole batch, reverting the applied prefix if any operation fails
    pub fn apply_transaction(&mut self, tx: &Transaction) -> Result<UndoLog, StorageError> {
        let mut log = UndoLog::default();
        for op in tx.ops() {
            match self.apply(op) {
                Ok(undo) => log.record(undo),
                Err(e) => {
                    log.rollback(self);
                    return Err(e);
                }
            }
        }
        Ok(log)
    }

    fn undo(&mut self, undo: Undo) {
        match undo {
            Undo::RemoveState {
                id,
                idempotency_key,
            } => {
                self.states.remove(&id);
                self.idempotency.remove(&idempotency_key);
                self.executions.remove(&id);
            }
            Undo::PopExecution { state_id } => {
                if let Some(rows) = self.executions.get_mut(&state_id) {
                    rows.pop();
                    if rows.is_empty() {
                        self.executions.remove(&state_id);
                    }
                }
            }
            Undo::RestoreState { id, previous } => {
                if let Some(record) = self.states.get_mut(&id) {
                    record.apply(previous);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
