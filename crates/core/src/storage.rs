// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage contract
//!
//! The engine persists through [`Storage`]. Writes are expressed as a
//! [`Transaction`], an ordered batch of [`Operation`]s that a backend applies
//! all-or-nothing. A caller that is already assembling a transaction folds an
//! inner batch into it with [`Transaction::extend`] instead of opening a
//! second scope.

use crate::id::StateId;
use crate::record::{StateRecord, StateUpdate, StepExecution};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not found: {kind}/{id}")]
    NotFound { kind: &'static str, id: String },
    #[error("already exists: {kind}/{id}")]
    AlreadyExists { kind: &'static str, id: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt log entry at byte {offset} of {len}; repair required")]
    Corrupt { offset: u64, len: u64 },
}

impl StorageError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StorageError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn already_exists(kind: &'static str, id: impl Into<String>) -> Self {
        StorageError::AlreadyExists {
            kind,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StorageError::AlreadyExists { .. })
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, StorageError::Corrupt { .. })
    }
}

/// A single write inside a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Insert; collides on ID or idempotency key
    CreateState(StateRecord),
    /// Append an audit row; the state must exist
    SaveStepExecution(StepExecution),
    /// Overwrite mutable columns; the state must exist
    UpdateState { id: StateId, update: StateUpdate },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateState(_) => "create_state",
            Operation::SaveStepExecution(_) => "save_step_execution",
            Operation::UpdateState { .. } => "update_state",
        }
    }

    /// ID of the instance this operation touches
    pub fn state_id(&self) -> &StateId {
        match self {
            Operation::CreateState(record) => &record.id,
            Operation::SaveStepExecution(exec) => &exec.state_id,
            Operation::UpdateState { id, .. } => id,
        }
    }
}

/// Ordered batch of operations committed together
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    ops: Vec<Operation>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, op: Operation) -> Self {
        self.ops.push(op);
        self
    }

    pub fn push(&mut self, op: Operation) {
        self.ops.push(op);
    }

    /// Fold a nested transaction into this one; it commits with the outer batch
    pub fn extend(&mut self, inner: Transaction) {
        self.ops.extend(inner.ops);
    }

    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<Operation> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl From<Operation> for Transaction {
    fn from(op: Operation) -> Self {
        Transaction::new().with(op)
    }
}

/// Transactional persistence for workflow instances
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Apply every operation or none of them
    async fn run_transaction(&self, tx: Transaction) -> Result<(), StorageError>;

    async fn get_state_by_id(&self, id: &StateId) -> Result<StateRecord, StorageError>;

    async fn get_state_by_idempotency_key(&self, key: &str) -> Result<StateRecord, StorageError>;

    /// Audit rows for one instance, ordered by start time
    async fn step_executions(&self, id: &StateId) -> Result<Vec<StepExecution>, StorageError>;

    async fn create_state(&self, record: StateRecord) -> Result<(), StorageError> {
        self.run_transaction(Operation::CreateState(record).into())
            .await
    }

    async fn save_step_execution(&self, exec: StepExecution) -> Result<(), StorageError> {
        self.run_transaction(Operation::SaveStepExecution(exec).into())
            .await
    }

    async fn update_state(&self, id: &StateId, update: StateUpdate) -> Result<(), StorageError> {
        self.run_transaction(
            Operation::UpdateState {
                id: id.clone(),
                update,
            }
            .into(),
        )
        .await
    }
}

#[async_trait]
impl<T: Storage + ?Sized> Storage for Arc<T> {
    async fn run_transaction(&self, tx: Transaction) -> Result<(), StorageError> {
        (**self).run_transaction(tx).await
    }

    async fn get_state_by_id(&self, id: &StateId) -> Result<StateRecord, StorageError> {
        (**self).get_state_by_id(id).await
    }

    async fn get_state_by_idempotency_key(&self, key: &str) -> Result<StateRecord, StorageError> {
        (**self).get_state_by_idempotency_key(key).await
    }

    async fn step_executions(&self, id: &StateId) -> Result<Vec<StepExecution>, StorageError> {
        (**self).step_executions(id).await
    }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
