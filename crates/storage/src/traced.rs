// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced storage wrapper for consistent observability

use async_trait::async_trait;
use stepwise_core::{StateId, StateRecord, StepExecution, Storage, StorageError, Transaction};
use tracing::Instrument;

/// Wrapper that adds tracing to any Storage
#[derive(Clone)]
pub struct TracedStorage<S> {
    inner: S,
}

impl<S> TracedStorage<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: Storage> Storage for TracedStorage<S> {
    async fn run_transaction(&self, tx: Transaction) -> Result<(), StorageError> {
        let ops: Vec<&'static str> = tx.ops().iter().map(|op| op.name()).collect();
        let span = tracing::info_span!("storage.transaction", ops = ?ops);

        async {
            let start = std::time::Instant::now();
            let result = self.inner.run_transaction(tx).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(()) => tracing::debug!(elapsed_ms, "committed"),
                Err(e) if e.is_already_exists() || e.is_not_found() => {
                    tracing::warn!(elapsed_ms, error = %e, "rejected")
                }
                Err(e) => tracing::error!(elapsed_ms, error = %e, "transaction failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn get_state_by_id(&self, id: &StateId) -> Result<StateRecord, StorageError> {
        let result = self.inner.get_state_by_id(id).await;
        tracing::trace!(%id, found = result.is_ok(), "get_state_by_id");
        result
    }

    async fn get_state_by_idempotency_key(&self, key: &str) -> Result<StateRecord, StorageError> {
        let result = self.inner.get_state_by_idempotency_key(key).await;
        tracing::trace!(key, found = result.is_ok(), "get_state_by_idempotency_key");
        result
    }

    async fn step_executions(&self, id: &StateId) -> Result<Vec<StepExecution>, StorageError> {
        let result = self.inner.step_executions(id).await;
        tracing::trace!(
            %id,
            rows = result.as_ref().map(|rows| rows.len()).ok(),
            "step_executions"
        );
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
