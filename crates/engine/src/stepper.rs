// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step execution loop
//!
//! The stepper runs one instance forward until a step asks it to stop, the
//! caller cancels, or the chain bound is reached. Each iteration commits the
//! audit row and the state update as one transaction, so a pause at any
//! point leaves every completed step durable.

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use std::time::Instant;
use stepwise_core::codec;
use stepwise_core::{
    Clock, CompletionOptions, EngineConfig, Operation, State, Status, StepContext, StepError,
    StepExecution, StepOutcome, StepRegistry, StepTag, Storage, Transaction, Workflow,
};
use tokio_util::sync::CancellationToken;

/// Where an advance paused
pub struct Advanced<W: Workflow> {
    /// State after the last committed iteration
    pub state: State<W>,
    /// Business error returned by the step that stopped the loop
    pub step_error: Option<StepError>,
}

impl<W: Workflow> std::fmt::Debug for Advanced<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Advanced")
            .field("state", &self.state)
            .field("step_error", &self.step_error)
            .finish()
    }
}

pub(crate) struct Stepper<'a, W: Workflow, S, C> {
    storage: &'a S,
    clock: &'a C,
    registry: StepRegistry<W>,
    max_chained_steps: Option<u32>,
}

impl<'a, W, S, C> Stepper<'a, W, S, C>
where
    W: Workflow,
    S: Storage,
    C: Clock,
{
    pub(crate) fn new(
        storage: &'a S,
        clock: &'a C,
        registry: StepRegistry<W>,
        config: &EngineConfig,
    ) -> Result<Self, EngineError> {
        if let Some(tag) = registry.duplicates().first() {
            return Err(EngineError::DuplicateStep(tag.clone()));
        }
        Ok(Self {
            storage,
            clock,
            registry,
            max_chained_steps: config.max_chained_steps,
        })
    }

    pub(crate) async fn run(
        &self,
        mut state: State<W>,
        mut options: Option<CompletionOptions>,
        cancel: &CancellationToken,
    ) -> Result<Advanced<W>, EngineError> {
        let mut invoked = 0u32;

        loop {
            if cancel.is_cancelled() {
                tracing::debug!(invoked, "advance cancelled");
                return Ok(paused(state));
            }
            if self.max_chained_steps.is_some_and(|max| invoked >= max) {
                tracing::info!(invoked, "chain bound reached, pausing");
                return Ok(paused(state));
            }

            let tag = state
                .step
                .clone()
                .ok_or_else(|| EngineError::UnknownStep(String::new()))?;
            let definition = self
                .registry
                .get(&tag)
                .ok_or_else(|| EngineError::UnknownStep(tag.as_str().to_string()))?;

            if options.is_some() && definition.options().is_none() {
                return Err(EngineError::OptionsIsUndefined {
                    step: tag.as_str().to_string(),
                });
            }

            let ctx = StepContext::new(state.clone(), definition.options().copied(), options.take())
                .with_cancel(cancel.clone());
            let timer = Instant::now();
            let started_at = self.clock.now();
            let result = definition.handler().run(ctx).await;
            let completed_at = self.clock.now();
            let stops = result.outcome.stops();
            invoked += 1;

            tracing::debug!(
                step = tag.as_str(),
                outcome = result.outcome.name(),
                elapsed_ms = timer.elapsed().as_millis() as u64,
                "step returned"
            );

            let mut next = state.clone();
            if let Some(data) = result.data {
                next.data = data;
            }
            if let Some(fail_data) = result.fail_data {
                next.fail_data = fail_data;
            }

            let mut exec = StepExecution {
                state_id: state.id.clone(),
                started_at,
                completed_at,
                error: None,
                preview_step: tag.as_str().to_string(),
                next_step: None,
            };
            let mut step_error = None;

            match result.outcome {
                StepOutcome::Empty => {
                    next.error = None;
                }
                StepOutcome::Error(err) => {
                    tracing::warn!(step = tag.as_str(), error = %err, "step returned business error");
                    exec.error = Some(err.message().to_string());
                    next.error = Some(err.message().to_string());
                    step_error = Some(err);
                }
                StepOutcome::Next(target) => {
                    if target == tag {
                        tracing::error!(step = tag.as_str(), "step transitioned to itself");
                        return Err(EngineError::NoOpTransition(tag.as_str().to_string()));
                    }
                    if next.status == Status::New {
                        next.status = Status::InProgress;
                    }
                    next.updated_at = completed_at;
                    next.error = None;
                    exec.next_step = Some(target.as_str().to_string());
                    next.step = Some(target);
                }
                StepOutcome::Fail => finish(&mut next, Status::Failed, completed_at),
                StepOutcome::Complete => finish(&mut next, Status::Completed, completed_at),
            }

            if !state.status.can_transition_to(next.status) {
                tracing::error!(from = %state.status, to = %next.status, "invalid status transition");
                return Err(EngineError::InvalidTransition {
                    from: state.status,
                    to: next.status,
                });
            }
            self.persist(&next, exec).await?;
            state = next;

            if state.is_terminal() {
                tracing::info!(status = %state.status, "workflow finished");
            }
            if stops {
                return Ok(Advanced { state, step_error });
            }
        }
    }

    async fn persist(&self, state: &State<W>, exec: StepExecution) -> Result<(), EngineError> {
        let update = codec::state_update(state)?;
        let tx = Transaction::new()
            .with(Operation::SaveStepExecution(exec))
            .with(Operation::UpdateState {
                id: state.id.clone(),
                update,
            });

        self.storage.run_transaction(tx).await.map_err(|e| {
            tracing::error!(error = %e, "failed to persist step");
            EngineError::storage("persist step")(e)
        })
    }
}

fn paused<W: Workflow>(state: State<W>) -> Advanced<W> {
    Advanced {
        state,
        step_error: None,
    }
}

fn finish<W: Workflow>(state: &mut State<W>, status: Status, at: DateTime<Utc>) {
    state.status = status;
    state.updated_at = at;
    state.step = None;
    state.error = None;
}

#[cfg(test)]
#[path = "stepper_tests.rs"]
mod tests;
