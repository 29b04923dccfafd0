// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State machine: the public surface of the engine
//!
//! Wraps a [`Runner`] and a [`Storage`] with idempotent creation and
//! terminal-status guards, and drives the stepper for each advance.

use crate::error::EngineError;
use crate::stepper::{Advanced, Stepper};
use stepwise_core::codec;
use stepwise_core::{
    Clock, CompletionOptions, CreateOptions, EngineConfig, IdGen, Runner, State, StateId, Status,
    StepExecution, StepRegistrationParams, Storage, SystemClock, UuidIdGen, Workflow,
};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Result of [`StateMachine::create`]
pub enum Created<W: Workflow> {
    /// A new instance was inserted
    New(State<W>),
    /// An instance with the same idempotency key already existed
    Existing(State<W>),
}

impl<W: Workflow> Created<W> {
    pub fn state(&self) -> &State<W> {
        match self {
            Created::New(state) | Created::Existing(state) => state,
        }
    }

    pub fn into_state(self) -> State<W> {
        match self {
            Created::New(state) | Created::Existing(state) => state,
        }
    }

    /// Whether the idempotency key matched a prior instance
    pub fn already_existed(&self) -> bool {
        matches!(self, Created::Existing(_))
    }
}

impl<W: Workflow> std::fmt::Debug for Created<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Created::New(state) => f.debug_tuple("New").field(state).finish(),
            Created::Existing(state) => f.debug_tuple("Existing").field(state).finish(),
        }
    }
}

type WorkflowOf<R> = <R as Runner>::Workflow;

pub struct StateMachine<S, R, C = SystemClock, I = UuidIdGen> {
    config: EngineConfig,
    storage: S,
    runner: R,
    clock: C,
    id_gen: I,
}

impl<S: Storage, R: Runner> StateMachine<S, R> {
    pub fn new(config: EngineConfig, storage: S, runner: R) -> Self {
        Self {
            config,
            storage,
            runner,
            clock: SystemClock,
            id_gen: UuidIdGen,
        }
    }
}

impl<S, R, C, I> StateMachine<S, R, C, I>
where
    S: Storage,
    R: Runner,
    C: Clock,
    I: IdGen,
{
    /// Substitute the clock
    pub fn with_clock<C2: Clock>(self, clock: C2) -> StateMachine<S, R, C2, I> {
        StateMachine {
            config: self.config,
            storage: self.storage,
            runner: self.runner,
            clock,
            id_gen: self.id_gen,
        }
    }

    /// Substitute the ID generator
    pub fn with_id_gen<I2: IdGen>(self, id_gen: I2) -> StateMachine<S, R, C, I2> {
        StateMachine {
            config: self.config,
            storage: self.storage,
            runner: self.runner,
            clock: self.clock,
            id_gen,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create an instance, or return the one already holding the idempotency key.
    ///
    /// A concurrent insert that wins the race after the lookup surfaces as
    /// [`EngineError::AlreadyExists`].
    pub async fn create(
        &self,
        options: &R::CreateOptions,
    ) -> Result<Created<WorkflowOf<R>>, EngineError> {
        let span = tracing::info_span!(
            "create",
            workflow_type = self.runner.workflow_type(),
            idempotency_key = options.idempotency_key()
        );
        self.create_instance(options).instrument(span).await
    }

    async fn create_instance(
        &self,
        options: &R::CreateOptions,
    ) -> Result<Created<WorkflowOf<R>>, EngineError> {
        let key = options.idempotency_key();
        match self.storage.get_state_by_idempotency_key(key).await {
            Ok(record) => {
                let state = codec::decode_state(record)?;
                tracing::info!(state_id = %state.id, "idempotency key already used");
                return Ok(Created::Existing(state));
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(EngineError::storage("get state by idempotency key")(e)),
        }

        let initial = self.runner.create(options).await.map_err(|e| {
            tracing::warn!(error = %e, "runner rejected create");
            EngineError::Create(e)
        })?;

        let now = self.clock.now();
        let state = State {
            id: self.id_gen.next(),
            idempotency_key: key.to_string(),
            created_at: now,
            updated_at: now,
            status: Status::New,
            step: Some(initial.first_step),
            workflow_type: self.runner.workflow_type().to_string(),
            data: initial.data,
            fail_data: Default::default(),
            meta_data: initial.meta_data,
            error: None,
        };

        let record = codec::encode_state(&state)?;
        self.storage.create_state(record).await.map_err(|e| {
            if e.is_already_exists() {
                EngineError::AlreadyExists(key.to_string())
            } else {
                EngineError::storage("create state")(e)
            }
        })?;

        tracing::info!(state_id = %state.id, step = state.step_tag(), "workflow created");
        Ok(Created::New(state))
    }

    /// Run the instance until it pauses
    pub async fn advance(
        &self,
        id: &StateId,
        options: Option<CompletionOptions>,
    ) -> Result<Advanced<WorkflowOf<R>>, EngineError> {
        self.advance_with_cancel(id, options, &CancellationToken::new())
            .await
    }

    /// Run the instance until it pauses or `cancel` fires.
    ///
    /// Cancellation is observed between steps; everything committed before
    /// it is kept and the last committed state is returned without error.
    pub async fn advance_with_cancel(
        &self,
        id: &StateId,
        options: Option<CompletionOptions>,
        cancel: &CancellationToken,
    ) -> Result<Advanced<WorkflowOf<R>>, EngineError> {
        let span = tracing::info_span!(
            "advance",
            state_id = %id,
            workflow_type = self.runner.workflow_type()
        );

        self.run_stepper(id, options, cancel).instrument(span).await
    }

    async fn run_stepper(
        &self,
        id: &StateId,
        options: Option<CompletionOptions>,
        cancel: &CancellationToken,
    ) -> Result<Advanced<WorkflowOf<R>>, EngineError> {
        let state = self.load(id).await?;
        if state.is_terminal() {
            tracing::warn!(status = %state.status, "advance on finished workflow");
            return Err(EngineError::InTerminalStatus {
                id: id.clone(),
                status: state.status,
            });
        }

        let registry = self.runner.steps(&StepRegistrationParams::default());
        let stepper = Stepper::new(&self.storage, &self.clock, registry, &self.config)?;

        let result = stepper.run(state, options, cancel).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "advance aborted");
        }
        result
    }

    /// Current state, or `None` when no instance has this ID
    pub async fn get_state(
        &self,
        id: &StateId,
    ) -> Result<Option<State<WorkflowOf<R>>>, EngineError> {
        match self.storage.get_state_by_id(id).await {
            Ok(record) => Ok(Some(codec::decode_state(record)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(EngineError::storage("get state")(e)),
        }
    }

    /// Audit trail of the instance, ordered by start time
    pub async fn step_executions(&self, id: &StateId) -> Result<Vec<StepExecution>, EngineError> {
        self.storage
            .step_executions(id)
            .await
            .map_err(EngineError::storage("get step executions"))
    }

    async fn load(&self, id: &StateId) -> Result<State<WorkflowOf<R>>, EngineError> {
        self.get_state(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(id.clone()))
    }
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
