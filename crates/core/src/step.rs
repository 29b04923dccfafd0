// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step protocol
//!
//! A step receives a [`StepContext`] snapshot and answers with a
//! [`StepResult`] carrying one of five outcomes:
//!
//! - `Empty`: no progress, the same step runs again on the next advance
//! - `Error`: recoverable business failure, recorded in the audit trail
//! - `Next`: move to another step and keep going in the same advance
//! - `Fail` / `Complete`: terminal

use crate::options::{read_options, CompletionOptions, OptionsError, OptionsShape, StepOptions};
use crate::state::{State, StepTag, Workflow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Business error returned by a step.
///
/// Never fatal to the engine: it is persisted to the audit trail and handed
/// back to the caller, who may simply advance again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StepError {
    message: String,
}

impl StepError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for StepError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for StepError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<OptionsError> for StepError {
    fn from(err: OptionsError) -> Self {
        Self::new(err.to_string())
    }
}

/// What the engine should do after a step returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome<T> {
    Empty,
    Error(StepError),
    Next(T),
    Fail,
    Complete,
}

impl<T> StepOutcome<T> {
    pub fn name(&self) -> &'static str {
        match self {
            StepOutcome::Empty => "empty",
            StepOutcome::Error(_) => "error",
            StepOutcome::Next(_) => "next",
            StepOutcome::Fail => "fail",
            StepOutcome::Complete => "complete",
        }
    }

    /// Whether the advance loop stops after this outcome
    pub fn stops(&self) -> bool {
        !matches!(self, StepOutcome::Next(_))
    }
}

/// Result of one step invocation
pub struct StepResult<W: Workflow> {
    pub outcome: StepOutcome<W::Step>,
    /// Replacement Data, applied whatever the outcome
    pub data: Option<W::Data>,
    /// Replacement FailData
    pub fail_data: Option<W::FailData>,
}

impl<W: Workflow> StepResult<W> {
    fn with_outcome(outcome: StepOutcome<W::Step>) -> Self {
        Self {
            outcome,
            data: None,
            fail_data: None,
        }
    }

    /// Transition to `step` and keep executing
    pub fn next(step: W::Step) -> Self {
        Self::with_outcome(StepOutcome::Next(step))
    }

    /// No progress; this step runs again on the next advance
    pub fn empty() -> Self {
        Self::with_outcome(StepOutcome::Empty)
    }

    pub fn error(err: impl Into<StepError>) -> Self {
        Self::with_outcome(StepOutcome::Error(err.into()))
    }

    pub fn fail() -> Self {
        Self::with_outcome(StepOutcome::Fail)
    }

    pub fn complete() -> Self {
        Self::with_outcome(StepOutcome::Complete)
    }

    pub fn with_data(mut self, data: W::Data) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_fail_data(mut self, fail_data: W::FailData) -> Self {
        self.fail_data = Some(fail_data);
        self
    }
}

impl<W: Workflow> std::fmt::Debug for StepResult<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepResult")
            .field("outcome", &self.outcome)
            .field("data", &self.data)
            .field("fail_data", &self.fail_data)
            .finish()
    }
}

/// Input handed to a step
pub struct StepContext<W: Workflow> {
    pub state: State<W>,
    shape: Option<OptionsShape>,
    options: Option<CompletionOptions>,
    cancel: CancellationToken,
}

impl<W: Workflow> StepContext<W> {
    pub fn new(
        state: State<W>,
        shape: Option<OptionsShape>,
        options: Option<CompletionOptions>,
    ) -> Self {
        Self {
            state,
            shape,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Share the caller's cancellation token with the step
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn data(&self) -> &W::Data {
        &self.state.data
    }

    /// Read the completion options supplied to this advance.
    ///
    /// See [`read_options`] for the validation table.
    pub fn options<T: StepOptions>(&self) -> Result<Option<T>, OptionsError> {
        read_options(self.shape.as_ref(), self.options.as_ref())
    }

    pub fn has_options(&self) -> bool {
        self.options.is_some()
    }

    /// Completes once the advance driving this step is cancelled
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Executable logic of one step
#[async_trait]
pub trait StepHandler<W: Workflow>: Send + Sync {
    async fn run(&self, ctx: StepContext<W>) -> StepResult<W>;
}

struct SyncFn<F>(F);

#[async_trait]
impl<W, F> StepHandler<W> for SyncFn<F>
where
    W: Workflow,
    F: Fn(&StepContext<W>) -> StepResult<W> + Send + Sync,
{
    async fn run(&self, ctx: StepContext<W>) -> StepResult<W> {
        (self.0)(&ctx)
    }
}

struct AsyncFn<F>(F);

#[async_trait]
impl<W, F, Fut> StepHandler<W> for AsyncFn<F>
where
    W: Workflow,
    F: Fn(StepContext<W>) -> Fut + Send + Sync,
    Fut: Future<Output = StepResult<W>> + Send + 'static,
{
    async fn run(&self, ctx: StepContext<W>) -> StepResult<W> {
        (self.0)(ctx).await
    }
}

/// A step handler plus the options shape it accepts
pub struct StepDefinition<W: Workflow> {
    handler: Arc<dyn StepHandler<W>>,
    options: Option<OptionsShape>,
}

impl<W: Workflow> Clone for StepDefinition<W> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            options: self.options,
        }
    }
}

impl<W: Workflow> StepDefinition<W> {
    pub fn new(handler: impl StepHandler<W> + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
            options: None,
        }
    }

    /// Step backed by a synchronous closure
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&StepContext<W>) -> StepResult<W> + Send + Sync + 'static,
    {
        Self::new(SyncFn(f))
    }

    /// Step backed by a closure returning a future
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(StepContext<W>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult<W>> + Send + 'static,
    {
        Self::new(AsyncFn(f))
    }

    /// Declare the completion options type this step accepts
    pub fn accepts<T: StepOptions>(mut self) -> Self {
        self.options = Some(OptionsShape::of::<T>());
        self
    }

    pub fn options(&self) -> Option<&OptionsShape> {
        self.options.as_ref()
    }

    pub fn handler(&self) -> &dyn StepHandler<W> {
        self.handler.as_ref()
    }
}

/// Parameters passed to a runner when it declares its steps
#[derive(Debug, Clone, Default)]
pub struct StepRegistrationParams {}

/// Tag-keyed table of step definitions, built once per advance
pub struct StepRegistry<W: Workflow> {
    steps: HashMap<W::Step, StepDefinition<W>>,
    duplicates: Vec<String>,
}

impl<W: Workflow> StepRegistry<W> {
    pub fn new() -> Self {
        Self {
            steps: HashMap::new(),
            duplicates: Vec::new(),
        }
    }

    /// Register a step. A repeated tag keeps the first definition and is
    /// reported by [`StepRegistry::duplicates`].
    pub fn step(mut self, tag: W::Step, definition: StepDefinition<W>) -> Self {
        if self.steps.contains_key(&tag) {
            self.duplicates.push(tag.as_str().to_string());
        } else {
            self.steps.insert(tag, definition);
        }
        self
    }

    pub fn get(&self, tag: &W::Step) -> Option<&StepDefinition<W>> {
        self.steps.get(tag)
    }

    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl<W: Workflow> Default for StepRegistry<W> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
