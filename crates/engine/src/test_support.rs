// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Counter workflow used across the engine tests
//!
//! `first` bumps the counter and moves to `test_error`, which returns a
//! business error while the counter is at most 2, pauses empty at 3 and
//! moves on at 4. `no_save_change` edits the title without returning data
//! and `waiting_input` parks until completion options arrive.

use crate::StateMachine;
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stepwise_core::{
    BoxError, CreateOptions, EngineConfig, FakeClock, Initial, Runner, SequentialIdGen,
    StepDefinition, StepOptions, StepRegistrationParams, StepRegistry, StepResult, StepTag,
    Workflow,
};
use stepwise_storage::MemoryStorage;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    pub counter: i64,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterStep {
    First,
    TestError,
    NoSaveChange,
    WaitingInput,
}

impl StepTag for CounterStep {
    fn as_str(&self) -> &str {
        match self {
            CounterStep::First => "first",
            CounterStep::TestError => "test_error",
            CounterStep::NoSaveChange => "no_save_change",
            CounterStep::WaitingInput => "waiting_input",
        }
    }

    fn parse(tag: &str) -> Option<Self> {
        match tag {
            "first" => Some(CounterStep::First),
            "test_error" => Some(CounterStep::TestError),
            "no_save_change" => Some(CounterStep::NoSaveChange),
            "waiting_input" => Some(CounterStep::WaitingInput),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    pub source: String,
}

pub struct CounterFlow;

impl Workflow for CounterFlow {
    type Data = Counter;
    type FailData = Option<String>;
    type MetaData = Origin;
    type Step = CounterStep;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitingInputOptions {
    pub is_complete: bool,
    pub new_amount: i64,
}

impl StepOptions for WaitingInputOptions {
    const KIND: &'static str = "waiting_input";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnrelatedOptions {
    pub note: String,
}

impl StepOptions for UnrelatedOptions {
    const KIND: &'static str = "unrelated";
}

pub struct CounterCreate {
    pub key: String,
}

impl CreateOptions for CounterCreate {
    fn idempotency_key(&self) -> &str {
        &self.key
    }
}

pub fn create(key: &str) -> CounterCreate {
    CounterCreate {
        key: key.to_string(),
    }
}

#[derive(Default)]
pub struct CounterRunner;

#[async_trait]
impl Runner for CounterRunner {
    type Workflow = CounterFlow;
    type CreateOptions = CounterCreate;

    fn workflow_type(&self) -> &str {
        "counter"
    }

    async fn create(&self, options: &CounterCreate) -> Result<Initial<CounterFlow>, BoxError> {
        if options.key.starts_with("reject") {
            return Err("create rejected".into());
        }
        Ok(Initial::new(CounterStep::First, Counter::default()).with_meta_data(Origin {
            source: "tests".to_string(),
        }))
    }

    fn steps(&self, _params: &StepRegistrationParams) -> StepRegistry<CounterFlow> {
        counter_steps()
    }
}

type Def = StepDefinition<CounterFlow>;

pub fn counter_steps() -> StepRegistry<CounterFlow> {
    StepRegistry::<CounterFlow>::new()
        .step(
            CounterStep::First,
            Def::from_fn(|ctx| {
                let mut data = ctx.data().clone();
                data.counter += 1;
                data.title = "start title".to_string();
                StepResult::next(CounterStep::TestError).with_data(data)
            }),
        )
        .step(
            CounterStep::TestError,
            Def::from_fn(|ctx| {
                let mut data = ctx.data().clone();
                data.counter += 1;
                if data.counter <= 2 {
                    StepResult::error("counter eq 2").with_data(data)
                } else if data.counter <= 3 {
                    StepResult::empty().with_data(data)
                } else {
                    StepResult::next(CounterStep::NoSaveChange).with_data(data)
                }
            }),
        )
        .step(
            CounterStep::NoSaveChange,
            Def::from_async(|ctx| async move {
                // Edits to a copy of the data are dropped unless returned
                let mut edited = ctx.data().clone();
                edited.title = "changed title".to_string();
                tracing::debug!(title = %edited.title, "discarding edited title");
                StepResult::next(CounterStep::WaitingInput)
            }),
        )
        .step(
            CounterStep::WaitingInput,
            Def::from_fn(|ctx| match ctx.options::<WaitingInputOptions>() {
                Ok(None) => StepResult::empty(),
                Ok(Some(opts)) if opts.is_complete => {
                    let mut data = ctx.data().clone();
                    data.counter = opts.new_amount;
                    StepResult::complete().with_data(data)
                }
                Ok(Some(_)) => StepResult::fail().with_fail_data(Some("declined".to_string())),
                Err(e) => StepResult::error(e),
            })
            .accepts::<WaitingInputOptions>(),
        )
}

pub fn clock() -> FakeClock {
    let start = Utc
        .with_ymd_and_hms(2024, 6, 1, 9, 0, 0)
        .single()
        .unwrap_or_default();
    FakeClock::at(start).with_tick(Duration::milliseconds(10))
}

pub type TestMachine = StateMachine<Arc<MemoryStorage>, CounterRunner, FakeClock, SequentialIdGen>;

pub fn machine() -> (TestMachine, Arc<MemoryStorage>) {
    machine_with(EngineConfig::default())
}

pub fn machine_with(config: EngineConfig) -> (TestMachine, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let machine = StateMachine::new(config, Arc::clone(&storage), CounterRunner)
        .with_clock(clock())
        .with_id_gen(SequentialIdGen::new("counter"));
    (machine, storage)
}
