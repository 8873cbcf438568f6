// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake engine for scheduler and runner tests
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::livelog::LineSink;
use crate::runtime::{DestroyError, Engine, EngineError, StepResult};
use crate::spec::{Spec, Step};
use async_trait::async_trait;
use gantry_orchestrator::OrchestratorError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Recorded engine interaction, in order of occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Setup,
    Destroy,
    Started { step: String },
    Finished { step: String },
}

/// Scripted outcome for one step.
#[derive(Debug, Clone)]
pub enum StepScript {
    /// Terminate with the given exit code.
    Exit(i32),
    /// Terminate as OOM-killed.
    OomKilled,
    /// Fail with an engine-side error.
    Error,
    /// Emit these lines, then exit 0.
    Lines(Vec<String>),
    /// Park until the stage is cancelled.
    Hang,
}

#[derive(Default)]
struct FakeEngineState {
    calls: Vec<EngineCall>,
    scripts: HashMap<String, StepScript>,
    fail_setup: bool,
    delay: Option<Duration>,
}

/// Fake engine. Steps complete according to scripted outcomes and
/// every lifecycle call is recorded.
#[derive(Clone, Default)]
pub struct FakeEngine {
    inner: Arc<Mutex<FakeEngineState>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeEngineState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Script the outcome of a named step.
    pub fn script(&self, step: &str, script: StepScript) {
        self.lock().scripts.insert(step.to_string(), script);
    }

    /// Make `setup` fail.
    pub fn fail_setup(&self) {
        self.lock().fail_setup = true;
    }

    /// Delay each step by the given duration before finishing.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    /// Index of a call within the recorded sequence.
    pub fn call_index(&self, call: &EngineCall) -> Option<usize> {
        self.lock().calls.iter().position(|c| c == call)
    }
}

#[async_trait]
impl Engine for FakeEngine {
    async fn setup(&self, _spec: &Spec) -> Result<(), EngineError> {
        let fail = {
            let mut state = self.lock();
            state.calls.push(EngineCall::Setup);
            state.fail_setup
        };
        if fail {
            return Err(EngineError::Orchestrator(OrchestratorError::Api {
                status: 403,
                message: "forbidden".to_string(),
            }));
        }
        Ok(())
    }

    async fn destroy(&self, _spec: &Spec) -> Result<(), DestroyError> {
        self.lock().calls.push(EngineCall::Destroy);
        Ok(())
    }

    async fn run(
        &self,
        _spec: &Spec,
        step: &Step,
        output: Arc<dyn LineSink>,
        cancel: &CancellationToken,
    ) -> Result<StepResult, EngineError> {
        let (script, delay) = {
            let mut state = self.lock();
            state.calls.push(EngineCall::Started {
                step: step.name.clone(),
            });
            (
                state
                    .scripts
                    .get(&step.name)
                    .cloned()
                    .unwrap_or(StepScript::Exit(0)),
                state.delay,
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = match script {
            StepScript::Exit(code) => Ok(StepResult {
                exited: true,
                exit_code: code,
                oom_killed: false,
            }),
            StepScript::OomKilled => Ok(StepResult {
                exited: true,
                exit_code: 137,
                oom_killed: true,
            }),
            StepScript::Error => Err(EngineError::ContainerMissing(step.id.clone())),
            StepScript::Lines(lines) => {
                for line in &lines {
                    output.write_line(line).await;
                }
                Ok(StepResult {
                    exited: true,
                    exit_code: 0,
                    oom_killed: false,
                })
            }
            StepScript::Hang => {
                cancel.cancelled().await;
                Err(EngineError::Cancelled)
            }
        };

        self.lock().calls.push(EngineCall::Finished {
            step: step.name.clone(),
        });
        result
    }
}
