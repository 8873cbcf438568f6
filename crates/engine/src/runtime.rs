// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The engine contract the scheduler is written against.

use crate::livelog::LineSink;
use crate::spec::{Spec, Step};
use async_trait::async_trait;
use gantry_orchestrator::OrchestratorError;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Terminal observation of one step container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepResult {
    pub exited: bool,
    pub exit_code: i32,
    pub oom_killed: bool,
}

/// Errors while driving a single step or the stage environment.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    /// The pod disappeared before the container terminated.
    #[error("container missing: {0}")]
    ContainerMissing(String),
    /// The container never left the placeholder within the budget.
    #[error("container {0} was not ready in time")]
    ReadyTimeout(String),
    /// The stage context was cancelled mid-operation.
    #[error("cancelled")]
    Cancelled,
}

/// Accumulated teardown failures. Destroy attempts every deletion and
/// reports everything that went wrong.
#[derive(Debug, Default, Error)]
#[error("destroy: {} resource deletions failed", .errors.len())]
pub struct DestroyError {
    pub errors: Vec<OrchestratorError>,
}

impl DestroyError {
    pub fn push(&mut self, error: OrchestratorError) {
        self.errors.push(error);
    }

    pub fn into_result(self) -> Result<(), DestroyError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Drives step containers through their lifecycle on the orchestrator.
#[async_trait]
pub trait Engine: Send + Sync + 'static {
    /// Create the stage environment: namespace (when owned), secrets
    /// and the pod with every container slot parked on the
    /// placeholder. Idempotent-adjacent: any partial failure returns
    /// the first error and the caller must still call `destroy`.
    async fn setup(&self, spec: &Spec) -> Result<(), EngineError>;

    /// Best-effort teardown of everything `setup` created. Always
    /// attempts every deletion, even after earlier failures.
    async fn destroy(&self, spec: &Spec) -> Result<(), DestroyError>;

    /// Run one step to completion: swap the container image, wait for
    /// the container to come up, stream its logs into `output`, then
    /// wait for termination and report the exit status.
    async fn run(
        &self,
        spec: &Spec,
        step: &Step,
        output: Arc<dyn LineSink>,
        cancel: &CancellationToken,
    ) -> Result<StepResult, EngineError>;
}
