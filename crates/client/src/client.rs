// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-plane client trait definitions.

use async_trait::async_trait;
use gantry_core::{Build, Netrc, Repo, Secret, Stage, StepRecord, System};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from control-plane operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Another runner accepted the stage first.
    #[error("optimistic lock error")]
    OptimisticLock,
    #[error("stage not found")]
    NotFound,
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Everything the runner needs to execute a stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageContext {
    pub stage: Stage,
    pub build: Build,
    pub repo: Repo,
    pub system: System,
    /// Raw configuration file text, pre-substitution.
    pub config: String,
    #[serde(default)]
    pub secrets: Vec<Secret>,
    #[serde(default)]
    pub netrc: Option<Netrc>,
}

/// One line of step output as uploaded to the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub number: i64,
    pub message: String,
    /// Seconds since the step started.
    pub timestamp: i64,
}

/// The remote control plane. Implementations must be cheap to clone.
#[async_trait]
pub trait Client: Clone + Send + Sync + 'static {
    /// Request a pending stage matching the runner's platform. Returns
    /// None when the queue is empty.
    async fn request(&self, os: &str, arch: &str) -> Result<Option<Stage>, ClientError>;

    /// Confirm receipt of a stage. Delivery is not exclusive; the
    /// first runner to accept takes ownership, later calls fail with
    /// [`ClientError::OptimisticLock`].
    async fn accept(&self, stage: &Stage) -> Result<Stage, ClientError>;

    /// Fetch the full execution context for an accepted stage.
    async fn detail(&self, stage_id: i64) -> Result<StageContext, ClientError>;

    /// Persist stage changes; returns the server copy with a bumped
    /// version.
    async fn update_stage(&self, stage: &Stage) -> Result<Stage, ClientError>;

    /// Persist step changes.
    async fn update_step(&self, step: &StepRecord) -> Result<StepRecord, ClientError>;

    /// Long-poll for build cancellation. Resolves true when the build
    /// was cancelled, false when the poll times out and should be
    /// re-issued.
    async fn watch(&self, build_id: i64) -> Result<bool, ClientError>;

    /// Upload a batch of live log lines for a step.
    async fn batch(&self, step_id: i64, lines: &[Line]) -> Result<(), ClientError>;

    /// Upload the full log file for a completed step.
    async fn upload(&self, step_id: i64, lines: &[Line]) -> Result<(), ClientError>;
}
