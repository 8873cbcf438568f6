// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake control-plane client for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::client::{Client, ClientError, Line, StageContext};
use async_trait::async_trait;
use gantry_core::{Stage, Status, StepRecord};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Recorded client call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCall {
    Request,
    Accept { stage_id: i64 },
    Detail { stage_id: i64 },
    UpdateStage { status: Status },
    UpdateStep { name: String, status: Status },
    Watch { build_id: i64 },
    Batch { step_id: i64 },
    Upload { step_id: i64 },
}

#[derive(Default)]
struct FakeClientState {
    context: StageContext,
    queue: Vec<Stage>,
    accept_conflict: bool,
    calls: Vec<ClientCall>,
    stage_updates: Vec<Stage>,
    step_updates: Vec<StepRecord>,
    batches: HashMap<i64, Vec<Line>>,
    uploads: HashMap<i64, Vec<Line>>,
    cancelled: bool,
    version: i64,
    next_step_id: i64,
}

/// Fake control-plane client. Records every interaction and lets
/// tests script the stage context and cancellation.
#[derive(Clone, Default)]
pub struct FakeClient {
    inner: Arc<Mutex<FakeClientState>>,
    cancel: Arc<Notify>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeClientState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Script the context returned by `detail`.
    pub fn set_context(&self, context: StageContext) {
        self.lock().context = context;
    }

    /// Queue a stage for `request` to hand out.
    pub fn enqueue(&self, stage: Stage) {
        self.lock().queue.push(stage);
    }

    /// Make the next `accept` fail with an optimistic-lock error.
    pub fn set_accept_conflict(&self) {
        self.lock().accept_conflict = true;
    }

    /// Signal build cancellation to any pending `watch`.
    pub fn cancel_build(&self) {
        self.lock().cancelled = true;
        self.cancel.notify_waiters();
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<ClientCall> {
        self.lock().calls.clone()
    }

    /// Stage snapshots passed to `update_stage`, in order.
    pub fn stage_updates(&self) -> Vec<Stage> {
        self.lock().stage_updates.clone()
    }

    /// Step snapshots passed to `update_step`, in order.
    pub fn step_updates(&self) -> Vec<StepRecord> {
        self.lock().step_updates.clone()
    }

    /// Lines received for a step across batch uploads.
    pub fn batched(&self, step_id: i64) -> Vec<Line> {
        self.lock().batches.get(&step_id).cloned().unwrap_or_default()
    }

    /// Lines received in the final upload for a step.
    pub fn uploaded(&self, step_id: i64) -> Vec<Line> {
        self.lock().uploads.get(&step_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Client for FakeClient {
    async fn request(&self, _os: &str, _arch: &str) -> Result<Option<Stage>, ClientError> {
        let mut state = self.lock();
        state.calls.push(ClientCall::Request);
        if state.queue.is_empty() {
            Ok(None)
        } else {
            Ok(Some(state.queue.remove(0)))
        }
    }

    async fn accept(&self, stage: &Stage) -> Result<Stage, ClientError> {
        let mut state = self.lock();
        state.calls.push(ClientCall::Accept { stage_id: stage.id });
        if state.accept_conflict {
            return Err(ClientError::OptimisticLock);
        }
        let mut accepted = stage.clone();
        state.version += 1;
        accepted.version = state.version;
        Ok(accepted)
    }

    async fn detail(&self, stage_id: i64) -> Result<StageContext, ClientError> {
        let mut state = self.lock();
        state.calls.push(ClientCall::Detail { stage_id });
        Ok(state.context.clone())
    }

    async fn update_stage(&self, stage: &Stage) -> Result<Stage, ClientError> {
        let mut state = self.lock();
        state.calls.push(ClientCall::UpdateStage {
            status: stage.status,
        });
        state.stage_updates.push(stage.clone());
        let mut updated = stage.clone();
        state.version += 1;
        updated.version = state.version;
        // The server assigns identifiers to new step records.
        for step in &mut updated.steps {
            if step.id == 0 {
                state.next_step_id += 1;
                step.id = state.next_step_id;
            }
        }
        Ok(updated)
    }

    async fn update_step(&self, step: &StepRecord) -> Result<StepRecord, ClientError> {
        let mut state = self.lock();
        state.calls.push(ClientCall::UpdateStep {
            name: step.name.clone(),
            status: step.status,
        });
        state.step_updates.push(step.clone());
        let mut updated = step.clone();
        if updated.id == 0 {
            state.next_step_id += 1;
            updated.id = state.next_step_id;
        }
        state.version += 1;
        updated.version = state.version;
        Ok(updated)
    }

    async fn watch(&self, build_id: i64) -> Result<bool, ClientError> {
        let notified = self.cancel.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        {
            let mut state = self.lock();
            state.calls.push(ClientCall::Watch { build_id });
            if state.cancelled {
                return Ok(true);
            }
        }
        notified.await;
        Ok(true)
    }

    async fn batch(&self, step_id: i64, lines: &[Line]) -> Result<(), ClientError> {
        let mut state = self.lock();
        state.calls.push(ClientCall::Batch { step_id });
        state
            .batches
            .entry(step_id)
            .or_default()
            .extend_from_slice(lines);
        Ok(())
    }

    async fn upload(&self, step_id: i64, lines: &[Line]) -> Result<(), ClientError> {
        let mut state = self.lock();
        state.calls.push(ClientCall::Upload { step_id });
        state.uploads.insert(step_id, lines.to_vec());
        Ok(())
    }
}
