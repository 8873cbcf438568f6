// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared mutable stage record.
//!
//! One lock guards the whole record. Holders read or write status and
//! release immediately; the lock is never held across I/O. Status
//! transitions are monotonic: once a step or the stage reaches a
//! terminal status, later writes are ignored.

use gantry_core::{Stage, Status, StepRecord};
use gantry_engine::spec::{ErrPolicy, RunPolicy, Spec};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// The per-stage record visible to the scheduler and the reporter.
pub struct State {
    inner: Mutex<Stage>,
}

impl State {
    pub fn new(stage: Stage) -> Self {
        Self {
            inner: Mutex::new(stage),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Stage> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Populate the step records from the compiled spec. Steps that
    /// can never run are not recorded and never reported.
    pub fn prepare(&self, spec: &Spec) {
        let mut stage = self.lock();
        for step in &spec.steps {
            if step.run_policy == RunPolicy::Never {
                continue;
            }
            let number = stage.steps.len() as i64 + 1;
            let stage_id = stage.id;
            stage.steps.push(StepRecord {
                stage_id,
                number,
                name: step.name.clone(),
                status: Status::Pending,
                errignore: step.err_policy == ErrPolicy::Ignore,
                ..Default::default()
            });
        }
    }

    /// A full snapshot for reporting.
    pub fn snapshot(&self) -> Stage {
        self.lock().clone()
    }

    /// Snapshot of one step record.
    pub fn step(&self, name: &str) -> Option<StepRecord> {
        self.lock().step(name).cloned()
    }

    /// Write back the server copy of a step record (ids, versions).
    pub fn absorb_step(&self, record: &StepRecord) {
        let mut stage = self.lock();
        if let Some(step) = stage.step_mut(&record.name) {
            step.id = record.id;
            step.version = record.version;
        }
    }

    /// Write back the server copy of the stage (ids, versions).
    pub fn absorb_stage(&self, record: &Stage) {
        let mut stage = self.lock();
        stage.version = record.version;
        for server_step in &record.steps {
            if let Some(step) = stage.step_mut(&server_step.name) {
                step.id = server_step.id;
                step.version = server_step.version;
            }
        }
    }

    /// Current status of a named step. Steps without a record (those
    /// compiled to run-never) read as skipped.
    pub fn status_of(&self, name: &str) -> Status {
        self.lock()
            .step(name)
            .map(|s| s.status)
            .unwrap_or(Status::Skipped)
    }

    /// Move the stage to running.
    pub fn start_stage(&self, unix_now: i64) {
        let mut stage = self.lock();
        if stage.status.is_done() {
            return;
        }
        stage.status = Status::Running;
        stage.started = unix_now;
    }

    /// Move a step to running.
    pub fn start_step(&self, name: &str, unix_now: i64) {
        let mut stage = self.lock();
        if let Some(step) = stage.step_mut(name) {
            if step.status.is_done() {
                return;
            }
            step.status = Status::Running;
            step.started = unix_now;
        }
    }

    /// Finish a step. Writes against a terminal status are ignored.
    pub fn finish_step(
        &self,
        name: &str,
        status: Status,
        exit_code: i32,
        error: Option<&str>,
        unix_now: i64,
    ) {
        let mut stage = self.lock();
        if let Some(step) = stage.step_mut(name) {
            if step.status.is_done() {
                return;
            }
            step.status = status;
            step.exit_code = exit_code;
            step.stopped = unix_now;
            if let Some(error) = error {
                step.error = error.to_string();
            }
        }
    }

    /// Skip a step that has not started.
    pub fn skip_step(&self, name: &str, unix_now: i64) {
        self.finish_step(name, Status::Skipped, 0, None, unix_now);
    }

    /// Fail every step and the stage with the same error. Used for
    /// configuration and setup failures that are reported once.
    pub fn fail_all(&self, error: &str, unix_now: i64) {
        let mut stage = self.lock();
        if !stage.status.is_done() {
            stage.status = Status::Error;
            stage.error = error.to_string();
            stage.stopped = unix_now;
        }
        for step in &mut stage.steps {
            if step.status.is_done() {
                continue;
            }
            step.status = Status::Error;
            step.error = error.to_string();
            step.stopped = unix_now;
        }
    }

    /// True when every recorded step is terminal.
    pub fn all_done(&self) -> bool {
        self.lock().steps.iter().all(|s| s.status.is_done())
    }

    /// Finish the stage with the worst outcome over non-ignored
    /// steps. Skipped counts as success.
    pub fn finish_stage(&self, unix_now: i64) -> Status {
        let mut stage = self.lock();
        if stage.status.is_done() {
            return stage.status;
        }
        let mut worst = Status::Success;
        for step in &stage.steps {
            if step.errignore {
                continue;
            }
            if severity(step.status) > severity(worst) {
                worst = step.status;
            }
        }
        stage.status = worst;
        stage.stopped = unix_now;
        worst
    }

    /// Status environment conveyed to steps as they start.
    pub fn status_envs(&self) -> BTreeMap<String, String> {
        let stage = self.lock();
        let failed: Vec<&str> = stage
            .steps
            .iter()
            .filter(|s| s.status.is_failing() && !s.errignore)
            .map(|s| s.name.as_str())
            .collect();
        let status = if failed.is_empty() { "success" } else { "failure" };
        let mut envs = BTreeMap::new();
        envs.insert("DRONE_BUILD_STATUS".to_string(), status.to_string());
        envs.insert("DRONE_STAGE_STATUS".to_string(), status.to_string());
        envs.insert("DRONE_FAILED_STEPS".to_string(), failed.join(","));
        envs
    }
}

fn severity(status: Status) -> u8 {
    match status {
        Status::Pending | Status::Running => 0,
        Status::Success | Status::Skipped => 0,
        Status::Failure => 1,
        Status::Error => 2,
        Status::Killed => 3,
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
