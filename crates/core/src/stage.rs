// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage and step records as exchanged with the control plane.

use serde::{Deserialize, Serialize};

/// Execution status of a stage or step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Pending,
    Running,
    Success,
    Failure,
    Killed,
    Error,
    Skipped,
}

impl Status {
    /// Returns true once the status can no longer change.
    pub fn is_done(self) -> bool {
        matches!(
            self,
            Status::Success | Status::Failure | Status::Killed | Status::Error | Status::Skipped
        )
    }

    /// Returns true for statuses that count against the build.
    pub fn is_failing(self) -> bool {
        matches!(self, Status::Failure | Status::Killed | Status::Error)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Pending => "pending",
            Status::Running => "running",
            Status::Success => "success",
            Status::Failure => "failure",
            Status::Killed => "killed",
            Status::Error => "error",
            Status::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// A unit of work claimed by exactly one runner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stage {
    pub id: i64,
    pub build_id: i64,
    pub number: i64,
    pub name: String,
    #[serde(default)]
    pub machine: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub arch: String,
    pub status: Status,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub errignore: bool,
    #[serde(default)]
    pub exit_code: i32,
    #[serde(default)]
    pub started: i64,
    #[serde(default)]
    pub stopped: i64,
    /// Optimistic-lock version; bumped by the server on every update.
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
}

/// One step of a stage as reported to the control plane.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: i64,
    pub stage_id: i64,
    /// 1-based position within the stage.
    pub number: i64,
    pub name: String,
    pub status: Status,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub errignore: bool,
    #[serde(default)]
    pub exit_code: i32,
    #[serde(default)]
    pub started: i64,
    #[serde(default)]
    pub stopped: i64,
    #[serde(default)]
    pub version: i64,
}

impl Stage {
    /// Find a step record by name.
    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Find a step record by name, mutably.
    pub fn step_mut(&mut self, name: &str) -> Option<&mut StepRecord> {
        self.steps.iter_mut().find(|s| s.name == name)
    }
}

#[cfg(test)]
#[path = "stage_tests.rs"]
mod tests;
