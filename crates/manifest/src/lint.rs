// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Semantic checks applied before compilation.
//!
//! The linter rejects pipelines that are structurally invalid and, for
//! untrusted repositories, pipelines that request host-level access.

use crate::types::Pipeline;
use std::collections::HashSet;
use thiserror::Error;

/// A pipeline rejected by the linter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LintError {
    #[error("linter: the pipeline defines no steps")]
    NoSteps,
    #[error("linter: step is missing a name")]
    MissingName,
    #[error("linter: step {0} is missing an image")]
    MissingImage(String),
    #[error("linter: duplicate step name {0}")]
    DuplicateName(String),
    #[error("linter: untrusted repositories cannot run privileged steps")]
    Privileged,
    #[error("linter: untrusted repositories cannot mount host path volumes")]
    HostPath,
    #[error("linter: untrusted repositories cannot use host networking")]
    HostNetwork,
}

/// Lint the pipeline. `trusted` reflects the repository trust flag.
pub fn lint(pipeline: &Pipeline, trusted: bool) -> Result<(), LintError> {
    if pipeline.steps.is_empty() {
        return Err(LintError::NoSteps);
    }

    let mut names: HashSet<&str> = HashSet::new();
    names.insert("clone");

    for step in &pipeline.steps {
        if step.name.is_empty() {
            return Err(LintError::MissingName);
        }
        if step.image.is_empty() {
            return Err(LintError::MissingImage(step.name.clone()));
        }
        if !names.insert(step.name.as_str()) {
            return Err(LintError::DuplicateName(step.name.clone()));
        }
        if step.privileged && !trusted {
            return Err(LintError::Privileged);
        }
    }

    if !trusted {
        if pipeline.host_network {
            return Err(LintError::HostNetwork);
        }
        for volume in &pipeline.volumes {
            if volume.host.is_some() {
                return Err(LintError::HostPath);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "lint_tests.rs"]
mod tests;
