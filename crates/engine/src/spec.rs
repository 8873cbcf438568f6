// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The compiled execution plan.
//!
//! A [`Spec`] is immutable once compiled: the pod topology is fixed at
//! setup and only container images change afterwards. Ownership is
//! shared between the engine and the scheduler through `Arc`.

use gantry_core::Secret;
use gantry_orchestrator::pod::{ResourceRequirements, Toleration, Volume, VolumeMount};
use std::collections::BTreeMap;

/// The no-op image every container slot is created with. A slot keeps
/// this image until its step starts.
pub const PLACEHOLDER_IMAGE: &str = "drone/placeholder:1";

/// When a step runs, relative to the outcome of its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPolicy {
    #[default]
    OnSuccess,
    OnFailure,
    Always,
    Never,
}

/// Whether a failing step fails the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrPolicy {
    #[default]
    Fail,
    Ignore,
}

/// An environment variable resolved from the stage secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretVar {
    /// Key within the stage secret.
    pub name: String,
    /// Environment variable name visible to the step.
    pub env: String,
    /// Fail compilation when the secret cannot be resolved.
    pub required: bool,
}

/// One compiled step. The container slot name equals [`Step::id`].
#[derive(Debug, Clone, Default)]
pub struct Step {
    pub id: String,
    pub name: String,
    /// 1-based position assigned at compile time.
    pub number: i64,
    pub image: String,
    pub placeholder: String,
    pub pull: String,
    pub detach: bool,
    pub privileged: bool,
    pub working_dir: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub envs: BTreeMap<String, String>,
    pub secret_envs: Vec<SecretVar>,
    pub volume_mounts: Vec<VolumeMount>,
    pub resources: ResourceRequirements,
    pub depends_on: Vec<String>,
    pub run_policy: RunPolicy,
    pub err_policy: ErrPolicy,
}

impl Step {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run_policy(&self) -> RunPolicy {
        self.run_policy
    }

    pub fn err_policy(&self) -> ErrPolicy {
        self.err_policy
    }

    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }
}

/// The compiled plan for one stage.
#[derive(Debug, Clone, Default)]
pub struct Spec {
    /// Pod name; also the name of the stage secret.
    pub pod_name: String,
    /// Target namespace.
    pub namespace: String,
    /// True when the namespace was generated for this stage and is
    /// owned (created and destroyed) by it.
    pub namespace_owned: bool,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub node_selector: BTreeMap<String, String>,
    pub tolerations: Vec<Toleration>,
    pub service_account_name: String,
    /// Attach the pod to the host network. Linted against repository
    /// trust before compilation.
    pub host_network: bool,
    /// Pre-existing pull secrets named by the pipeline.
    pub image_pull_secrets: Vec<String>,
    pub volumes: Vec<Volume>,
    /// Secrets resolved at compile time, projected as the stage secret.
    pub secrets: Vec<Secret>,
    /// Registry credentials, projected as a dockerconfigjson secret.
    pub pull_secret: Option<PullSecret>,
    pub steps: Vec<Step>,
}

/// Image pull credentials attached to the pod.
#[derive(Debug, Clone, Default)]
pub struct PullSecret {
    pub name: String,
    /// The `.dockerconfigjson` payload.
    pub data: String,
}

impl Spec {
    pub fn step_len(&self) -> usize {
        self.steps.len()
    }

    pub fn step_at(&self, index: usize) -> &Step {
        &self.steps[index]
    }

    /// Find a compiled step by name.
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }
}
