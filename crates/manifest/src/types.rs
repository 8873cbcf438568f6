// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw manifest types that mirror the YAML structure exactly.
//!
//! These types are used for parsing only. The compiler lowers them to
//! the engine specification after linting.

use serde::Deserialize;
use std::collections::BTreeMap;

/// A parsed configuration file: one resource per YAML document.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub resources: Vec<Resource>,
}

/// A single YAML document, discriminated by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Resource {
    Pipeline(Pipeline),
    Secret(SecretResource),
    Signature(Signature),
}

impl Resource {
    /// The resource name used for stage lookup.
    pub fn name(&self) -> &str {
        match self {
            Resource::Pipeline(p) => &p.name,
            Resource::Secret(s) => &s.name,
            Resource::Signature(_) => "",
        }
    }
}

/// A pipeline resource.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Pipeline {
    /// Runtime flavor (e.g. `kubernetes`); informational here.
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub platform: Platform,
    pub clone: Clone_,
    pub workspace: Workspace,
    pub metadata: Metadata,
    pub node_selector: BTreeMap<String, String>,
    pub tolerations: Vec<Toleration>,
    pub service_account_name: String,
    /// Run the pod on the host network. Restricted to trusted
    /// repositories.
    pub host_network: bool,
    pub image_pull_secrets: Vec<String>,
    pub steps: Vec<Step>,
    pub volumes: Vec<Volume>,
    pub trigger: Conditions,
    pub depends_on: Vec<String>,
}

/// Target platform for the stage.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

/// Clone step behavior. Named with a trailing underscore to avoid
/// shadowing `std::clone::Clone` in importing code.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Clone_ {
    pub disable: bool,
    pub depth: i64,
    pub skip_verify: bool,
}

/// Shared workspace configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Workspace {
    pub path: String,
}

/// Pod metadata overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub namespace: String,
    pub annotations: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
}

/// Pod toleration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Toleration {
    pub key: String,
    pub operator: String,
    pub value: String,
    pub effect: String,
    pub toleration_seconds: Option<i64>,
}

/// One step of the pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Step {
    pub name: String,
    pub image: String,
    pub pull: String,
    pub commands: Vec<String>,
    pub entrypoint: Vec<String>,
    pub detach: bool,
    pub privileged: bool,
    pub environment: BTreeMap<String, Variable>,
    pub settings: BTreeMap<String, serde_yaml::Value>,
    pub when: Conditions,
    pub depends_on: Vec<String>,
    /// `failure: ignore` keeps the stage green when the step fails.
    pub failure: String,
    pub resources: Resources,
    pub volumes: Vec<VolumeMount>,
}

/// A step environment value: either inline or resolved from a secret.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Variable {
    Value(String),
    Secret {
        from_secret: String,
        /// A missing required secret fails compilation instead of
        /// being dropped.
        #[serde(default)]
        required: bool,
    },
}

impl Default for Variable {
    fn default() -> Self {
        Variable::Value(String::new())
    }
}

/// Conditional execution clauses.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Conditions {
    pub status: Condition,
    pub branch: Condition,
    pub event: Condition,
}

/// An include/exclude matcher. A bare list is shorthand for `include`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "ConditionSchema")]
pub struct Condition {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ConditionSchema {
    List(Vec<String>),
    Map {
        #[serde(default)]
        include: Vec<String>,
        #[serde(default)]
        exclude: Vec<String>,
    },
}

impl From<ConditionSchema> for Condition {
    fn from(schema: ConditionSchema) -> Self {
        match schema {
            ConditionSchema::List(include) => Condition {
                include,
                exclude: Vec::new(),
            },
            ConditionSchema::Map { include, exclude } => Condition { include, exclude },
        }
    }
}

/// Per-step resource requests and limits.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Resources {
    pub requests: ResourceSet,
    pub limits: ResourceSet,
}

/// A cpu/memory pair. CPU in millicores, memory in bytes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResourceSet {
    pub cpu: Option<i64>,
    pub memory: Option<i64>,
}

/// A named volume declared by the pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Volume {
    pub name: String,
    pub temp: Option<EmptyDirVolume>,
    pub host: Option<HostPathVolume>,
}

/// An emptyDir-backed volume.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmptyDirVolume {
    pub medium: String,
    pub size_limit: Option<i64>,
}

/// A hostPath-backed volume. Restricted to trusted repositories.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostPathVolume {
    pub path: String,
}

/// A volume mount within a step.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VolumeMount {
    pub name: String,
    pub path: String,
}

/// A secret resource embedded in the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecretResource {
    pub name: String,
    /// Plaintext data, keyed by secret name.
    pub data: String,
    /// External secret reference.
    pub get: SecretGet,
}

/// Reference to a secret held by an external store.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecretGet {
    pub path: String,
    pub name: String,
}

/// A signature resource; verified upstream, carried through here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Signature {
    pub hmac: String,
}
