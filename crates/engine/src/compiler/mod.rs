// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lowers a linted pipeline into the engine specification.
//!
//! Compilation is deterministic: identical inputs produce identical
//! specs. All maps are ordered, names derive from stable identifiers
//! and nothing here consults the clock or randomness.

pub mod util;

use crate::spec::{ErrPolicy, PullSecret, RunPolicy, Spec, Step, PLACEHOLDER_IMAGE};
use crate::image;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use gantry_client::registry;
use gantry_client::secret;
use gantry_core::{environ, Build, Netrc, Repo, Secret, Stage, System};
use gantry_manifest::types::{Manifest, Pipeline, Volume as ManifestVolume};
use gantry_orchestrator::pod::{
    EmptyDirVolumeSource, HostPathVolumeSource, ResourceList, ResourceRequirements, Toleration,
    Volume, VolumeMount,
};
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

/// Default path of the shared workspace volume.
const WORKSPACE_PATH: &str = "/drone/src";

/// Name of the shared workspace volume.
const WORKSPACE_VOLUME: &str = "workspace";

/// Errors from compilation.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("compile: {0}")]
    Secret(#[from] secret::SecretError),
    #[error("compile: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("compile: step {step} depends on unknown step {dependency}")]
    UnknownDependency { step: String, dependency: String },
    #[error("compile: step {step} requires unavailable secret {secret}")]
    MissingSecret { step: String, secret: String },
}

/// Compiler settings shared across stages.
#[derive(Debug, Clone)]
pub struct Compiler {
    /// Global environment, lowest precedence.
    pub environ: BTreeMap<String, String>,
    /// Fixed namespace; empty means one namespace per stage, owned by
    /// the stage.
    pub namespace: String,
    /// Image for the generated clone step.
    pub clone_image: String,
    /// Sentinel image for unstarted container slots.
    pub placeholder: String,
    /// Service account override for the pod.
    pub service_account: String,
}

impl Default for Compiler {
    fn default() -> Self {
        Self {
            environ: BTreeMap::new(),
            namespace: String::new(),
            clone_image: "drone/git:latest".to_string(),
            placeholder: PLACEHOLDER_IMAGE.to_string(),
            service_account: String::new(),
        }
    }
}

/// Everything the compiler needs for one stage.
pub struct CompilerArgs<'a> {
    pub pipeline: &'a Pipeline,
    pub manifest: &'a Manifest,
    pub build: &'a Build,
    pub stage: &'a Stage,
    pub repo: &'a Repo,
    pub system: &'a System,
    pub netrc: Option<&'a Netrc>,
    pub secret: &'a dyn secret::Provider,
    pub registry: &'a dyn registry::Provider,
}

impl Compiler {
    /// Compile the pipeline to an execution spec.
    pub async fn compile(&self, args: CompilerArgs<'_>) -> Result<Spec, CompileError> {
        let pipeline = args.pipeline;
        let pod_name = format!("drone-{}", args.stage.id);

        let (namespace, namespace_owned) = if !pipeline.metadata.namespace.is_empty() {
            (pipeline.metadata.namespace.clone(), false)
        } else if !self.namespace.is_empty() {
            (self.namespace.clone(), false)
        } else {
            (format!("drone-{}", args.stage.id), true)
        };

        let workspace = if pipeline.workspace.path.is_empty() {
            WORKSPACE_PATH.to_string()
        } else {
            pipeline.workspace.path.clone()
        };

        // Composed environment, later layers overriding earlier ones.
        let mut base_env = environ::combine(&[
            self.environ.clone(),
            environ::system(args.system),
            environ::repo(args.repo),
            environ::build(args.build),
            environ::stage(args.stage),
            environ::link(args.repo, args.build, args.system),
            args.build.params.clone(),
        ]);
        if let Some(netrc) = args.netrc {
            base_env.insert("DRONE_NETRC_MACHINE".to_string(), netrc.machine.clone());
            base_env.insert("DRONE_NETRC_USERNAME".to_string(), netrc.login.clone());
            base_env.insert("DRONE_NETRC_PASSWORD".to_string(), netrc.password.clone());
        }
        base_env.insert("DRONE_WORKSPACE".to_string(), workspace.clone());

        let mut spec = Spec {
            pod_name: pod_name.clone(),
            namespace,
            namespace_owned,
            service_account_name: if pipeline.service_account_name.is_empty() {
                self.service_account.clone()
            } else {
                pipeline.service_account_name.clone()
            },
            host_network: pipeline.host_network,
            image_pull_secrets: pipeline.image_pull_secrets.clone(),
            node_selector: pipeline.node_selector.clone(),
            annotations: pipeline.metadata.annotations.clone(),
            ..Default::default()
        };

        spec.labels = pipeline.metadata.labels.clone();
        spec.labels
            .insert("io.drone".to_string(), "true".to_string());
        spec.labels
            .insert("io.drone.name".to_string(), pod_name.clone());
        spec.labels
            .insert("io.drone.stage.id".to_string(), args.stage.id.to_string());

        spec.tolerations = pipeline
            .tolerations
            .iter()
            .map(|t| Toleration {
                key: t.key.clone(),
                operator: t.operator.clone(),
                value: t.value.clone(),
                effect: t.effect.clone(),
                toleration_seconds: t.toleration_seconds,
            })
            .collect();

        spec.volumes.push(Volume {
            name: WORKSPACE_VOLUME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        });
        for volume in &pipeline.volumes {
            spec.volumes.push(convert_volume(volume));
        }

        // The generated clone step occupies slot one unless disabled.
        if !pipeline.clone.disable {
            let mut step = Step {
                name: "clone".to_string(),
                image: image::expand(&self.clone_image),
                envs: base_env.clone(),
                command: vec!["/bin/sh".to_string(), "-ec".to_string()],
                args: vec![util::script(&clone_commands(pipeline.clone.depth))],
                ..Default::default()
            };
            if pipeline.clone.skip_verify {
                step.envs
                    .insert("GIT_SSL_NO_VERIFY".to_string(), "true".to_string());
            }
            spec.steps.push(step);
        }

        for source in &pipeline.steps {
            let mut step = Step {
                name: source.name.clone(),
                image: image::expand(&source.image),
                pull: source.pull.clone(),
                detach: source.detach,
                privileged: source.privileged,
                depends_on: source.depends_on.clone(),
                envs: environ::combine(&[
                    base_env.clone(),
                    util::convert_settings(&source.settings),
                    util::convert_static_env(&source.environment),
                ]),
                secret_envs: util::convert_secret_env(&source.environment),
                run_policy: run_policy(source, args.build),
                err_policy: if source.failure == "ignore" {
                    ErrPolicy::Ignore
                } else {
                    ErrPolicy::Fail
                },
                resources: convert_resources(&source.resources),
                ..Default::default()
            };
            if !source.commands.is_empty() {
                step.command = vec!["/bin/sh".to_string(), "-ec".to_string()];
                step.args = vec![util::script(&source.commands)];
            }
            if !source.entrypoint.is_empty() {
                step.command = source.entrypoint.clone();
            }
            for mount in &source.volumes {
                step.volume_mounts.push(VolumeMount {
                    name: mount.name.clone(),
                    mount_path: mount.path.clone(),
                });
            }
            spec.steps.push(step);
        }

        // Assign positions, container ids, placeholder and the shared
        // workspace in one stable pass.
        for (index, step) in spec.steps.iter_mut().enumerate() {
            let number = index as i64 + 1;
            step.number = number;
            step.id = format!("step-{number}");
            step.placeholder = self.placeholder.clone();
            step.working_dir = workspace.clone();
            step.volume_mounts.insert(
                0,
                VolumeMount {
                    name: WORKSPACE_VOLUME.to_string(),
                    mount_path: workspace.clone(),
                },
            );
            step.envs
                .insert("DRONE_STEP_NAME".to_string(), step.name.clone());
            step.envs
                .insert("DRONE_STEP_NUMBER".to_string(), number.to_string());
        }

        // Wire the execution order. A pipeline without explicit
        // dependencies runs serially; otherwise the graph is kept and
        // only the clone edges are adjusted.
        if !util::is_graph(&spec) {
            util::configure_serial(&mut spec);
        } else if !pipeline.clone.disable {
            util::configure_clone_deps(&mut spec);
        } else {
            util::remove_clone_deps(&mut spec);
        }

        // Every remaining dependency edge must point at a real step.
        let names: Vec<String> = spec.steps.iter().map(|s| s.name.clone()).collect();
        for step in &spec.steps {
            for dependency in &step.depends_on {
                if !names.contains(dependency) {
                    return Err(CompileError::UnknownDependency {
                        step: step.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        self.resolve_secrets(&mut spec, &args).await?;
        self.resolve_registries(&mut spec, &args).await?;

        Ok(spec)
    }

    /// Resolve secret-backed step environment through the provider.
    /// Secrets the provider cannot see are dropped silently, unless
    /// the step marks them required, which fails compilation.
    async fn resolve_secrets(
        &self,
        spec: &mut Spec,
        args: &CompilerArgs<'_>,
    ) -> Result<(), CompileError> {
        let mut resolved: BTreeMap<String, Secret> = BTreeMap::new();
        for step in &mut spec.steps {
            let mut kept = Vec::new();
            for secret_var in step.secret_envs.drain(..) {
                let request = secret::Request {
                    name: &secret_var.name,
                    build: args.build,
                    repo: args.repo,
                };
                match args.secret.find(&request).await? {
                    Some(found) => {
                        resolved.insert(found.name.to_lowercase(), found);
                        kept.push(secret_var);
                    }
                    None if secret_var.required => {
                        return Err(CompileError::MissingSecret {
                            step: step.name.clone(),
                            secret: secret_var.name.clone(),
                        });
                    }
                    None => {
                        tracing::debug!(
                            secret = %secret_var.name,
                            step = %step.name,
                            "compile: secret not found, dropping"
                        );
                    }
                }
            }
            step.secret_envs = kept;
        }
        spec.secrets = resolved.into_values().collect();
        Ok(())
    }

    /// Project registry credentials as a dockerconfigjson pull secret.
    async fn resolve_registries(
        &self,
        spec: &mut Spec,
        args: &CompilerArgs<'_>,
    ) -> Result<(), CompileError> {
        let request = registry::Request {
            build: args.build,
            repo: args.repo,
        };
        let registries = args.registry.list(&request).await?;
        if registries.is_empty() {
            return Ok(());
        }
        let mut auths = BTreeMap::new();
        for registry in &registries {
            let auth =
                BASE64_STANDARD.encode(format!("{}:{}", registry.username, registry.password));
            auths.insert(registry.address.clone(), json!({ "auth": auth }));
        }
        spec.pull_secret = Some(PullSecret {
            name: format!("{}-registry", spec.pod_name),
            data: json!({ "auths": auths }).to_string(),
        });
        Ok(())
    }
}

/// Derive the run policy from the when clause and the build.
fn run_policy(step: &gantry_manifest::Step, build: &Build) -> RunPolicy {
    if !util::condition_match(&step.when.event, &build.event) {
        return RunPolicy::Never;
    }
    let branch = if build.target.is_empty() {
        &build.source
    } else {
        &build.target
    };
    if !util::condition_match(&step.when.branch, branch) {
        return RunPolicy::Never;
    }
    if util::is_run_always(step) {
        RunPolicy::Always
    } else if util::is_run_on_failure(step) {
        RunPolicy::OnFailure
    } else {
        RunPolicy::OnSuccess
    }
}

fn convert_volume(volume: &ManifestVolume) -> Volume {
    Volume {
        name: volume.name.clone(),
        empty_dir: volume.temp.as_ref().map(|t| EmptyDirVolumeSource {
            medium: t.medium.clone(),
        }),
        host_path: volume
            .host
            .as_ref()
            .map(|h| HostPathVolumeSource { path: h.path.clone() }),
    }
}

fn convert_resources(resources: &gantry_manifest::types::Resources) -> ResourceRequirements {
    ResourceRequirements {
        requests: convert_resource_set(&resources.requests),
        limits: convert_resource_set(&resources.limits),
    }
}

fn convert_resource_set(set: &gantry_manifest::types::ResourceSet) -> ResourceList {
    ResourceList {
        cpu: set.cpu.map(|m| format!("{m}m")).unwrap_or_default(),
        memory: set.memory.map(|b| b.to_string()).unwrap_or_default(),
    }
}

/// Commands for the generated clone step.
fn clone_commands(depth: i64) -> Vec<String> {
    let mut commands = vec![
        "git init".to_string(),
        "git remote add origin $DRONE_REMOTE_URL".to_string(),
    ];
    if depth > 0 {
        commands.push(format!(
            "git fetch --depth={depth} origin +$DRONE_COMMIT_REF:"
        ));
    } else {
        commands.push("git fetch origin +$DRONE_COMMIT_REF:".to_string());
    }
    commands.push("git checkout -qf FETCH_HEAD".to_string());
    commands
}

#[cfg(test)]
#[path = "compiler_tests.rs"]
mod tests;
