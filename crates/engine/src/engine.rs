// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pod lifecycle driver.
//!
//! Setup creates the namespace (when owned), the stage secrets and one
//! pod whose container slots are all parked on the placeholder image.
//! Running a step swaps its container image in place and follows the
//! container through ready, log tail and termination. The pod topology
//! never changes after setup.

use crate::image;
use crate::livelog::{self, LineSink};
use crate::runtime::{DestroyError, Engine, EngineError, StepResult};
use crate::spec::{Spec, Step};
use async_trait::async_trait;
use gantry_orchestrator::pod::{
    Container, EnvVar, EnvVarSource, LocalObjectReference, Namespace, ObjectMeta, Pod, PodSpec,
    Secret, SecretKeyRef, SecurityContext,
};
use gantry_orchestrator::{Orchestrator, OrchestratorError, PodEvent};
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Environment variables conveyed to the pod as annotations when a
/// step starts, so sidecar tooling can observe stage status.
const STATUSES_WHITELIST: &[&str] = &[
    "DRONE_BUILD_STATUS",
    "DRONE_STAGE_STATUS",
    "DRONE_FAILED_STEPS",
];

/// Optimistic-concurrency retry budget for the image swap.
const START_ATTEMPTS: u32 = 15;
const START_BACKOFF: Duration = Duration::from_millis(500);
const START_JITTER: f64 = 0.5;

/// Upper bound on waiting for log tails to drain before teardown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause between log tail retries under the feature flag.
const TAIL_RETRY_PAUSE: Duration = Duration::from_secs(5);

/// Feature flag enabling the log tail retry path.
const RETRY_LOGS_FLAG: &str = "GANTRY_FEATURE_FLAG_RETRY_LOGS";

/// Tracks live log tails per pod so destroy can wait for them to
/// drain instead of sleeping blindly.
#[derive(Default)]
struct TailTracker {
    counts: Mutex<HashMap<String, usize>>,
    drained: Notify,
}

impl TailTracker {
    fn begin(self: &Arc<Self>, pod: &str) -> TailGuard {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        *counts.entry(pod.to_string()).or_insert(0) += 1;
        TailGuard {
            tracker: Arc::clone(self),
            pod: pod.to_string(),
        }
    }

    fn active(&self, pod: &str) -> usize {
        let counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        counts.get(pod).copied().unwrap_or(0)
    }

    async fn drain(&self, pod: &str) {
        let wait = async {
            loop {
                let notified = self.drained.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.active(pod) == 0 {
                    return;
                }
                notified.await;
            }
        };
        // Bounded grace: never hold teardown hostage to a stuck tail.
        let _ = tokio::time::timeout(DRAIN_TIMEOUT, wait).await;
    }
}

struct TailGuard {
    tracker: Arc<TailTracker>,
    pod: String,
}

impl Drop for TailGuard {
    fn drop(&mut self) {
        let mut counts = self
            .tracker
            .counts
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(count) = counts.get_mut(&self.pod) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counts.remove(&self.pod);
            }
        }
        drop(counts);
        self.tracker.drained.notify_waiters();
    }
}

/// Engine over a pod orchestrator.
#[derive(Clone)]
pub struct PodEngine<O: Orchestrator> {
    orchestrator: O,
    /// Serializes pod read-modify-write windows per pod, to cut the
    /// conflict churn when a fan-out starts many steps at once.
    pod_locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
    tails: Arc<TailTracker>,
    ready_timeout: Duration,
}

impl<O: Orchestrator> PodEngine<O> {
    pub fn new(orchestrator: O) -> Self {
        Self {
            orchestrator,
            pod_locks: Arc::new(Mutex::new(HashMap::new())),
            tails: Arc::new(TailTracker::default()),
            ready_timeout: Duration::from_secs(300),
        }
    }

    /// Override the per-step readiness budget.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    fn pod_lock(&self, pod: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.pod_locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(pod.to_string()).or_default())
    }

    /// Swap the step's container image from the placeholder to the
    /// real image, retrying on optimistic-concurrency conflicts.
    async fn start(&self, spec: &Spec, step: &Step) -> Result<(), EngineError> {
        let lock = self.pod_lock(&spec.pod_name);
        let mut attempt = 0;
        loop {
            let result = {
                let _guard = lock.lock().await;
                let mut pod = self
                    .orchestrator
                    .get_pod(&spec.namespace, &spec.pod_name)
                    .await?;
                if let Some(container) = pod.container_mut(&step.id) {
                    container.image = step.image.clone();
                }
                for key in STATUSES_WHITELIST {
                    if let Some(value) = step.envs.get(*key) {
                        pod.metadata
                            .annotations
                            .insert((*key).to_string(), value.clone());
                    }
                }
                self.orchestrator.update_pod(&pod).await
            };
            match result {
                Ok(()) => return Ok(()),
                Err(OrchestratorError::Conflict) => {
                    attempt += 1;
                    if attempt >= START_ATTEMPTS {
                        return Err(OrchestratorError::Conflict.into());
                    }
                    tokio::time::sleep(backoff_delay()).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn wait_for<F>(
        &self,
        spec: &Spec,
        cancel: &CancellationToken,
        mut condition: F,
    ) -> Result<(), EngineError>
    where
        F: FnMut(&Pod) -> bool + Send,
    {
        let mut watch = self
            .orchestrator
            .watch_pod(&spec.namespace, &spec.pod_name)
            .await?;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                event = watch.next() => match event {
                    Some(PodEvent::Modified(pod)) => {
                        if condition(&pod) {
                            return Ok(());
                        }
                    }
                    Some(PodEvent::Deleted) | None => {
                        return Err(OrchestratorError::PodDeleted.into());
                    }
                },
            }
        }
    }

    /// Wait until the container has left the placeholder and is
    /// running or already terminated.
    async fn wait_for_ready(
        &self,
        spec: &Spec,
        step: &Step,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        let placeholder = step.placeholder.clone();
        let container = step.id.clone();
        let wait = self.wait_for(spec, cancel, move |pod| {
            pod.container_status(&container)
                .map(|cs| {
                    !image::matches(&cs.image, &placeholder)
                        && (cs.state.running.is_some() || cs.state.terminated.is_some())
                })
                .unwrap_or(false)
        });
        match tokio::time::timeout(self.ready_timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::ReadyTimeout(step.id.clone())),
        }
    }

    /// Wait for termination and capture the exit status.
    async fn wait_for_terminated(
        &self,
        spec: &Spec,
        step: &Step,
        cancel: &CancellationToken,
    ) -> Result<StepResult, EngineError> {
        let placeholder = step.placeholder.clone();
        let container = step.id.clone();
        let result = Arc::new(Mutex::new(StepResult {
            exited: true,
            ..Default::default()
        }));
        let captured = Arc::clone(&result);
        self.wait_for(spec, cancel, move |pod| {
            let Some(cs) = pod.container_status(&container) else {
                return false;
            };
            if image::matches(&cs.image, &placeholder) {
                return false;
            }
            let Some(terminated) = &cs.state.terminated else {
                return false;
            };
            let mut state = captured.lock().unwrap_or_else(|e| e.into_inner());
            state.exit_code = terminated.exit_code;
            state.oom_killed = terminated.oom_killed();
            true
        })
        .await?;
        let state = *result.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state)
    }

    async fn tail(
        &self,
        spec: &Spec,
        step: &Step,
        output: &dyn LineSink,
    ) -> Result<(), EngineError> {
        let stream = self
            .orchestrator
            .tail_logs(&spec.namespace, &spec.pod_name, &step.id, true)
            .await?;
        livelog::copy(stream, output).await?;
        Ok(())
    }

    /// Tail with the retry behavior of the original runner: when the
    /// first tail fails, one flag-gated retry and one unconditional
    /// retry, each after a pause.
    async fn tail_with_retry(
        &self,
        spec: &Spec,
        step: &Step,
        output: &dyn LineSink,
    ) -> Result<(), EngineError> {
        let _guard = self.tails.begin(&spec.pod_name);
        let mut result = self.tail(spec, step, output).await;
        if result.is_err() {
            if std::env::var(RETRY_LOGS_FLAG).as_deref() == Ok("true") {
                tokio::time::sleep(TAIL_RETRY_PAUSE).await;
                result = self.tail(spec, step, output).await;
            }
            if result.is_err() {
                tokio::time::sleep(TAIL_RETRY_PAUSE).await;
                result = self.tail(spec, step, output).await;
            }
        }
        result
    }
}

fn backoff_delay() -> Duration {
    let jitter = rand::thread_rng().gen_range(0.0..START_JITTER);
    START_BACKOFF.mul_f64(1.0 + jitter)
}

#[async_trait]
impl<O: Orchestrator> Engine for PodEngine<O> {
    async fn setup(&self, spec: &Spec) -> Result<(), EngineError> {
        tracing::debug!(pod = %spec.pod_name, namespace = %spec.namespace, "engine: setup");

        if spec.namespace_owned {
            self.orchestrator
                .create_namespace(&to_namespace(spec))
                .await?;
        }
        if let Some(pull_secret) = to_docker_config_secret(spec) {
            self.orchestrator.create_secret(&pull_secret).await?;
        }
        self.orchestrator.create_secret(&to_secret(spec)).await?;
        self.orchestrator.create_pod(&to_pod(spec)).await?;
        Ok(())
    }

    async fn destroy(&self, spec: &Spec) -> Result<(), DestroyError> {
        // Let in-flight log tails finish before the pod goes away.
        self.tails.drain(&spec.pod_name).await;

        tracing::debug!(pod = %spec.pod_name, namespace = %spec.namespace, "engine: destroy");
        let mut result = DestroyError::default();

        if let Some(pull_secret) = &spec.pull_secret {
            if let Err(err) = self
                .orchestrator
                .delete_secret(&spec.namespace, &pull_secret.name)
                .await
            {
                result.push(err);
            }
        }
        if let Err(err) = self
            .orchestrator
            .delete_secret(&spec.namespace, &spec.pod_name)
            .await
        {
            result.push(err);
        }
        if let Err(err) = self
            .orchestrator
            .delete_pod(&spec.namespace, &spec.pod_name)
            .await
        {
            result.push(err);
        }
        if spec.namespace_owned {
            if let Err(err) = self.orchestrator.delete_namespace(&spec.namespace).await {
                result.push(err);
            }
        }
        result.into_result()
    }

    async fn run(
        &self,
        spec: &Spec,
        step: &Step,
        output: Arc<dyn LineSink>,
        cancel: &CancellationToken,
    ) -> Result<StepResult, EngineError> {
        tracing::debug!(step = %step.name, container = %step.id, "engine: starting step");
        self.start(spec, step).await?;
        self.wait_for_ready(spec, step, cancel).await?;
        self.tail_with_retry(spec, step, output.as_ref()).await?;
        self.wait_for_terminated(spec, step, cancel).await
    }
}

// =============================================================================
// Object assembly
// =============================================================================

/// Namespace object for an owned namespace.
pub fn to_namespace(spec: &Spec) -> Namespace {
    Namespace::new(&spec.namespace, spec.labels.clone())
}

/// The stage secret holding every resolved secret value.
pub fn to_secret(spec: &Spec) -> Secret {
    let mut string_data = BTreeMap::new();
    for secret in &spec.secrets {
        string_data.insert(secret.name.clone(), secret.data.clone());
    }
    Secret {
        metadata: ObjectMeta {
            name: spec.pod_name.clone(),
            namespace: spec.namespace.clone(),
            labels: spec.labels.clone(),
            ..Default::default()
        },
        secret_type: "Opaque".to_string(),
        string_data,
    }
}

/// The dockerconfigjson pull secret, when registry credentials exist.
pub fn to_docker_config_secret(spec: &Spec) -> Option<Secret> {
    let pull_secret = spec.pull_secret.as_ref()?;
    let mut string_data = BTreeMap::new();
    string_data.insert(".dockerconfigjson".to_string(), pull_secret.data.clone());
    Some(Secret {
        metadata: ObjectMeta {
            name: pull_secret.name.clone(),
            namespace: spec.namespace.clone(),
            labels: spec.labels.clone(),
            ..Default::default()
        },
        secret_type: "kubernetes.io/dockerconfigjson".to_string(),
        string_data,
    })
}

/// The stage pod with every container parked on the placeholder.
pub fn to_pod(spec: &Spec) -> Pod {
    let mut image_pull_secrets: Vec<LocalObjectReference> = spec
        .image_pull_secrets
        .iter()
        .map(|name| LocalObjectReference { name: name.clone() })
        .collect();
    if let Some(pull_secret) = &spec.pull_secret {
        image_pull_secrets.push(LocalObjectReference {
            name: pull_secret.name.clone(),
        });
    }
    Pod {
        metadata: ObjectMeta {
            name: spec.pod_name.clone(),
            namespace: spec.namespace.clone(),
            labels: spec.labels.clone(),
            annotations: spec.annotations.clone(),
            ..Default::default()
        },
        spec: PodSpec {
            restart_policy: "Never".to_string(),
            dns_policy: "ClusterFirst".to_string(),
            host_network: spec.host_network,
            service_account_name: spec.service_account_name.clone(),
            node_selector: spec.node_selector.clone(),
            tolerations: spec.tolerations.clone(),
            image_pull_secrets,
            volumes: spec.volumes.clone(),
            containers: spec.steps.iter().map(|step| to_container(spec, step)).collect(),
        },
        ..Default::default()
    }
}

fn to_container(spec: &Spec, step: &Step) -> Container {
    let mut env: Vec<EnvVar> = step
        .envs
        .iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: value.clone(),
            ..Default::default()
        })
        .collect();
    for secret_var in &step.secret_envs {
        env.push(EnvVar {
            name: secret_var.env.clone(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeyRef {
                    name: spec.pod_name.clone(),
                    key: secret_var.name.clone(),
                    optional: None,
                }),
            }),
            ..Default::default()
        });
    }
    Container {
        name: step.id.clone(),
        image: step.placeholder.clone(),
        image_pull_policy: match step.pull.as_str() {
            "always" => "Always".to_string(),
            "never" => "Never".to_string(),
            "if-not-exists" => "IfNotPresent".to_string(),
            _ => String::new(),
        },
        command: step.command.clone(),
        args: step.args.clone(),
        working_dir: step.working_dir.clone(),
        env,
        volume_mounts: step.volume_mounts.clone(),
        resources: step.resources.clone(),
        security_context: step.privileged.then(|| SecurityContext {
            privileged: Some(true),
        }),
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
