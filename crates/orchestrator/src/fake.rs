// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake orchestrator for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::pod::{
    ContainerState, ContainerStateRunning, ContainerStateTerminated, ContainerStateWaiting,
    ContainerStatus, Namespace, Pod, Secret,
};
use crate::traits::{LogStream, Orchestrator, OrchestratorError, PodEvent, PodWatch};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Recorded orchestrator call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorCall {
    CreateNamespace { name: String },
    DeleteNamespace { name: String },
    CreateSecret { namespace: String, name: String },
    DeleteSecret { namespace: String, name: String },
    CreatePod { namespace: String, name: String },
    DeletePod { namespace: String, name: String },
    GetPod { namespace: String, name: String },
    UpdatePod { namespace: String, name: String },
    WatchPod { namespace: String, name: String },
    TailLogs { container: String, follow: bool },
}

struct PodEntry {
    pod: Pod,
    watchers: Vec<mpsc::UnboundedSender<PodEvent>>,
    logs: HashMap<String, LogEntry>,
}

#[derive(Default)]
struct LogEntry {
    chunks: Vec<Bytes>,
    subscribers: Vec<mpsc::UnboundedSender<Result<Bytes, OrchestratorError>>>,
    closed: bool,
}

#[derive(Default)]
struct FakeState {
    namespaces: Vec<String>,
    secrets: Vec<(String, String)>,
    pods: HashMap<(String, String), PodEntry>,
    calls: Vec<OrchestratorCall>,
    version: u64,
    /// Number of upcoming pod updates that fail with Conflict.
    update_conflicts: u32,
    /// Number of upcoming log tails that fail mid-stream.
    tail_failures: u32,
}

/// In-memory orchestrator for tests. Pods do not run anything; tests
/// drive container status transitions and log content explicitly.
#[derive(Clone, Default)]
pub struct FakeOrchestrator {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<OrchestratorCall> {
        self.lock().calls.clone()
    }

    /// Script the next `n` pod updates to fail with a conflict.
    pub fn fail_next_updates(&self, n: u32) {
        self.lock().update_conflicts = n;
    }

    /// Script the next `n` log tails to fail mid-stream.
    pub fn fail_next_tails(&self, n: u32) {
        self.lock().tail_failures = n;
    }

    /// Current pod state, if the pod exists.
    pub fn pod(&self, namespace: &str, name: &str) -> Option<Pod> {
        self.lock()
            .pods
            .get(&(namespace.to_string(), name.to_string()))
            .map(|entry| entry.pod.clone())
    }

    /// Names of namespaces currently present.
    pub fn namespaces(&self) -> Vec<String> {
        self.lock().namespaces.clone()
    }

    /// (namespace, name) pairs of secrets currently present.
    pub fn secrets(&self) -> Vec<(String, String)> {
        self.lock().secrets.clone()
    }

    /// Move a container to the running state with the given image.
    pub fn mark_running(&self, namespace: &str, pod: &str, container: &str, image: &str) {
        self.set_container_state(
            namespace,
            pod,
            container,
            image,
            ContainerState {
                running: Some(ContainerStateRunning::default()),
                ..Default::default()
            },
        );
    }

    /// Move a container to the terminated state.
    pub fn mark_terminated(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        image: &str,
        exit_code: i32,
        reason: &str,
    ) {
        self.set_container_state(
            namespace,
            pod,
            container,
            image,
            ContainerState {
                terminated: Some(ContainerStateTerminated {
                    exit_code,
                    reason: reason.to_string(),
                }),
                ..Default::default()
            },
        );
    }

    fn set_container_state(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        image: &str,
        state: ContainerState,
    ) {
        let mut guard = self.lock();
        let Some(entry) = guard
            .pods
            .get_mut(&(namespace.to_string(), pod.to_string()))
        else {
            return;
        };
        let statuses = &mut entry.pod.status.container_statuses;
        match statuses.iter_mut().find(|cs| cs.name == container) {
            Some(cs) => {
                cs.image = image.to_string();
                cs.state = state;
            }
            None => statuses.push(ContainerStatus {
                name: container.to_string(),
                image: image.to_string(),
                state,
            }),
        }
        let snapshot = entry.pod.clone();
        entry
            .watchers
            .retain(|tx| tx.send(PodEvent::Modified(Box::new(snapshot.clone()))).is_ok());
    }

    /// Append a chunk to a container's log stream.
    pub fn push_log(&self, namespace: &str, pod: &str, container: &str, chunk: &[u8]) {
        let mut guard = self.lock();
        let Some(entry) = guard
            .pods
            .get_mut(&(namespace.to_string(), pod.to_string()))
        else {
            return;
        };
        let log = entry.logs.entry(container.to_string()).or_default();
        let bytes = Bytes::copy_from_slice(chunk);
        log.chunks.push(bytes.clone());
        log.subscribers.retain(|tx| tx.send(Ok(bytes.clone())).is_ok());
    }

    /// Close a container's log stream, ending any live tails.
    pub fn close_logs(&self, namespace: &str, pod: &str, container: &str) {
        let mut guard = self.lock();
        let Some(entry) = guard
            .pods
            .get_mut(&(namespace.to_string(), pod.to_string()))
        else {
            return;
        };
        let log = entry.logs.entry(container.to_string()).or_default();
        log.closed = true;
        log.subscribers.clear();
    }
}

#[async_trait]
impl Orchestrator for FakeOrchestrator {
    async fn create_namespace(&self, namespace: &Namespace) -> Result<(), OrchestratorError> {
        let mut guard = self.lock();
        let name = namespace.metadata.name.clone();
        guard.calls.push(OrchestratorCall::CreateNamespace {
            name: name.clone(),
        });
        if guard.namespaces.contains(&name) {
            return Err(OrchestratorError::AlreadyExists(name));
        }
        guard.namespaces.push(name);
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), OrchestratorError> {
        let mut guard = self.lock();
        guard.calls.push(OrchestratorCall::DeleteNamespace {
            name: name.to_string(),
        });
        let before = guard.namespaces.len();
        guard.namespaces.retain(|n| n != name);
        if guard.namespaces.len() == before {
            return Err(OrchestratorError::NotFound(name.to_string()));
        }
        Ok(())
    }

    async fn create_secret(&self, secret: &Secret) -> Result<(), OrchestratorError> {
        let mut guard = self.lock();
        let key = (
            secret.metadata.namespace.clone(),
            secret.metadata.name.clone(),
        );
        guard.calls.push(OrchestratorCall::CreateSecret {
            namespace: key.0.clone(),
            name: key.1.clone(),
        });
        if guard.secrets.contains(&key) {
            return Err(OrchestratorError::AlreadyExists(key.1));
        }
        guard.secrets.push(key);
        Ok(())
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), OrchestratorError> {
        let mut guard = self.lock();
        guard.calls.push(OrchestratorCall::DeleteSecret {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        let key = (namespace.to_string(), name.to_string());
        let before = guard.secrets.len();
        guard.secrets.retain(|k| k != &key);
        if guard.secrets.len() == before {
            return Err(OrchestratorError::NotFound(name.to_string()));
        }
        Ok(())
    }

    async fn create_pod(&self, pod: &Pod) -> Result<(), OrchestratorError> {
        let mut guard = self.lock();
        let key = (pod.metadata.namespace.clone(), pod.metadata.name.clone());
        guard.calls.push(OrchestratorCall::CreatePod {
            namespace: key.0.clone(),
            name: key.1.clone(),
        });
        if guard.pods.contains_key(&key) {
            return Err(OrchestratorError::AlreadyExists(key.1));
        }
        guard.version += 1;
        let mut stored = pod.clone();
        stored.metadata.resource_version = guard.version.to_string();
        // The kubelet reports all containers as waiting on the declared
        // image until something starts them.
        stored.status.phase = "Pending".to_string();
        stored.status.container_statuses = stored
            .spec
            .containers
            .iter()
            .map(|c| ContainerStatus {
                name: c.name.clone(),
                image: c.image.clone(),
                state: ContainerState {
                    waiting: Some(ContainerStateWaiting {
                        reason: "PodInitializing".to_string(),
                    }),
                    ..Default::default()
                },
            })
            .collect();
        guard.pods.insert(
            key,
            PodEntry {
                pod: stored,
                watchers: Vec::new(),
                logs: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), OrchestratorError> {
        let mut guard = self.lock();
        guard.calls.push(OrchestratorCall::DeletePod {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        let key = (namespace.to_string(), name.to_string());
        match guard.pods.remove(&key) {
            Some(entry) => {
                for tx in &entry.watchers {
                    let _ = tx.send(PodEvent::Deleted);
                }
                Ok(())
            }
            None => Err(OrchestratorError::NotFound(name.to_string())),
        }
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, OrchestratorError> {
        let mut guard = self.lock();
        guard.calls.push(OrchestratorCall::GetPod {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        guard
            .pods
            .get(&(namespace.to_string(), name.to_string()))
            .map(|entry| entry.pod.clone())
            .ok_or_else(|| OrchestratorError::NotFound(name.to_string()))
    }

    async fn update_pod(&self, pod: &Pod) -> Result<(), OrchestratorError> {
        let mut guard = self.lock();
        let key = (pod.metadata.namespace.clone(), pod.metadata.name.clone());
        guard.calls.push(OrchestratorCall::UpdatePod {
            namespace: key.0.clone(),
            name: key.1.clone(),
        });
        if guard.update_conflicts > 0 {
            guard.update_conflicts -= 1;
            return Err(OrchestratorError::Conflict);
        }
        guard.version += 1;
        let next_version = guard.version.to_string();
        let entry = guard
            .pods
            .get_mut(&key)
            .ok_or_else(|| OrchestratorError::NotFound(key.1.clone()))?;
        if pod.metadata.resource_version != entry.pod.metadata.resource_version {
            return Err(OrchestratorError::Conflict);
        }
        let status = entry.pod.status.clone();
        entry.pod = pod.clone();
        entry.pod.status = status;
        entry.pod.metadata.resource_version = next_version;
        let snapshot = entry.pod.clone();
        entry
            .watchers
            .retain(|tx| tx.send(PodEvent::Modified(Box::new(snapshot.clone()))).is_ok());
        Ok(())
    }

    async fn watch_pod(&self, namespace: &str, name: &str) -> Result<PodWatch, OrchestratorError> {
        let mut guard = self.lock();
        guard.calls.push(OrchestratorCall::WatchPod {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        let entry = guard
            .pods
            .get_mut(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| OrchestratorError::NotFound(name.to_string()))?;
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(PodEvent::Modified(Box::new(entry.pod.clone())));
        entry.watchers.push(tx);
        Ok(PodWatch::new(rx))
    }

    async fn tail_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        follow: bool,
    ) -> Result<LogStream, OrchestratorError> {
        let mut guard = self.lock();
        guard.calls.push(OrchestratorCall::TailLogs {
            container: container.to_string(),
            follow,
        });
        if guard.tail_failures > 0 {
            guard.tail_failures -= 1;
            let (tx, rx) = mpsc::unbounded_channel();
            let _ = tx.send(Err(OrchestratorError::Api {
                status: 500,
                message: "log stream reset".to_string(),
            }));
            return Ok(LogStream::new(rx));
        }
        let entry = guard
            .pods
            .get_mut(&(namespace.to_string(), pod.to_string()))
            .ok_or_else(|| OrchestratorError::NotFound(pod.to_string()))?;
        let log = entry.logs.entry(container.to_string()).or_default();
        let (tx, rx) = mpsc::unbounded_channel();
        for chunk in &log.chunks {
            let _ = tx.send(Ok(chunk.clone()));
        }
        if follow && !log.closed {
            log.subscribers.push(tx);
        }
        Ok(LogStream::new(rx))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
