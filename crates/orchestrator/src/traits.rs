// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The orchestrator trait the engine is written against.

use crate::pod::{Namespace, Pod, Secret};
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from orchestrator operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Optimistic-concurrency conflict on update; the caller should
    /// re-read and retry.
    #[error("conflict: object was modified")]
    Conflict,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    /// The watched pod was deleted out from under the caller.
    #[error("pod got deleted")]
    PodDeleted,
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One observed change to a watched pod.
#[derive(Debug, Clone)]
pub enum PodEvent {
    /// The pod was added or modified; carries the full snapshot.
    Modified(Box<Pod>),
    /// The pod was deleted.
    Deleted,
}

/// A stream of pod snapshots. The current state is always delivered
/// first, so a condition that already holds is observed immediately.
pub struct PodWatch {
    rx: mpsc::UnboundedReceiver<PodEvent>,
}

impl PodWatch {
    pub fn new(rx: mpsc::UnboundedReceiver<PodEvent>) -> Self {
        Self { rx }
    }

    /// Next event, or None when the watch closes.
    pub async fn next(&mut self) -> Option<PodEvent> {
        self.rx.recv().await
    }
}

/// A stream of raw log chunks for one container.
pub struct LogStream {
    rx: mpsc::UnboundedReceiver<Result<Bytes, OrchestratorError>>,
}

impl LogStream {
    pub fn new(rx: mpsc::UnboundedReceiver<Result<Bytes, OrchestratorError>>) -> Self {
        Self { rx }
    }

    /// Next chunk, or None when the upstream closes the stream.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes, OrchestratorError>> {
        self.rx.recv().await
    }
}

/// Cluster operations a stage needs. Implementations must be cheap to
/// clone; clones share the underlying connection state.
#[async_trait]
pub trait Orchestrator: Clone + Send + Sync + 'static {
    /// Create a namespace.
    async fn create_namespace(&self, namespace: &Namespace) -> Result<(), OrchestratorError>;

    /// Delete a namespace and everything in it.
    async fn delete_namespace(&self, name: &str) -> Result<(), OrchestratorError>;

    /// Create a secret.
    async fn create_secret(&self, secret: &Secret) -> Result<(), OrchestratorError>;

    /// Delete a secret.
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), OrchestratorError>;

    /// Create a pod.
    async fn create_pod(&self, pod: &Pod) -> Result<(), OrchestratorError>;

    /// Delete a pod.
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), OrchestratorError>;

    /// Read the current pod state.
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, OrchestratorError>;

    /// Replace the pod spec. Fails with [`OrchestratorError::Conflict`]
    /// when `metadata.resource_version` is stale.
    async fn update_pod(&self, pod: &Pod) -> Result<(), OrchestratorError>;

    /// Watch a pod by name. Events carry full snapshots; the first
    /// event reflects the state at subscription time.
    async fn watch_pod(&self, namespace: &str, name: &str) -> Result<PodWatch, OrchestratorError>;

    /// Stream logs for one container of a pod.
    async fn tail_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        follow: bool,
    ) -> Result<LogStream, OrchestratorError>;
}
