// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gantry-orchestrator: the seam between the engine and the cluster.
//!
//! The engine talks to a small trait covering exactly the operations a
//! stage needs: namespace/secret/pod lifecycle, optimistic pod updates,
//! pod watches and container log streams. The real implementation is a
//! thin REST client against the Kubernetes API; tests use the
//! in-memory fake.

#[cfg(any(test, feature = "test-support"))]
pub mod fake;
pub mod kube;
pub mod pod;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeOrchestrator, OrchestratorCall};
pub use kube::{KubeConfig, KubeOrchestrator};
pub use pod::{
    Container, ContainerState, ContainerStateRunning, ContainerStateTerminated,
    ContainerStateWaiting, ContainerStatus, EnvVar, EnvVarSource, LocalObjectReference, Namespace,
    ObjectMeta, Pod, PodSpec, PodStatus, ResourceList, ResourceRequirements, Secret, SecretKeyRef,
    SecurityContext, Toleration, Volume, VolumeMount,
};
pub use traits::{LogStream, Orchestrator, OrchestratorError, PodEvent, PodWatch};
