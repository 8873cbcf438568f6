// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kubernetes REST implementation of the orchestrator trait.
//!
//! Talks directly to the API server: typed create/delete, optimistic
//! pod replacement, chunked watch streams and container log streams.

use crate::pod::{Namespace, Pod, Secret};
use crate::traits::{LogStream, Orchestrator, OrchestratorError, PodEvent, PodWatch};
use async_trait::async_trait;
use bytes::BytesMut;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Connection settings for the API server.
#[derive(Debug, Clone, Default)]
pub struct KubeConfig {
    /// Base URL, e.g. `https://10.96.0.1:443`.
    pub url: String,
    /// Bearer token; empty disables the Authorization header.
    pub token: String,
    /// PEM-encoded cluster CA bundle, when not in the system store.
    pub ca_bundle: Option<Vec<u8>>,
}

impl KubeConfig {
    /// Build the in-cluster configuration from the mounted service
    /// account, the way official clients do.
    pub fn in_cluster() -> Result<Self, OrchestratorError> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST").map_err(|_| {
            OrchestratorError::NotFound("KUBERNETES_SERVICE_HOST".to_string())
        })?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
        let dir = Path::new(SERVICE_ACCOUNT_DIR);
        let token = std::fs::read_to_string(dir.join("token"))?;
        let ca_bundle = std::fs::read(dir.join("ca.crt")).ok();
        Ok(Self {
            url: format!("https://{host}:{port}"),
            token: token.trim().to_string(),
            ca_bundle,
        })
    }
}

/// The real orchestrator. Cheap to clone; clones share the HTTP pool.
#[derive(Clone)]
pub struct KubeOrchestrator {
    http: reqwest::Client,
    config: Arc<KubeConfig>,
}

#[derive(Debug, Deserialize)]
struct WatchFrame {
    #[serde(rename = "type")]
    kind: String,
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: String,
}

impl KubeOrchestrator {
    pub fn new(config: KubeConfig) -> Result<Self, OrchestratorError> {
        let mut builder = reqwest::Client::builder();
        if let Some(pem) = &config.ca_bundle {
            let cert = reqwest::Certificate::from_pem(pem)?;
            builder = builder.add_root_certificate(cert);
        }
        let http = builder.build()?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    /// In-cluster client.
    pub fn in_cluster() -> Result<Self, OrchestratorError> {
        Self::new(KubeConfig::in_cluster()?)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.request(method, format!("{}{}", self.config.url, path));
        if !self.config.token.is_empty() {
            req = req.bearer_auth(&self.config.token);
        }
        req
    }

    async fn check(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, OrchestratorError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let path = response.url().path().to_string();
        let message = response
            .json::<ApiStatus>()
            .await
            .map(|s| s.message)
            .unwrap_or_default();
        match status.as_u16() {
            409 => Err(OrchestratorError::Conflict),
            404 => Err(OrchestratorError::NotFound(path)),
            code => Err(OrchestratorError::Api { status: code, message }),
        }
    }
}

#[async_trait]
impl Orchestrator for KubeOrchestrator {
    async fn create_namespace(&self, namespace: &Namespace) -> Result<(), OrchestratorError> {
        let response = self
            .request(reqwest::Method::POST, "/api/v1/namespaces")
            .json(namespace)
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), OrchestratorError> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                &format!("/api/v1/namespaces/{name}"),
            )
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }

    async fn create_secret(&self, secret: &Secret) -> Result<(), OrchestratorError> {
        let namespace = &secret.metadata.namespace;
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/api/v1/namespaces/{namespace}/secrets"),
            )
            .json(secret)
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), OrchestratorError> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                &format!("/api/v1/namespaces/{namespace}/secrets/{name}"),
            )
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }

    async fn create_pod(&self, pod: &Pod) -> Result<(), OrchestratorError> {
        let namespace = &pod.metadata.namespace;
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/api/v1/namespaces/{namespace}/pods"),
            )
            .json(pod)
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), OrchestratorError> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                &format!("/api/v1/namespaces/{namespace}/pods/{name}"),
            )
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, OrchestratorError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/api/v1/namespaces/{namespace}/pods/{name}"),
            )
            .send()
            .await?;
        let response = self.check(response).await?;
        Ok(response.json().await?)
    }

    async fn update_pod(&self, pod: &Pod) -> Result<(), OrchestratorError> {
        let namespace = &pod.metadata.namespace;
        let name = &pod.metadata.name;
        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("/api/v1/namespaces/{namespace}/pods/{name}"),
            )
            .json(pod)
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }

    async fn watch_pod(&self, namespace: &str, name: &str) -> Result<PodWatch, OrchestratorError> {
        // Current state first, so conditions that already hold are
        // observed without waiting for the next modification.
        let snapshot = self.get_pod(namespace, name).await?;
        let response = self
            .request(
                reqwest::Method::GET,
                &format!(
                    "/api/v1/namespaces/{namespace}/pods?watch=true&labelSelector=io.drone.name%3D{name}"
                ),
            )
            .send()
            .await?;
        let mut response = self.check(response).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(PodEvent::Modified(Box::new(snapshot)));
        let pod_name = name.to_string();
        tokio::spawn(async move {
            let mut buffer = BytesMut::new();
            loop {
                let chunk = match response.chunk().await {
                    Ok(Some(chunk)) => chunk,
                    Ok(None) | Err(_) => break,
                };
                buffer.extend_from_slice(&chunk);
                while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line = buffer.split_to(pos + 1);
                    let Ok(frame) = serde_json::from_slice::<WatchFrame>(&line) else {
                        continue;
                    };
                    let event = match frame.kind.as_str() {
                        "ADDED" | "MODIFIED" => {
                            match serde_json::from_value::<Pod>(frame.object) {
                                Ok(pod) if pod.metadata.name == pod_name => {
                                    PodEvent::Modified(Box::new(pod))
                                }
                                _ => continue,
                            }
                        }
                        "DELETED" => PodEvent::Deleted,
                        _ => continue,
                    };
                    if tx.send(event).is_err() {
                        return;
                    }
                }
            }
        });
        Ok(PodWatch::new(rx))
    }

    async fn tail_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        follow: bool,
    ) -> Result<LogStream, OrchestratorError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!(
                    "/api/v1/namespaces/{namespace}/pods/{pod}/log?container={container}&follow={follow}"
                ),
            )
            .send()
            .await?;
        let mut response = self.check(response).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            loop {
                match response.chunk().await {
                    Ok(Some(chunk)) => {
                        if tx.send(Ok(chunk)).is_err() {
                            return;
                        }
                    }
                    Ok(None) => return,
                    Err(err) => {
                        let _ = tx.send(Err(OrchestratorError::Transport(err)));
                        return;
                    }
                }
            }
        });
        Ok(LogStream::new(rx))
    }
}
