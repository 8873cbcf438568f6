// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry credential providers.

use async_trait::async_trait;
use gantry_core::{Build, Registry, Repo};
use std::sync::Arc;
use thiserror::Error;

/// Errors from registry credential listing.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("registry endpoint error ({status}): {message}")]
    Endpoint { status: u16, message: String },
}

/// A registry credential request.
#[derive(Debug, Clone)]
pub struct Request<'a> {
    pub build: &'a Build,
    pub repo: &'a Repo,
}

/// Lists registry credentials visible to a build.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn list(&self, request: &Request<'_>) -> Result<Vec<Registry>, RegistryError>;
}

/// Provider over a static credential list.
pub struct Static {
    registries: Vec<Registry>,
}

impl Static {
    pub fn new(registries: Vec<Registry>) -> Self {
        Self { registries }
    }
}

#[async_trait]
impl Provider for Static {
    async fn list(&self, _request: &Request<'_>) -> Result<Vec<Registry>, RegistryError> {
        Ok(self.registries.clone())
    }
}

/// Chain of providers. Results concatenate in input order; the first
/// error short-circuits.
pub struct Combine {
    providers: Vec<Arc<dyn Provider>>,
}

impl Combine {
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl Provider for Combine {
    async fn list(&self, request: &Request<'_>) -> Result<Vec<Registry>, RegistryError> {
        let mut out = Vec::new();
        for provider in &self.providers {
            out.extend(provider.list(request).await?);
        }
        Ok(out)
    }
}

/// Provider backed by an external plugin endpoint. An empty endpoint
/// disables the provider, which then returns no credentials.
pub struct External {
    endpoint: String,
    secret: String,
    http: reqwest::Client,
}

impl External {
    pub fn new(endpoint: &str, secret: &str, skip_verify: bool) -> Result<Self, RegistryError> {
        let mut builder = reqwest::Client::builder();
        if skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        Ok(Self {
            endpoint: endpoint.to_string(),
            secret: secret.to_string(),
            http: builder.build()?,
        })
    }
}

#[async_trait]
impl Provider for External {
    async fn list(&self, request: &Request<'_>) -> Result<Vec<Registry>, RegistryError> {
        if self.endpoint.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .http
            .post(&self.endpoint)
            .header("X-Gantry-Token", &self.secret)
            .json(&serde_json::json!({
                "repo": request.repo,
                "build": request.build,
            }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RegistryError::Endpoint {
                status: status.as_u16(),
                message,
            });
        }
        // No content means the plugin has nothing for this build.
        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&body).map_err(|err| RegistryError::Endpoint {
            status: status.as_u16(),
            message: err.to_string(),
        })
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
