// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Secret providers.
//!
//! A provider resolves a named secret for a build. Secrets not marked
//! `pull_request` are never returned for pull-request events.

use async_trait::async_trait;
use gantry_core::{build::event, Build, Repo, Secret};
use gantry_manifest::{Manifest, Resource};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors from secret resolution.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider error: {0}")]
    Provider(String),
}

/// A secret lookup request.
#[derive(Debug, Clone)]
pub struct Request<'a> {
    pub name: &'a str,
    pub build: &'a Build,
    pub repo: &'a Repo,
}

/// Resolves named secrets.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Find a secret by name. Returns None when no matching secret is
    /// visible to this build.
    async fn find(&self, request: &Request<'_>) -> Result<Option<Secret>, SecretError>;
}

/// Provider over a static list of secrets.
pub struct Static {
    secrets: Vec<Secret>,
}

impl Static {
    pub fn new(secrets: Vec<Secret>) -> Self {
        Self { secrets }
    }

    /// Provider over plain key/value pairs.
    pub fn from_vars(vars: &BTreeMap<String, String>) -> Self {
        Self {
            secrets: vars
                .iter()
                .map(|(name, data)| Secret {
                    name: name.clone(),
                    data: data.clone(),
                    pull_request: false,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl Provider for Static {
    async fn find(&self, request: &Request<'_>) -> Result<Option<Secret>, SecretError> {
        for secret in &self.secrets {
            if !secret.name.eq_ignore_ascii_case(request.name) {
                continue;
            }
            // Restricted secrets are invisible to pull requests.
            if !secret.pull_request && request.build.event == event::PULL_REQUEST {
                tracing::trace!(name = request.name, "secret: restricted from pull requests");
                continue;
            }
            tracing::trace!(name = request.name, "secret: found matching secret");
            return Ok(Some(secret.clone()));
        }
        tracing::trace!(name = request.name, "secret: no matching secret");
        Ok(None)
    }
}

/// Provider over `kind: secret` documents embedded in the
/// configuration file. These carry no pull-request grant and are
/// therefore restricted like any other secret.
pub struct FromManifest {
    secrets: Vec<Secret>,
}

impl FromManifest {
    pub fn new(manifest: &Manifest) -> Self {
        Self {
            secrets: manifest
                .resources
                .iter()
                .filter_map(|resource| match resource {
                    Resource::Secret(s) if !s.data.is_empty() => Some(Secret {
                        name: s.name.clone(),
                        data: s.data.clone(),
                        pull_request: false,
                    }),
                    _ => None,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl Provider for FromManifest {
    async fn find(&self, request: &Request<'_>) -> Result<Option<Secret>, SecretError> {
        Static::new(self.secrets.clone()).find(request).await
    }
}

/// Chain of providers; the first match wins.
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
    async fn find(&self, request: &Request<'_>) -> Result<Option<Secret>, SecretError> {
        for provider in &self.providers {
            if let Some(secret) = provider.find(request).await? {
                return Ok(Some(secret));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
#[path = "secret_tests.rs"]
mod tests;
