// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP implementation of the control-plane client.

use crate::client::{Client, ClientError, Line, StageContext};
use async_trait::async_trait;
use gantry_core::{Stage, StepRecord};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Client for the control-plane RPC endpoints. Authenticates every
/// request with the shared runner secret.
#[derive(Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    endpoint: Arc<String>,
    secret: Arc<String>,
}

impl HttpClient {
    pub fn new(endpoint: &str, secret: &str, skip_verify: bool) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder();
        if skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        Ok(Self {
            http: builder.build()?,
            endpoint: Arc::new(endpoint.trim_end_matches('/').to_string()),
            secret: Arc::new(secret.to_string()),
        })
    }

    async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let response = self
            .http
            .post(format!("{}{}", self.endpoint, path))
            .header("X-Gantry-Token", self.secret.as_str())
            .json(body)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        match status.as_u16() {
            code if status.is_success() => {
                let body = response.bytes().await?;
                if body.is_empty() {
                    // The queue endpoint answers 204 with no body.
                    serde_json::from_slice(b"null")
                } else {
                    serde_json::from_slice(&body)
                }
                .map_err(|err| ClientError::Api {
                    status: code,
                    message: err.to_string(),
                })
            }
            409 => Err(ClientError::OptimisticLock),
            404 => Err(ClientError::NotFound),
            code => {
                let message = response.text().await.unwrap_or_default();
                Err(ClientError::Api {
                    status: code,
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl Client for HttpClient {
    async fn request(&self, os: &str, arch: &str) -> Result<Option<Stage>, ClientError> {
        self.post(
            "/rpc/v2/stage",
            &serde_json::json!({ "kind": "pipeline", "type": "kubernetes", "os": os, "arch": arch }),
        )
        .await
    }

    async fn accept(&self, stage: &Stage) -> Result<Stage, ClientError> {
        let path = format!(
            "/rpc/v2/stage/{}/accept?machine={}",
            stage.id, stage.machine
        );
        self.post(&path, &()).await
    }

    async fn detail(&self, stage_id: i64) -> Result<StageContext, ClientError> {
        let response = self
            .http
            .get(format!("{}/rpc/v2/stage/{}", self.endpoint, stage_id))
            .header("X-Gantry-Token", self.secret.as_str())
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn update_stage(&self, stage: &Stage) -> Result<Stage, ClientError> {
        let response = self
            .http
            .put(format!("{}/rpc/v2/stage", self.endpoint))
            .header("X-Gantry-Token", self.secret.as_str())
            .json(stage)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn update_step(&self, step: &StepRecord) -> Result<StepRecord, ClientError> {
        let response = self
            .http
            .put(format!("{}/rpc/v2/step", self.endpoint))
            .header("X-Gantry-Token", self.secret.as_str())
            .json(step)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn watch(&self, build_id: i64) -> Result<bool, ClientError> {
        self.post(&format!("/rpc/v2/build/{build_id}/watch"), &())
            .await
    }

    async fn batch(&self, step_id: i64, lines: &[Line]) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .post(&format!("/rpc/v2/step/{step_id}/logs/batch"), lines)
            .await?;
        Ok(())
    }

    async fn upload(&self, step_id: i64, lines: &[Line]) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .post(&format!("/rpc/v2/step/{step_id}/logs/upload"), lines)
            .await?;
        Ok(())
    }
}
