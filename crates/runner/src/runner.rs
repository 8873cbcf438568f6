// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level stage execution.
//!
//! Accepts a stage, resolves its context, compiles the pipeline and
//! hands the plan to the scheduler. Configuration failures fail every
//! step with the same error and are reported exactly once; the engine
//! environment is always destroyed on the way out.

use crate::reporter;
use crate::scheduler;
use crate::state::State;
use gantry_client::client::{ClientError, StageContext};
use gantry_client::{registry, secret, Client};
use gantry_core::{environ, subst, Build, Clock, Repo, Stage};
use gantry_engine::compiler::{Compiler, CompilerArgs};
use gantry_engine::Engine;
use gantry_manifest::{lint, lookup, parse};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Fallback stage timeout when the repository does not set one.
const DEFAULT_TIMEOUT_MINUTES: i64 = 60;

/// Errors surfaced to the caller. Pipeline failures are reported to
/// the control plane instead and do not appear here.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("client error: {0}")]
    Client(#[from] ClientError),
}

/// Repository/build gate evaluated before compilation.
pub type MatchFunc = Arc<dyn Fn(&Repo, &Build) -> bool + Send + Sync>;

/// Runs pipeline stages.
pub struct Runner<C: Client, E: Engine, K: Clock> {
    /// Remote control-plane client.
    pub client: C,
    /// Lifecycle engine driving the orchestrator.
    pub engine: Arc<E>,
    /// Pipeline compiler settings.
    pub compiler: Compiler,
    /// Host name reported as the stage machine.
    pub machine: String,
    /// Global environment for substitution and step env.
    pub environ: BTreeMap<String, String>,
    /// Registry credential provider.
    pub registries: Arc<dyn registry::Provider>,
    /// Optional security gate rejecting unwanted pipelines.
    pub match_func: Option<MatchFunc>,
    pub clock: K,
}

impl<C: Client, E: Engine, K: Clock> Runner<C, E, K> {
    /// Claim and run a stage handed out by the queue. An optimistic
    /// lock conflict means another runner owns it, which is fine.
    pub async fn run(&self, stage: Stage) -> Result<(), RunnerError> {
        tracing::debug!(
            stage.id = stage.id,
            stage.name = %stage.name,
            stage.number = stage.number,
            "stage received"
        );

        let mut stage = stage;
        stage.machine = self.machine.clone();
        let stage = match self.client.accept(&stage).await {
            Ok(accepted) => accepted,
            Err(ClientError::OptimisticLock) => {
                tracing::debug!(stage.id = stage.id, "stage accepted by another runner");
                return Ok(());
            }
            Err(err) => {
                tracing::error!(stage.id = stage.id, error = %err, "cannot accept stage");
                return Err(err.into());
            }
        };
        tracing::debug!(stage.id = stage.id, "stage accepted");

        let context = match self.client.detail(stage.id).await {
            Ok(context) => context,
            Err(err) => {
                tracing::error!(stage.id = stage.id, error = %err, "cannot get stage details");
                return Err(err.into());
            }
        };
        self.run_stage(stage, context).await
    }

    /// Run a stage that was already accepted and assigned.
    pub async fn run_accepted(&self, stage_id: i64) -> Result<(), RunnerError> {
        tracing::debug!(stage.id = stage_id, "stage received");
        let context = match self.client.detail(stage_id).await {
            Ok(context) => context,
            Err(err) => {
                tracing::error!(stage.id = stage_id, error = %err, "cannot get stage details");
                return Err(err.into());
            }
        };
        let stage = context.stage.clone();
        self.run_stage(stage, context).await
    }

    async fn run_stage(&self, stage: Stage, data: StageContext) -> Result<(), RunnerError> {
        let state = Arc::new(State::new(stage));
        let cancel = CancellationToken::new();
        // Every exit path tears the watchers down with the stage.
        let _cancel_guard = cancel.clone().drop_guard();

        self.watch_cancellation(&data, &cancel);
        self.arm_timeout(&data, &cancel);

        let snapshot = state.snapshot();
        let envs = environ::combine(&[
            self.environ.clone(),
            environ::system(&data.system),
            environ::repo(&data.repo),
            environ::build(&data.build),
            environ::stage(&snapshot),
            environ::link(&data.repo, &data.build, &data.system),
            data.build.params.clone(),
        ]);

        // The agent may reject a repository or build outright.
        if let Some(match_func) = &self.match_func {
            if !match_func(&data.repo, &data.build) {
                tracing::error!("cannot process stage, access denied");
                state.fail_all(
                    "insufficient permission to run the pipeline",
                    self.clock.unix_now(),
                );
                reporter::report_stage(&self.client, &state).await;
                return Ok(());
            }
        }

        // Substitute, parse, locate and lint the pipeline. Any failure
        // here fails every step and is reported once.
        let config = subst::eval(&data.config, &envs);
        let manifest = match parse(&config) {
            Ok(manifest) => manifest,
            Err(err) => {
                tracing::error!(error = %err, "cannot parse configuration file");
                return self.fail_all(&state, &err.to_string()).await;
            }
        };
        let name = state.snapshot().name;
        let pipeline = match lookup(&name, &manifest) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                tracing::error!(error = %err, "cannot find pipeline resource");
                return self.fail_all(&state, &err.to_string()).await;
            }
        };
        if let Err(err) = lint(pipeline, data.repo.trusted) {
            tracing::error!(error = %err, "cannot accept configuration");
            return self.fail_all(&state, &err.to_string()).await;
        }

        let secrets = secret::Combine::new(vec![
            Arc::new(secret::Static::new(data.secrets.clone())),
            Arc::new(secret::FromManifest::new(&manifest)),
        ]);

        let snapshot = state.snapshot();
        let args = CompilerArgs {
            pipeline,
            manifest: &manifest,
            build: &data.build,
            stage: &snapshot,
            repo: &data.repo,
            system: &data.system,
            netrc: data.netrc.as_ref(),
            secret: &secrets,
            registry: self.registries.as_ref(),
        };
        let spec = match self.compiler.compile(args).await {
            Ok(spec) => Arc::new(spec),
            Err(err) => {
                tracing::error!(error = %err, "cannot compile pipeline");
                return self.fail_all(&state, &err.to_string()).await;
            }
        };

        state.prepare(&spec);
        state.start_stage(self.clock.unix_now());
        let running = state.snapshot();
        match self.client.update_stage(&running).await {
            Ok(updated) => state.absorb_stage(&updated),
            Err(err) => {
                tracing::error!(error = %err, "cannot update stage");
                return Err(err.into());
            }
        }
        tracing::debug!(stage.id = running.id, "updated stage to running");

        if let Err(err) = self.engine.setup(&spec).await {
            tracing::error!(error = %err, "cannot set up the stage environment");
            state.fail_all(&err.to_string(), self.clock.unix_now());
            if let Err(err) = self.engine.destroy(&spec).await {
                tracing::warn!(error = %err, "cannot clean up after failed setup");
            }
            reporter::report_stage(&self.client, &state).await;
            return Ok(());
        }

        scheduler::exec(
            Arc::clone(&self.engine),
            self.client.clone(),
            self.clock.clone(),
            Arc::clone(&spec),
            Arc::clone(&state),
            cancel.clone(),
        )
        .await;

        // Stop detached services and log flushers before teardown.
        cancel.cancel();
        if let Err(err) = self.engine.destroy(&spec).await {
            tracing::warn!(error = %err, "cannot destroy the stage environment");
        }

        let status = state.finish_stage(self.clock.unix_now());
        reporter::report_stage(&self.client, &state).await;
        tracing::debug!(stage.status = %status, "updated stage to complete");
        Ok(())
    }

    async fn fail_all(&self, state: &State, error: &str) -> Result<(), RunnerError> {
        state.fail_all(error, self.clock.unix_now());
        reporter::report_stage(&self.client, state).await;
        Ok(())
    }

    /// Watch the remote build and cancel the stage when the server
    /// reports cancellation.
    fn watch_cancellation(&self, data: &StageContext, cancel: &CancellationToken) {
        let client = self.client.clone();
        let build_id = data.build.id;
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("done listening for cancellations");
                        return;
                    }
                    done = client.watch(build_id) => match done {
                        Ok(true) => {
                            tracing::debug!("received cancellation");
                            cancel.cancel();
                            return;
                        }
                        Ok(false) => continue,
                        Err(err) => {
                            tracing::debug!(error = %err, "done listening for cancellations");
                            return;
                        }
                    },
                }
            }
        });
    }

    /// Enforce the repository timeout. Expiry behaves exactly like a
    /// user cancellation.
    fn arm_timeout(&self, data: &StageContext, cancel: &CancellationToken) {
        let minutes = if data.repo.timeout > 0 {
            data.repo.timeout
        } else {
            DEFAULT_TIMEOUT_MINUTES
        };
        let timeout = Duration::from_secs(minutes as u64 * 60);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    tracing::info!("stage timed out");
                    cancel.cancel();
                }
            }
        });
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
