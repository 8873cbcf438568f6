// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Offline pipeline compilation for debugging.

use anyhow::Context;
use gantry_client::{registry, secret};
use gantry_core::{Build, Repo, Stage, System};
use gantry_engine::compiler::{Compiler, CompilerArgs};
use gantry_manifest::{lint, lookup, parse};
use std::path::PathBuf;

pub async fn handle(path: PathBuf, name: String) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let manifest = parse(&text).context("cannot parse configuration file")?;
    let pipeline = lookup(&name, &manifest).context("cannot find pipeline resource")?;
    lint(pipeline, true).context("cannot accept configuration")?;

    let build = Build {
        number: 1,
        event: "push".to_string(),
        target: "main".to_string(),
        ..Default::default()
    };
    let stage = Stage {
        id: 1,
        number: 1,
        name: pipeline.name.clone(),
        ..Default::default()
    };
    let repo = Repo::default();
    let system = System::default();
    let secrets = secret::Static::new(Vec::new());
    let registries = registry::Static::new(Vec::new());

    let spec = Compiler::default()
        .compile(CompilerArgs {
            pipeline,
            manifest: &manifest,
            build: &build,
            stage: &stage,
            repo: &repo,
            system: &system,
            netrc: None,
            secret: &secrets,
            registry: &registries,
        })
        .await
        .context("cannot compile pipeline")?;

    println!("pod: {} (namespace {})", spec.pod_name, spec.namespace);
    for step in &spec.steps {
        let deps = if step.depends_on.is_empty() {
            String::new()
        } else {
            format!(" <- {}", step.depends_on.join(", "))
        };
        println!("  {:<3} {:<20} {}{}", step.number, step.name, step.image, deps);
    }
    Ok(())
}
