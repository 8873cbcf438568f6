// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! YAML parsing for manifests (syntactic layer).
//!
//! A configuration file may hold multiple YAML documents. Each document
//! is deserialized into a [`Resource`]; documents with an unknown
//! `kind` are rejected.

use crate::types::{Manifest, Pipeline, Resource};
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur during parsing.
#[derive(Debug, Error)]
pub enum ParseError {
    /// YAML syntax or schema error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Named resource missing from the manifest
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Resource exists but is not a pipeline
    #[error("resource is not a pipeline: {0}")]
    NotPipeline(String),
}

/// Parse a multi-document configuration string into a manifest.
pub fn parse(text: &str) -> Result<Manifest, ParseError> {
    let mut resources = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = serde_yaml::Value::deserialize(document)?;
        // Blank documents between separators are tolerated.
        if value.is_null() {
            continue;
        }
        let resource: Resource = serde_yaml::from_value(value)?;
        resources.push(resource);
    }
    Ok(Manifest { resources })
}

/// Find the named pipeline resource in the manifest.
///
/// An empty name matches the first pipeline document, mirroring the
/// default-stage behavior of single-pipeline configurations.
pub fn lookup<'a>(name: &str, manifest: &'a Manifest) -> Result<&'a Pipeline, ParseError> {
    for resource in &manifest.resources {
        if let Resource::Pipeline(pipeline) = resource {
            if name.is_empty() || pipeline.name == name || (pipeline.name.is_empty() && name == "default") {
                return Ok(pipeline);
            }
        }
    }
    Err(ParseError::NotFound(name.to_string()))
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
