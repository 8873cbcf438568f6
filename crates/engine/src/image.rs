// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container image reference handling.
//!
//! The engine decides whether a container slot is still parked on the
//! placeholder by comparing image references. The kubelet reports
//! canonicalized references, so comparison normalizes both sides:
//! default registry and library prefixes are stripped and a missing
//! tag defaults to `latest`.

/// Expand a possibly short reference to its canonical form.
pub fn expand(image: &str) -> String {
    let image = image.trim();
    if image.is_empty() {
        return String::new();
    }
    let (name, tag) = split_tag(image);
    let name = match name.split('/').count() {
        1 => format!("docker.io/library/{name}"),
        2 if !name.split('/').next().unwrap_or_default().contains('.')
            && !name.starts_with("localhost") =>
        {
            format!("docker.io/{name}")
        }
        _ => name.to_string(),
    };
    format!("{name}:{tag}")
}

/// Compare two references for equality after normalization.
pub fn matches(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

fn normalize(image: &str) -> String {
    let expanded = expand(image);
    let expanded = expanded
        .strip_prefix("docker.io/library/")
        .or_else(|| expanded.strip_prefix("docker.io/"))
        .or_else(|| expanded.strip_prefix("index.docker.io/library/"))
        .or_else(|| expanded.strip_prefix("index.docker.io/"))
        .unwrap_or(&expanded);
    expanded.to_string()
}

fn split_tag(image: &str) -> (&str, &str) {
    // The tag separator is a colon after the last slash; anything
    // before that is a registry port.
    match image.rfind(':') {
        Some(idx) if idx > image.rfind('/').unwrap_or(0) => (&image[..idx], &image[idx + 1..]),
        _ => (image, "latest"),
    }
}

#[cfg(test)]
#[path = "image_tests.rs"]
mod tests;
