// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell-style variable substitution over the raw configuration text.
//!
//! Replacement happens before YAML parsing, so values containing a
//! newline are quoted as a shell literal to keep the document valid.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("valid substitution regex")
});

/// Substitute `$VAR` and `${VAR}` references with values from `env`.
///
/// Unknown variables expand to the empty string, matching shell
/// semantics. Values containing a newline are emitted as a quoted
/// literal.
pub fn eval(text: &str, env: &BTreeMap<String, String>) -> String {
    VAR_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            let value = env.get(name).map(String::as_str).unwrap_or_default();
            if value.contains('\n') {
                quote(value)
            } else {
                value.to_string()
            }
        })
        .into_owned()
}

/// Quote a value as a double-quoted literal with escaped specials.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
#[path = "subst_tests.rs"]
mod tests;
