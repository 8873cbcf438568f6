// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn substitutes_both_forms() {
    let vars = env(&[("DRONE_BRANCH", "main"), ("DRONE_COMMIT", "abc123")]);
    let out = eval("branch: ${DRONE_BRANCH} commit: $DRONE_COMMIT", &vars);
    assert_eq!(out, "branch: main commit: abc123");
}

#[test]
fn unknown_variables_expand_to_empty() {
    let out = eval("value: ${NOPE}", &BTreeMap::new());
    assert_eq!(out, "value: ");
}

#[test]
fn multiline_values_are_quoted() {
    let vars = env(&[("DRONE_COMMIT_MESSAGE", "first line\nsecond line")]);
    let out = eval("msg: ${DRONE_COMMIT_MESSAGE}", &vars);
    assert_eq!(out, "msg: \"first line\\nsecond line\"");
}

#[test]
fn quoted_values_escape_specials() {
    let vars = env(&[("MSG", "say \"hi\"\nback\\slash")]);
    let out = eval("$MSG", &vars);
    assert_eq!(out, "\"say \\\"hi\\\"\\nback\\\\slash\"");
}

#[test]
fn single_line_values_pass_through_unquoted() {
    let vars = env(&[("MSG", "plain value")]);
    assert_eq!(eval("$MSG", &vars), "plain value");
}
