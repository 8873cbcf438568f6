// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn terminal_statuses() {
    assert!(!Status::Pending.is_done());
    assert!(!Status::Running.is_done());
    assert!(Status::Success.is_done());
    assert!(Status::Failure.is_done());
    assert!(Status::Killed.is_done());
    assert!(Status::Error.is_done());
    assert!(Status::Skipped.is_done());
}

#[test]
fn failing_statuses() {
    assert!(Status::Failure.is_failing());
    assert!(Status::Killed.is_failing());
    assert!(Status::Error.is_failing());
    assert!(!Status::Success.is_failing());
    assert!(!Status::Skipped.is_failing());
}

#[test]
fn status_serializes_lowercase() {
    let json = serde_json::to_string(&Status::Success).unwrap();
    assert_eq!(json, "\"success\"");
    let status: Status = serde_json::from_str("\"killed\"").unwrap();
    assert_eq!(status, Status::Killed);
}

#[test]
fn stage_step_lookup_by_name() {
    let stage = Stage {
        steps: vec![
            StepRecord {
                name: "build".to_string(),
                number: 1,
                ..Default::default()
            },
            StepRecord {
                name: "test".to_string(),
                number: 2,
                ..Default::default()
            },
        ],
        ..Default::default()
    };
    assert_eq!(stage.step("test").unwrap().number, 2);
    assert!(stage.step("deploy").is_none());
}
