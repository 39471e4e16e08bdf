// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI integration tests for `chklog config`

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;

use common::{chklog, TestEnv};
use predicates::prelude::*;

#[test]
fn check_accepts_a_valid_file() {
    let env = TestEnv::new();
    let file = env.file(
        "chk.toml",
        "period = \"90s\"\nmax_items = 100\nmax_checkpoints = 3\n",
    );

    chklog()
        .args(["config", "check"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("chk_period 90\n"))
        .stdout(predicate::str::contains("chk_max_items 100\n"))
        .stdout(predicate::str::contains("max_checkpoints 3\n"))
        .stdout(predicate::str::contains("keep_closed_chks false\n"));
}

#[test]
fn check_rejects_an_out_of_range_value() {
    let env = TestEnv::new();
    let file = env.file("chk.toml", "max_checkpoints = 9\n");

    chklog()
        .args(["config", "check"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config file"))
        .stderr(predicate::str::contains("max_checkpoints"));
}

#[test]
fn check_rejects_unknown_fields() {
    let env = TestEnv::new();
    let file = env.file("chk.toml", "max_itemz = 5\n");

    chklog()
        .args(["config", "check"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_itemz"));
}

#[test]
fn check_reports_a_missing_file() {
    let env = TestEnv::new();
    chklog()
        .args(["config", "check"])
        .arg(env.path().join("nope.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.toml"));
}

#[test]
fn show_prints_defaults_as_json() {
    let output = chklog()
        .args(["--format", "json", "config", "show"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["chk_period"], 5);
    assert_eq!(json["chk_max_items"], 5000);
    assert_eq!(json["max_checkpoints"], 2);
    assert_eq!(json["item_num_based_new_chk"], true);
}

#[test]
fn show_applies_overrides() {
    chklog()
        .args(["config", "show", "--set", "chk_period=2m", "--set", "keep_closed_chks=true"])
        .assert()
        .success()
        .stdout(predicate::str::contains("chk_period 120\n"))
        .stdout(predicate::str::contains("keep_closed_chks true\n"));
}

#[test]
fn show_rejects_a_bad_override() {
    chklog()
        .args(["config", "show", "--set", "chk_max_items=0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("rejected setting chk_max_items=0"));
}
