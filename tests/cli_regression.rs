// Regression tests for the `tapsuite` binary and its demo suites.
// Requires: assert_cmd, predicates, tempfile in [dev-dependencies]

use std::fs;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

fn tapsuite() -> Command {
    let mut cmd = Command::cargo_bin("tapsuite").unwrap();
    cmd.env_remove("RUST_LOG").arg("--color").arg("never");
    cmd
}

#[test]
fn passing_suite_exits_zero() {
    tapsuite()
        .arg("demos/ledger")
        .assert()
        .success()
        .stdout(
            contains("TAP version 13\n1..4\n")
                .and(contains("ok 2 - moves funds between accounts"))
                .and(contains("ok 3 - rejects overdrafts"))
                .and(contains("# Ledger :: mints the initial supply\nok 1 - mints the initial supply"))
                .and(contains("# fail: 0"))
                .and(contains("# rate: 100.00%")),
        );
}

#[test]
fn trailing_arguments_reach_the_suite() {
    tapsuite()
        .args(["demos/ledger", "--", "--supply", "500"])
        .assert()
        .success()
        .stdout(contains("# fail: 0"));

    tapsuite()
        .args(["--strict", "demos/ledger", "--", "--supply=100"])
        .assert()
        .code(1)
        .stdout(
            contains("not ok 2 - moves funds between accounts")
                .and(contains("insufficient balance"))
                .and(contains("# fail: 1")),
        );
}

#[test]
fn failing_cases_are_recorded_not_fatal() {
    tapsuite()
        .arg("./demos/failing.rs")
        .assert()
        .success()
        .stdout(
            contains("ok 1 - reads a balance")
                .and(contains("not ok 2 - reports a returned error"))
                .and(contains("  message: \"boom\""))
                .and(contains("  operator: \"==\""))
                .and(contains("  actual:   \"10\""))
                .and(contains("  expected: \"20\""))
                .and(contains("not ok 4 - reports a thrown value"))
                .and(contains("  message: \"42\""))
                .and(contains("ok 5 - keeps running after failures"))
                .and(contains("# fail: 3"))
                .and(contains("# rate: 40.00%"))
                .and(contains("Bail out!").not()),
        );
}

#[test]
fn strict_mode_fails_on_failed_cases() {
    tapsuite()
        .args(["--strict", "demos/failing"])
        .assert()
        .code(1);
}

#[test]
fn hook_failure_bails_out() {
    tapsuite()
        .arg("demos/bail")
        .assert()
        .code(1)
        .stdout(
            contains("ok 1 - runs first")
                .and(contains("Bail out! before at Broken"))
                .and(contains("simulator unreachable"))
                .and(contains("never runs").not())
                .and(contains("# test:").not()),
        );
}

#[test]
fn suites_share_one_root_in_argument_order() {
    tapsuite()
        .args(["demos/failing", "demos/ledger"])
        .assert()
        .success()
        .stdout(
            contains("1..9\n")
                .and(contains("ok 6 - mints the initial supply"))
                .and(contains("# test: 9")),
        );
}

#[test]
fn unknown_suite_is_reported_with_miette() {
    tapsuite()
        .arg("demos/missing")
        .assert()
        .code(1)
        .stdout(contains("TAP version 13").not())
        .stderr(
            contains("unknown suite `demos/missing`")
                .and(contains("tapsuite::unknown_suite"))
                .and(contains("demos/ledger")),
        );
}

#[test]
fn list_prints_registered_suites() {
    tapsuite()
        .arg("--list")
        .assert()
        .success()
        .stdout("demos/bail\ndemos/failing\ndemos/ledger\n");
}

#[test]
fn summary_is_written_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("summary.json");

    tapsuite()
        .arg("--summary")
        .arg(&path)
        .arg("demos/bail")
        .assert()
        .code(1);

    let summary: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(summary["status"], "aborted");
    assert_eq!(summary["totals"]["total"], 3);
    assert_eq!(summary["totals"]["pass"], 1);
    assert_eq!(summary["cases"][0]["title"], "runs first");
    assert_eq!(summary["fatal"]["kind"], "before");
    assert_eq!(summary["fatal"]["path"][0], "Broken");
}

#[test]
fn width_option_wraps_output() {
    tapsuite()
        .args(["--width", "30", "demos/ledger"])
        .assert()
        .success()
        .stdout(contains("ok 2 - moves funds between\naccounts"));
}
