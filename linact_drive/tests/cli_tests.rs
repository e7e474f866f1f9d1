//! `linact` binary end to end, against the simulated drive pair.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

fn linact() -> Command {
    let mut cmd = Command::cargo_bin("linact").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

fn example_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../config/linact.example.toml")
}

#[test]
fn missing_config_is_logged_before_exit() {
    linact()
        .args(["--config", "/nonexistent/linact.toml", "status"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Configuration file not found"));
}

#[test]
fn invalid_config_is_logged_before_exit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linact.toml");
    let content = std::fs::read_to_string(example_config())
        .unwrap()
        .replace("request_timeout_s = 1.0", "request_timeout_s = 1e30");
    std::fs::write(&path, content).unwrap();

    linact()
        .arg("--config")
        .arg(&path)
        .args(["--simulate", "status"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("bus.request_timeout_s"));
}

#[test]
fn simulated_status_as_json() {
    linact()
        .arg("--config")
        .arg(example_config())
        .args(["--simulate", "status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"fault_class\""));
}

#[test]
fn simulated_bring_up_homes() {
    linact()
        .arg("--config")
        .arg(example_config())
        .args(["--simulate", "bring-up"])
        .assert()
        .success()
        .stdout(predicate::str::contains("homed in"));
}

#[test]
fn unknown_profile_fails() {
    linact()
        .arg("--config")
        .arg(example_config())
        .args(["--simulate", "fault-reset", "--profile", "turbo"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("invalid mode profile 'turbo'"));
}
